//! Data provider interface.

use async_trait::async_trait;
use serde_json::Value;

use crate::types::{
    CreateParams, DeleteManyParams, DeleteParams, GetListParams, GetManyParams,
    GetManyReferenceParams, GetOneParams, IdsResult, Identifier, ListResult, ManyResult,
    RecordResult, UpdateManyParams, UpdateParams,
};

/// Result type for data provider calls.
pub type Result<T> = std::result::Result<T, DataProviderError>;

/// Errors a data provider call can fail with.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataProviderError {
    #[error("{message} (HTTP {status})")]
    Http {
        message: String,
        status: u16,
        body: Option<Value>,
    },

    #[error("{message}")]
    Rejected {
        message: String,
        code: Option<String>,
    },

    #[error("Record not found: resource={resource}, id={id}")]
    NotFound { resource: String, id: Identifier },
}

impl DataProviderError {
    /// Rejection without a machine-readable code.
    pub fn rejected(message: impl Into<String>) -> Self {
        DataProviderError::Rejected {
            message: message.into(),
            code: None,
        }
    }

    /// Rejection carrying a machine-readable code.
    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        DataProviderError::Rejected {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    /// Machine-readable error code, if the backend supplied one.
    ///
    /// HTTP failures report their status code.
    pub fn code(&self) -> Option<String> {
        match self {
            DataProviderError::Http { status, .. } => Some(status.to_string()),
            DataProviderError::Rejected { code, .. } => code.clone(),
            DataProviderError::NotFound { .. } => Some("404".to_string()),
        }
    }
}

/// Interface for the backend adapter.
///
/// Every verb takes the resource name and its typed parameters and either
/// resolves with `{ data, total? }` or fails with a [`DataProviderError`].
/// Wire protocols (REST, GraphQL, local storage) live in implementations.
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn get_list(&self, resource: &str, params: GetListParams) -> Result<ListResult>;

    async fn get_one(&self, resource: &str, params: GetOneParams) -> Result<RecordResult>;

    async fn get_many(&self, resource: &str, params: GetManyParams) -> Result<ManyResult>;

    async fn get_many_reference(
        &self,
        resource: &str,
        params: GetManyReferenceParams,
    ) -> Result<ListResult>;

    async fn create(&self, resource: &str, params: CreateParams) -> Result<RecordResult>;

    async fn update(&self, resource: &str, params: UpdateParams) -> Result<RecordResult>;

    async fn update_many(&self, resource: &str, params: UpdateManyParams) -> Result<IdsResult>;

    async fn delete(&self, resource: &str, params: DeleteParams) -> Result<RecordResult>;

    async fn delete_many(&self, resource: &str, params: DeleteManyParams) -> Result<IdsResult>;
}
