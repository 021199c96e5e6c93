//! Shared data types: record identifiers, mutation modes and the
//! parameter/result shapes of the data provider verbs.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A record as returned by the data provider.
///
/// Records are JSON objects carrying an `id` field.
pub type Record = Value;

/// Record identifier.
///
/// Backends use either numeric or string ids; both compare by their
/// textual form so `42` and `"42"` address the same record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Int(i64),
    Str(String),
}

impl Identifier {
    /// Extract an identifier from a JSON value (number or string).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Identifier::Int),
            Value::String(s) => Some(Identifier::Str(s.clone())),
            _ => None,
        }
    }

    /// Identifier of a record, read from its `id` field.
    pub fn of_record(record: &Value) -> Option<Self> {
        record.get("id").and_then(Self::from_value)
    }

    /// Loose equality against a JSON value.
    pub fn matches(&self, value: &Value) -> bool {
        Self::from_value(value).is_some_and(|other| other.to_string() == self.to_string())
    }

    pub fn to_value(&self) -> Value {
        match self {
            Identifier::Int(n) => Value::from(*n),
            Identifier::Str(s) => Value::from(s.clone()),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Int(n) => write!(f, "{}", n),
            Identifier::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Identifier {
    fn from(value: i64) -> Self {
        Identifier::Int(value)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Identifier::Str(value.to_string())
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Identifier::Str(value)
    }
}

/// Consistency strategy of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationMode {
    /// Wait for the server before touching the cache.
    #[default]
    Pessimistic,
    /// Write the cache immediately, roll back on failure.
    Optimistic,
    /// Write the cache immediately, defer the server call until committed.
    Undoable,
}

impl MutationMode {
    /// True for the modes that write the cache before the server answers.
    pub fn is_optimistic(self) -> bool {
        !matches!(self, MutationMode::Pessimistic)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MutationMode::Pessimistic => "pessimistic",
            MutationMode::Optimistic => "optimistic",
            MutationMode::Undoable => "undoable",
        }
    }
}

impl fmt::Display for MutationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Verb parameters
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetListParams {
    pub pagination: Option<Pagination>,
    pub sort: Option<Sort>,
    #[serde(default)]
    pub filter: Value,
    pub meta: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetOneParams {
    pub id: Identifier,
    pub meta: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetManyParams {
    pub ids: Vec<Identifier>,
    pub meta: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetManyReferenceParams {
    pub target: String,
    pub id: Identifier,
    pub pagination: Option<Pagination>,
    pub sort: Option<Sort>,
    #[serde(default)]
    pub filter: Value,
    pub meta: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateParams {
    pub data: Value,
    pub meta: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateParams {
    pub id: Identifier,
    pub data: Value,
    pub previous_data: Option<Value>,
    pub meta: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateManyParams {
    pub ids: Vec<Identifier>,
    pub data: Value,
    pub meta: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteParams {
    pub id: Identifier,
    pub previous_data: Option<Value>,
    pub meta: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteManyParams {
    pub ids: Vec<Identifier>,
    pub meta: Option<Value>,
}

// ============================================================================
// Verb results
// ============================================================================

/// Result of `getList` and `getManyReference`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListResult {
    pub data: Vec<Record>,
    pub total: Option<u64>,
}

/// Result of `getOne`, `create`, `update` and `delete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordResult {
    pub data: Record,
}

/// Result of `getMany`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManyResult {
    pub data: Vec<Record>,
}

/// Result of `updateMany` and `deleteMany`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdsResult {
    pub data: Vec<Identifier>,
}
