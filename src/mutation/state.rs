//! Observable status of a mutation.

use chrono::{DateTime, Utc};

use crate::interfaces::DataProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Error,
}

/// Status object exposed next to `mutate`.
///
/// Errors land here even when no error callback is registered, so callers
/// can always inspect a failure reactively.
#[derive(Debug, Clone)]
pub struct MutationState<D> {
    pub status: MutationStatus,
    pub data: Option<D>,
    pub error: Option<DataProviderError>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl<D> Default for MutationState<D> {
    fn default() -> Self {
        Self {
            status: MutationStatus::Idle,
            data: None,
            error: None,
            submitted_at: None,
        }
    }
}

impl<D> MutationState<D> {
    pub(crate) fn pending() -> Self {
        Self {
            status: MutationStatus::Pending,
            submitted_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub(crate) fn settle(&mut self, outcome: Result<D, DataProviderError>) {
        match outcome {
            Ok(data) => {
                self.status = MutationStatus::Success;
                self.data = Some(data);
                self.error = None;
            }
            Err(error) => {
                self.status = MutationStatus::Error;
                self.data = None;
                self.error = Some(error);
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == MutationStatus::Idle
    }

    /// True while the network call is in flight.
    pub fn is_loading(&self) -> bool {
        self.status == MutationStatus::Pending
    }

    pub fn is_success(&self) -> bool {
        self.status == MutationStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == MutationStatus::Error
    }

    /// True once the last dispatched call succeeded or failed.
    pub fn is_settled(&self) -> bool {
        matches!(self.status, MutationStatus::Success | MutationStatus::Error)
    }
}
