//! Mutation-mode engine.
//!
//! One [`MutationEngine`] drives a logical mutation end to end: merging
//! hook-time and call-time parameters, snapshotting the cache, writing the
//! optimistic result, dispatching (or deferring) the network call through
//! the middleware chain, and rolling back or invalidating on settle.
//!
//! # Modes
//!
//! - [`MutationMode::Pessimistic`]: network first, cache written from the
//!   server result; the cache is untouched on failure.
//! - [`MutationMode::Optimistic`]: snapshot, cancel competing reads, write
//!   the cache, schedule success callbacks, then dispatch; failure restores
//!   the snapshot key by key. Every affected key is invalidated on settle.
//! - [`MutationMode::Undoable`]: as optimistic, but the dispatch is wrapped
//!   in an [`UndoableMutation`](crate::undo::UndoableMutation) and queued
//!   for whoever drives the undo affordance.
//!
//! [`MutationMode::Pessimistic`]: crate::types::MutationMode::Pessimistic
//! [`MutationMode::Optimistic`]: crate::types::MutationMode::Optimistic
//! [`MutationMode::Undoable`]: crate::types::MutationMode::Undoable

mod engine;
pub mod middleware;
mod options;
mod snapshot;
mod state;

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::interfaces::DataProviderError;

pub use engine::MutationEngine;
pub use middleware::{middleware, Middleware, MutationMiddlewares};
pub use options::{
    CacheUpdateOptions, MutateOptions, MutateWrapperFn, MutationContext, MutationOptions,
    OnErrorFn, OnMutateFn, OnSettledFn, OnSuccessFn, OnUndoFn, QueryKeysFn, SnapshotFn,
    UpdateCacheFn,
};
pub use snapshot::Snapshot;
pub use state::{MutationState, MutationStatus};

/// Future returned by a mutation function.
pub type MutationFuture<D> = BoxFuture<'static, Result<D, DataProviderError>>;

/// The network-calling function of a mutation.
pub type MutationFn<P, D> = Arc<dyn Fn(P) -> MutationFuture<D> + Send + Sync>;

/// Errors surfaced by [`MutationEngine`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MutationError {
    #[error("Mutation requires a mutation_fn")]
    MissingMutationFn,

    #[error("Mutation requires parameter `{0}`")]
    MissingParameter(&'static str),

    #[error("Deferred mutations must be issued from within a tokio runtime")]
    NoRuntime,

    #[error(transparent)]
    Provider(#[from] DataProviderError),
}

/// Parameters of a mutation.
///
/// Hook-time parameters are captured when the engine is built; call-time
/// parameters are passed to each `mutate`. The two are combined with
/// [`merge`](Self::merge), call-time values winning field by field, and the
/// result is checked with [`validate`](Self::validate) before anything
/// touches the cache or the network.
pub trait MutationParams: Clone + Send + Sync + 'static {
    /// Combine with `overrides`; fields set in `overrides` win.
    fn merge(&self, overrides: &Self) -> Self;

    /// Reject parameter sets missing a required field.
    fn validate(&self) -> Result<(), MutationError> {
        Ok(())
    }
}

/// Shallow object merge: call-time fields replace hook-time ones.
impl MutationParams for Value {
    fn merge(&self, overrides: &Self) -> Self {
        match (self, overrides) {
            (Value::Object(base), Value::Object(overrides)) => {
                let mut merged = base.clone();
                for (field, value) in overrides {
                    merged.insert(field.clone(), value.clone());
                }
                Value::Object(merged)
            }
            (_, Value::Null) => self.clone(),
            _ => overrides.clone(),
        }
    }
}

/// Box an async closure into a [`MutationFn`].
pub fn mutation_fn<P, D, F, Fut>(f: F) -> MutationFn<P, D>
where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<D, DataProviderError>> + Send + 'static,
{
    Arc::new(move |params: P| -> MutationFuture<D> { Box::pin(f(params)) })
}

#[cfg(test)]
mod tests;
