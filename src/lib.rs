//! ra-core - mutation modes for admin applications
//!
//! Binds create/update/delete calls against a pluggable [`DataProvider`]
//! to a shared query cache, with three consistency strategies for the
//! same call:
//!
//! - **pessimistic**: wait for the server, then write the cache
//! - **optimistic**: write the cache first, roll back if the server fails
//! - **undoable**: write the cache first, defer the server call until the
//!   user stops being able to undo it
//!
//! The pieces, leaves first: [`cache`] (keyed server-data snapshots),
//! [`mutation::middleware`] (interceptor chain around the network call),
//! [`undo`] (FIFO hand-off of deferred mutations) and [`mutation`] (the
//! engine itself). [`crud`] wires the engine to the data provider verbs.
//!
//! [`DataProvider`]: interfaces::DataProvider

pub mod cache;
pub mod config;
pub mod context;
pub mod crud;
pub mod data_provider;
pub mod interfaces;
pub mod mutation;
pub mod test_utils;
pub mod types;
pub mod undo;
pub mod utils;

pub use cache::{InMemoryQueryCache, QueryKey};
pub use context::AdminContext;
pub use interfaces::{CacheError, DataProvider, DataProviderError, QueryCache};
pub use mutation::{
    MutateOptions, MutationEngine, MutationError, MutationMiddlewares, MutationOptions,
    MutationParams, MutationState, MutationStatus, Snapshot,
};
pub use types::{Identifier, MutationMode};
pub use undo::{UndoOutcome, UndoWindow, UndoableMutation, UndoableMutationQueue};
