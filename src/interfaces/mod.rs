//! Abstract interfaces for ra-core components.
//!
//! These traits define the contracts for:
//! - Data providers (backend verbs)
//! - Query caches (client-side server-data snapshots)

pub mod data_provider;
pub mod query_cache;

pub use data_provider::{DataProvider, DataProviderError};
pub use query_cache::{CacheError, Fetcher, QueryCache};
