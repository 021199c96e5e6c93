//! Query cache interface.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use super::data_provider::DataProviderError;
use crate::cache::QueryKey;

/// Result type for cache fetches.
pub type Result<T> = std::result::Result<T, CacheError>;

/// A future producing fresh server data for one cache key.
pub type Fetcher = BoxFuture<'static, std::result::Result<Value, DataProviderError>>;

/// Errors that can occur while fetching through the cache.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CacheError {
    #[error("Fetch cancelled: key={key}")]
    Cancelled { key: QueryKey },

    #[error("Fetch failed: {0}")]
    Fetch(#[from] DataProviderError),
}

/// Interface for the client-side store of server data.
///
/// Keys are ordered sequences of JSON segments. Every method taking a
/// `filter` applies to all entries whose key partially matches it (see
/// [`QueryKey::matches`]), so `["posts", "getList"]` addresses every cached
/// list of posts whatever its pagination.
///
/// All synchronous methods must be cheap: the mutation engine calls them
/// between issuing a mutation and dispatching its network request.
#[async_trait]
pub trait QueryCache: Send + Sync {
    /// Data stored under exactly `key`.
    fn get_query_data(&self, key: &QueryKey) -> Option<Value>;

    /// Every entry matching `filter`, with its current data.
    fn get_queries_data(&self, filter: &QueryKey) -> Vec<(QueryKey, Option<Value>)>;

    /// Replace the data stored under exactly `key`.
    ///
    /// `None` clears the data of an existing entry and is a no-op when no
    /// entry exists.
    fn set_query_data(&self, key: &QueryKey, data: Option<Value>);

    /// Rewrite every entry matching `filter`.
    ///
    /// The updater receives the current data; returning `None` leaves the
    /// entry untouched.
    fn set_queries_data(&self, filter: &QueryKey, updater: &dyn Fn(Option<&Value>) -> Option<Value>);

    /// Mark every entry matching `filter` stale. Returns the number marked.
    fn invalidate_queries(&self, filter: &QueryKey) -> usize;

    /// Abort every in-flight fetch whose key matches `filter`.
    ///
    /// Aborted fetches never write their result. Returns the number aborted.
    fn cancel_queries(&self, filter: &QueryKey) -> usize;

    /// True when the entry under `key` was invalidated since its last fetch.
    fn is_invalidated(&self, key: &QueryKey) -> bool;

    /// Run `fetcher` as the in-flight fetch for `key` and store its result.
    async fn fetch_query(&self, key: &QueryKey, fetcher: Fetcher) -> Result<Value>;

    /// Return fresh cached data, fetching when missing or invalidated.
    async fn ensure_query_data(&self, key: &QueryKey, fetcher: Fetcher) -> Result<Value> {
        if !self.is_invalidated(key) {
            if let Some(data) = self.get_query_data(key) {
                return Ok(data);
            }
        }
        self.fetch_query(key, fetcher).await
    }
}
