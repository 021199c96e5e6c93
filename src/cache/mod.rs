//! In-memory query cache.
//!
//! Stores server-data snapshots keyed by [`QueryKey`], tracks staleness and
//! lets competing reads be cancelled while a mutation rewrites their keys.

mod key;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::{AbortHandle, Abortable};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::interfaces::query_cache::{CacheError, Fetcher, QueryCache, Result};

pub use key::QueryKey;

/// Fetch currently running for an entry.
struct InFlight {
    id: u64,
    handle: AbortHandle,
}

/// One cached unit of server data.
struct CacheEntry {
    key: QueryKey,
    data: Option<Value>,
    invalidated: bool,
    updated_at: Option<DateTime<Utc>>,
    in_flight: Option<InFlight>,
}

impl CacheEntry {
    fn new(key: QueryKey) -> Self {
        Self {
            key,
            data: None,
            invalidated: false,
            updated_at: None,
            in_flight: None,
        }
    }

    fn write(&mut self, data: Value) {
        self.data = Some(data);
        self.updated_at = Some(Utc::now());
    }
}

/// Process-local [`QueryCache`].
///
/// Entries live in a map keyed by the canonical text of their key, so
/// iteration order (and therefore snapshot order) is deterministic.
#[derive(Default)]
pub struct InMemoryQueryCache {
    entries: Mutex<BTreeMap<String, CacheEntry>>,
    next_fetch_id: AtomicU64,
}

impl InMemoryQueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, with or without data.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// True while a fetch for exactly `key` is running.
    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.entries
            .lock()
            .get(&key.hash_key())
            .is_some_and(|entry| entry.in_flight.is_some())
    }

    /// Time of the last write under exactly `key`.
    pub fn updated_at(&self, key: &QueryKey) -> Option<DateTime<Utc>> {
        self.entries
            .lock()
            .get(&key.hash_key())
            .and_then(|entry| entry.updated_at)
    }

    /// Drop every entry, aborting running fetches.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        for entry in entries.values() {
            if let Some(in_flight) = &entry.in_flight {
                in_flight.handle.abort();
            }
        }
        entries.clear();
    }
}

#[async_trait]
impl QueryCache for InMemoryQueryCache {
    fn get_query_data(&self, key: &QueryKey) -> Option<Value> {
        self.entries
            .lock()
            .get(&key.hash_key())
            .and_then(|entry| entry.data.clone())
    }

    fn get_queries_data(&self, filter: &QueryKey) -> Vec<(QueryKey, Option<Value>)> {
        self.entries
            .lock()
            .values()
            .filter(|entry| entry.key.matches(filter))
            .map(|entry| (entry.key.clone(), entry.data.clone()))
            .collect()
    }

    fn set_query_data(&self, key: &QueryKey, data: Option<Value>) {
        let mut entries = self.entries.lock();
        match data {
            Some(data) => entries
                .entry(key.hash_key())
                .or_insert_with(|| CacheEntry::new(key.clone()))
                .write(data),
            None => {
                if let Some(entry) = entries.get_mut(&key.hash_key()) {
                    entry.data = None;
                    entry.updated_at = Some(Utc::now());
                }
            }
        }
    }

    fn set_queries_data(
        &self,
        filter: &QueryKey,
        updater: &dyn Fn(Option<&Value>) -> Option<Value>,
    ) {
        let mut entries = self.entries.lock();
        for entry in entries.values_mut().filter(|entry| entry.key.matches(filter)) {
            if let Some(data) = updater(entry.data.as_ref()) {
                entry.write(data);
            }
        }
    }

    fn invalidate_queries(&self, filter: &QueryKey) -> usize {
        let mut entries = self.entries.lock();
        let mut count = 0;
        for entry in entries.values_mut().filter(|entry| entry.key.matches(filter)) {
            entry.invalidated = true;
            count += 1;
        }
        debug!(filter = %filter, count, "Invalidated queries");
        count
    }

    fn cancel_queries(&self, filter: &QueryKey) -> usize {
        let mut entries = self.entries.lock();
        let mut count = 0;
        for entry in entries.values_mut().filter(|entry| entry.key.matches(filter)) {
            if let Some(in_flight) = entry.in_flight.take() {
                in_flight.handle.abort();
                count += 1;
            }
        }
        if count > 0 {
            debug!(filter = %filter, count, "Cancelled in-flight fetches");
        }
        count
    }

    fn is_invalidated(&self, key: &QueryKey) -> bool {
        self.entries
            .lock()
            .get(&key.hash_key())
            .is_some_and(|entry| entry.invalidated)
    }

    async fn fetch_query(&self, key: &QueryKey, fetcher: Fetcher) -> Result<Value> {
        let hash = key.hash_key();
        let id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);
        let (handle, registration) = AbortHandle::new_pair();

        {
            let mut entries = self.entries.lock();
            let entry = entries
                .entry(hash.clone())
                .or_insert_with(|| CacheEntry::new(key.clone()));
            // A newer fetch supersedes the running one.
            if let Some(previous) = entry.in_flight.replace(InFlight { id, handle }) {
                previous.handle.abort();
            }
        }

        let outcome = Abortable::new(fetcher, registration).await;

        let mut entries = self.entries.lock();
        let entry = entries.get_mut(&hash);
        let owned = entry
            .as_ref()
            .and_then(|entry| entry.in_flight.as_ref())
            .is_some_and(|in_flight| in_flight.id == id);

        match (outcome, entry) {
            (Err(_aborted), _) => Err(CacheError::Cancelled { key: key.clone() }),
            (Ok(Err(error)), Some(entry)) => {
                if owned {
                    entry.in_flight = None;
                }
                Err(CacheError::Fetch(error))
            }
            (Ok(Ok(data)), Some(entry)) if owned => {
                entry.in_flight = None;
                entry.invalidated = false;
                entry.write(data.clone());
                Ok(data)
            }
            // Entry removed or fetch superseded without abort: report the
            // data but leave the cache alone.
            (Ok(result), _) => result.map_err(CacheError::Fetch),
        }
    }
}
