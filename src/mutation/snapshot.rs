//! Pre-mutation cache snapshots.

use serde_json::Value;

use crate::cache::QueryKey;
use crate::interfaces::QueryCache;

/// Ordered `(key, previous value)` pairs captured before an optimistic
/// write, used to roll that write back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    entries: Vec<(QueryKey, Option<Value>)>,
}

impl Snapshot {
    pub fn new(entries: Vec<(QueryKey, Option<Value>)>) -> Self {
        Self { entries }
    }

    /// Capture every cache entry matching one of `filters`.
    ///
    /// A filter matching no entry is recorded as an absent value under the
    /// filter itself, so a rollback clears data written there in between.
    pub fn capture(cache: &dyn QueryCache, filters: &[QueryKey]) -> Self {
        let mut entries: Vec<(QueryKey, Option<Value>)> = Vec::new();
        for filter in filters {
            let matches = cache.get_queries_data(filter);
            if matches.is_empty() {
                entries.push((filter.clone(), None));
                continue;
            }
            for (key, value) in matches {
                if !entries.iter().any(|(seen, _)| *seen == key) {
                    entries.push((key, value));
                }
            }
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[(QueryKey, Option<Value>)] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &QueryKey> {
        self.entries.iter().map(|(key, _)| key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write every captured value back, one key at a time.
    ///
    /// Keys outside the snapshot are left alone, so unrelated writes made
    /// since the capture survive.
    pub fn restore(&self, cache: &dyn QueryCache) {
        for (key, value) in &self.entries {
            cache.set_query_data(key, value.clone());
        }
    }
}
