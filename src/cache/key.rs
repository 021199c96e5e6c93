//! Structured cache keys.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Build a [`QueryKey`] from JSON-literal segments.
///
/// ```
/// use ra_core::query_key;
///
/// let key = query_key!["posts", "getOne", {"id": "1"}];
/// assert_eq!(key.len(), 3);
/// ```
#[macro_export]
macro_rules! query_key {
    ($($segment:tt),* $(,)?) => {
        $crate::cache::QueryKey::new(vec![$(::serde_json::json!($segment)),*])
    };
}

/// Ordered tuple of JSON segments addressing one unit of cached data.
///
/// Keys compare structurally. Filtering uses partial deep matching: a
/// filter matches a key when each filter segment matches the key segment
/// at the same position, objects matching when every field of the filter
/// object is present and matches in the key object. A shorter filter thus
/// acts as a prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(Vec<Value>);

impl QueryKey {
    pub fn new(segments: Vec<Value>) -> Self {
        Self(segments)
    }

    /// Append a segment.
    pub fn with(mut self, segment: impl Into<Value>) -> Self {
        self.0.push(segment.into());
        self
    }

    pub fn segments(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when `filter` partially matches this key.
    pub fn matches(&self, filter: &QueryKey) -> bool {
        filter.0.len() <= self.0.len()
            && filter
                .0
                .iter()
                .zip(&self.0)
                .all(|(wanted, actual)| partial_match(actual, wanted))
    }

    /// Canonical text form, stable across equal keys.
    ///
    /// Object fields are written in sorted order whatever order they were
    /// inserted in, so structurally equal keys hash to the same text.
    pub fn hash_key(&self) -> String {
        Value::Array(self.0.iter().map(canonical).collect()).to_string()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hash_key())
    }
}

impl From<Vec<Value>> for QueryKey {
    fn from(segments: Vec<Value>) -> Self {
        Self(segments)
    }
}

/// Copy of `value` with every object's fields inserted in sorted order.
fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(fields) => {
            let mut sorted: Vec<(&String, &Value)> = fields.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                sorted
                    .into_iter()
                    .map(|(field, value)| (field.clone(), canonical(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

fn partial_match(actual: &Value, wanted: &Value) -> bool {
    match (actual, wanted) {
        (Value::Object(actual), Value::Object(wanted)) => wanted.iter().all(|(field, value)| {
            actual
                .get(field)
                .is_some_and(|candidate| partial_match(candidate, value))
        }),
        (Value::Array(actual), Value::Array(wanted)) => {
            wanted.len() <= actual.len()
                && wanted
                    .iter()
                    .zip(actual)
                    .all(|(value, candidate)| partial_match(candidate, value))
        }
        _ => actual == wanted,
    }
}
