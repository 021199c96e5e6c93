//! Record-level cache layout and rewrites.
//!
//! Layout of the cached verbs:
//!
//! | key                                         | data                  |
//! |---------------------------------------------|-----------------------|
//! | `[resource, "getOne", {"id", "meta"?}]`     | record                |
//! | `[resource, "getList", params]`             | `{data: [..], total}` |
//! | `[resource, "getManyReference", params]`    | `{data: [..], total}` |
//! | `[resource, "getMany", params]`             | `[..]`                |
//!
//! Record ids compare by their textual form.

use serde_json::{json, Map, Value};

use crate::cache::QueryKey;
use crate::interfaces::QueryCache;
use crate::query_key;
use crate::types::Identifier;

pub const GET_ONE: &str = "getOne";
pub const GET_LIST: &str = "getList";
pub const GET_MANY: &str = "getMany";
pub const GET_MANY_REFERENCE: &str = "getManyReference";

/// Key of one record's `getOne` entry.
pub fn get_one_key(resource: &str, id: &Identifier, meta: Option<&Value>) -> QueryKey {
    let mut segment = Map::new();
    segment.insert("id".to_string(), Value::String(id.to_string()));
    if let Some(meta) = meta {
        segment.insert("meta".to_string(), meta.clone());
    }
    query_key![resource, GET_ONE].with(Value::Object(segment))
}

/// Filter matching every `getOne` entry of `id`, whatever its meta.
pub fn get_one_filter(resource: &str, id: &Identifier) -> QueryKey {
    get_one_key(resource, id, None)
}

/// Filter matching every cached call of `verb` on `resource`.
pub fn verb_filter(resource: &str, verb: &str) -> QueryKey {
    query_key![resource, verb]
}

/// Every filter a record mutation on `ids` can touch.
pub fn record_filters(resource: &str, ids: &[Identifier]) -> Vec<QueryKey> {
    let mut filters: Vec<QueryKey> = ids.iter().map(|id| get_one_filter(resource, id)).collect();
    filters.extend(
        [GET_LIST, GET_MANY, GET_MANY_REFERENCE]
            .into_iter()
            .map(|verb| verb_filter(resource, verb)),
    );
    filters
}

/// Every key a record mutation on `ids` can write.
///
/// Adds the exact `getOne` keys for `meta` to [`record_filters`], so a
/// snapshot holds them even when nothing is cached under that meta yet.
pub fn record_keys(resource: &str, ids: &[Identifier], meta: Option<&Value>) -> Vec<QueryKey> {
    let mut keys = record_filters(resource, ids);
    if meta.is_some() {
        keys.extend(ids.iter().map(|id| get_one_key(resource, id, meta)));
    }
    keys
}

/// Shallow merge of `changes` over `record`.
pub fn merge_record(record: Option<&Value>, changes: &Value) -> Value {
    let mut merged = match record {
        Some(Value::Object(fields)) => fields.clone(),
        _ => Map::new(),
    };
    if let Value::Object(changes) = changes {
        for (field, value) in changes {
            merged.insert(field.clone(), value.clone());
        }
    }
    Value::Object(merged)
}

fn is_one_of(record: &Value, ids: &[Identifier]) -> bool {
    record
        .get("id")
        .is_some_and(|id| ids.iter().any(|wanted| wanted.matches(id)))
}

/// Apply `patch` to every record of `ids` in a record array.
fn patch_array(records: &[Value], ids: &[Identifier], patch: &dyn Fn(&Value) -> Value) -> Vec<Value> {
    records
        .iter()
        .map(|record| {
            if is_one_of(record, ids) {
                patch(record)
            } else {
                record.clone()
            }
        })
        .collect()
}

/// Rewrite the records of `ids` wherever the resource caches them.
///
/// `patch` receives the cached record and returns its replacement. Entries
/// with a `getOne` entry but no data yet are left alone.
pub fn patch_records(
    cache: &dyn QueryCache,
    resource: &str,
    ids: &[Identifier],
    patch: &dyn Fn(&Value) -> Value,
) {
    for id in ids {
        cache.set_queries_data(&get_one_filter(resource, id), &|record| record.map(patch));
    }

    let patch_list = |data: Option<&Value>| -> Option<Value> {
        let data = data?;
        let records = data.get("data")?.as_array()?;
        let mut patched = data.clone();
        patched["data"] = Value::Array(patch_array(records, ids, patch));
        Some(patched)
    };
    cache.set_queries_data(&verb_filter(resource, GET_LIST), &patch_list);
    cache.set_queries_data(&verb_filter(resource, GET_MANY_REFERENCE), &patch_list);

    cache.set_queries_data(&verb_filter(resource, GET_MANY), &|data| {
        let records = data?.as_array()?;
        Some(Value::Array(patch_array(records, ids, patch)))
    });
}

/// Write a full record under its `getOne` key and into every list
/// holding it.
pub fn write_record(cache: &dyn QueryCache, resource: &str, record: &Value, meta: Option<&Value>) {
    let Some(id) = Identifier::of_record(record) else {
        return;
    };
    cache.set_query_data(&get_one_key(resource, &id, meta), Some(record.clone()));
    patch_records(cache, resource, std::slice::from_ref(&id), &|cached| {
        merge_record(Some(cached), record)
    });
}

/// Drop the records of `ids` from every list of the resource.
///
/// List totals shrink by the number of records actually removed.
pub fn remove_records(cache: &dyn QueryCache, resource: &str, ids: &[Identifier]) {
    let remove_from_list = |data: Option<&Value>| -> Option<Value> {
        let data = data?;
        let records = data.get("data")?.as_array()?;
        let kept: Vec<Value> = records
            .iter()
            .filter(|record| !is_one_of(record, ids))
            .cloned()
            .collect();
        let removed = (records.len() - kept.len()) as u64;
        let total = data
            .get("total")
            .and_then(Value::as_u64)
            .map(|total| Value::from(total.saturating_sub(removed)))
            .unwrap_or(Value::Null);
        let mut updated = data.clone();
        updated["data"] = Value::Array(kept);
        updated["total"] = total;
        Some(updated)
    };
    cache.set_queries_data(&verb_filter(resource, GET_LIST), &remove_from_list);
    cache.set_queries_data(&verb_filter(resource, GET_MANY_REFERENCE), &remove_from_list);

    cache.set_queries_data(&verb_filter(resource, GET_MANY), &|data| {
        let records = data?.as_array()?;
        Some(Value::Array(
            records
                .iter()
                .filter(|record| !is_one_of(record, ids))
                .cloned()
                .collect(),
        ))
    });
}

/// Cached `getOne` data of a record, if any entry holds it.
pub fn cached_record(cache: &dyn QueryCache, resource: &str, id: &Identifier) -> Option<Value> {
    cache
        .get_queries_data(&get_one_filter(resource, id))
        .into_iter()
        .find_map(|(_, data)| data)
}

/// JSON array of identifiers.
pub fn ids_value(ids: &[Identifier]) -> Value {
    Value::Array(ids.iter().map(Identifier::to_value).collect())
}

/// Identifiers read back from a JSON array.
pub fn ids_from_value(value: &Value) -> Vec<Identifier> {
    value
        .as_array()
        .map(|ids| ids.iter().filter_map(Identifier::from_value).collect())
        .unwrap_or_default()
}

/// Placeholder for a record known only by id.
pub fn bare_record(id: &Identifier) -> Value {
    json!({ "id": id.to_value() })
}
