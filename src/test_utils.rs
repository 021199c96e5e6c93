//! Test utilities and mock implementations.
//!
//! This module provides an in-memory data provider for testing mutations
//! without a real backend.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::crud::cache_updates::merge_record;
use crate::interfaces::data_provider::{DataProvider, DataProviderError, Result};
use crate::types::{
    CreateParams, DeleteManyParams, DeleteParams, GetListParams, GetManyParams,
    GetManyReferenceParams, GetOneParams, Identifier, IdsResult, ListResult, ManyResult,
    Pagination, Record, RecordResult, Sort, SortOrder, UpdateManyParams, UpdateParams,
};

/// Mock data provider that keeps records in memory, per resource.
///
/// Every call is logged as `"<verb>:<resource>"`. Writes can be made to
/// fail or to take a while, to exercise rollback and in-flight paths.
pub struct MockDataProvider {
    records: RwLock<HashMap<String, Vec<Record>>>,
    calls: RwLock<Vec<String>>,
    fail_on_read: RwLock<bool>,
    fail_on_write: RwLock<bool>,
    write_delay: RwLock<Option<Duration>>,
    next_id: AtomicI64,
}

impl Default for MockDataProvider {
    fn default() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            calls: RwLock::new(Vec::new()),
            fail_on_read: RwLock::new(false),
            fail_on_write: RwLock::new(false),
            write_delay: RwLock::new(None),
            next_id: AtomicI64::new(1000),
        }
    }
}

impl MockDataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the records of `resource`.
    pub fn with_records(mut self, resource: &str, records: Vec<Record>) -> Self {
        self.records.get_mut().insert(resource.to_string(), records);
        self
    }

    pub async fn set_fail_on_read(&self, fail: bool) {
        *self.fail_on_read.write().await = fail;
    }

    pub async fn set_fail_on_write(&self, fail: bool) {
        *self.fail_on_write.write().await = fail;
    }

    /// Delay every write by `delay` before it is applied.
    pub async fn set_write_delay(&self, delay: Option<Duration>) {
        *self.write_delay.write().await = delay;
    }

    /// Current records of `resource`.
    pub async fn records(&self, resource: &str) -> Vec<Record> {
        self.records
            .read()
            .await
            .get(resource)
            .cloned()
            .unwrap_or_default()
    }

    /// Current record `id` of `resource`.
    pub async fn record(&self, resource: &str, id: impl Into<Identifier>) -> Option<Record> {
        let id = id.into();
        self.records(resource).await.into_iter().find(|record| matches_id(record, &id))
    }

    /// Every call so far, as `"<verb>:<resource>"`.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    /// Number of calls to `verb`, whatever the resource.
    pub async fn call_count(&self, verb: &str) -> usize {
        let prefix = format!("{}:", verb);
        self.calls
            .read()
            .await
            .iter()
            .filter(|call| call.starts_with(&prefix))
            .count()
    }

    async fn record_call(&self, verb: &str, resource: &str) {
        self.calls.write().await.push(format!("{}:{}", verb, resource));
    }

    async fn begin_read(&self, verb: &str, resource: &str) -> Result<()> {
        self.record_call(verb, resource).await;
        if *self.fail_on_read.read().await {
            return Err(DataProviderError::with_code("Mock read failure", "mock_failure"));
        }
        Ok(())
    }

    async fn begin_write(&self, verb: &str, resource: &str) -> Result<()> {
        self.record_call(verb, resource).await;
        let delay = *self.write_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail_on_write.read().await {
            return Err(DataProviderError::with_code("Mock write failure", "mock_failure"));
        }
        Ok(())
    }

    fn not_found(resource: &str, id: &Identifier) -> DataProviderError {
        DataProviderError::NotFound {
            resource: resource.to_string(),
            id: id.clone(),
        }
    }
}

fn matches_id(record: &Value, id: &Identifier) -> bool {
    record.get("id").is_some_and(|value| id.matches(value))
}

fn matches_filter(record: &Value, filter: &Value) -> bool {
    match filter.as_object() {
        Some(fields) => fields
            .iter()
            .all(|(field, wanted)| record.get(field) == Some(wanted)),
        None => true,
    }
}

fn compare_field(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Sort, count and paginate `records`.
fn paginate(
    mut records: Vec<Record>,
    sort: Option<&Sort>,
    pagination: Option<&Pagination>,
) -> ListResult {
    if let Some(sort) = sort {
        records.sort_by(|a, b| {
            let ordering = compare_field(
                a.get(&sort.field).unwrap_or(&Value::Null),
                b.get(&sort.field).unwrap_or(&Value::Null),
            );
            match sort.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
    }
    let total = records.len() as u64;
    let data = match pagination {
        Some(pagination) => {
            let per_page = pagination.per_page as usize;
            let start = (pagination.page.saturating_sub(1) as usize) * per_page;
            records.into_iter().skip(start).take(per_page).collect()
        }
        None => records,
    };
    ListResult {
        data,
        total: Some(total),
    }
}

#[async_trait]
impl DataProvider for MockDataProvider {
    async fn get_list(&self, resource: &str, params: GetListParams) -> Result<ListResult> {
        self.begin_read("get_list", resource).await?;
        let records: Vec<Record> = self
            .records(resource)
            .await
            .into_iter()
            .filter(|record| matches_filter(record, &params.filter))
            .collect();
        Ok(paginate(records, params.sort.as_ref(), params.pagination.as_ref()))
    }

    async fn get_one(&self, resource: &str, params: GetOneParams) -> Result<RecordResult> {
        self.begin_read("get_one", resource).await?;
        let data = self
            .record(resource, params.id.clone())
            .await
            .ok_or_else(|| Self::not_found(resource, &params.id))?;
        Ok(RecordResult { data })
    }

    async fn get_many(&self, resource: &str, params: GetManyParams) -> Result<ManyResult> {
        self.begin_read("get_many", resource).await?;
        let data = self
            .records(resource)
            .await
            .into_iter()
            .filter(|record| params.ids.iter().any(|id| matches_id(record, id)))
            .collect();
        Ok(ManyResult { data })
    }

    async fn get_many_reference(
        &self,
        resource: &str,
        params: GetManyReferenceParams,
    ) -> Result<ListResult> {
        self.begin_read("get_many_reference", resource).await?;
        let records: Vec<Record> = self
            .records(resource)
            .await
            .into_iter()
            .filter(|record| {
                record
                    .get(&params.target)
                    .is_some_and(|value| params.id.matches(value))
                    && matches_filter(record, &params.filter)
            })
            .collect();
        Ok(paginate(records, params.sort.as_ref(), params.pagination.as_ref()))
    }

    async fn create(&self, resource: &str, params: CreateParams) -> Result<RecordResult> {
        self.begin_write("create", resource).await?;
        let mut data = params.data;
        if Identifier::of_record(&data).is_none() {
            let id = self.next_id.fetch_add(1, AtomicOrdering::Relaxed);
            data = merge_record(Some(&data), &serde_json::json!({ "id": id }));
        }
        self.records
            .write()
            .await
            .entry(resource.to_string())
            .or_default()
            .push(data.clone());
        Ok(RecordResult { data })
    }

    async fn update(&self, resource: &str, params: UpdateParams) -> Result<RecordResult> {
        self.begin_write("update", resource).await?;
        let mut records = self.records.write().await;
        let record = records
            .get_mut(resource)
            .and_then(|records| records.iter_mut().find(|record| matches_id(record, &params.id)))
            .ok_or_else(|| Self::not_found(resource, &params.id))?;
        *record = merge_record(Some(&*record), &params.data);
        Ok(RecordResult {
            data: record.clone(),
        })
    }

    async fn update_many(&self, resource: &str, params: UpdateManyParams) -> Result<IdsResult> {
        self.begin_write("update_many", resource).await?;
        let mut records = self.records.write().await;
        let mut updated = Vec::new();
        if let Some(records) = records.get_mut(resource) {
            for id in &params.ids {
                if let Some(record) = records.iter_mut().find(|record| matches_id(record, id)) {
                    *record = merge_record(Some(&*record), &params.data);
                    updated.push(id.clone());
                }
            }
        }
        Ok(IdsResult { data: updated })
    }

    async fn delete(&self, resource: &str, params: DeleteParams) -> Result<RecordResult> {
        self.begin_write("delete", resource).await?;
        let mut records = self.records.write().await;
        let records = records
            .get_mut(resource)
            .ok_or_else(|| Self::not_found(resource, &params.id))?;
        let index = records
            .iter()
            .position(|record| matches_id(record, &params.id))
            .ok_or_else(|| Self::not_found(resource, &params.id))?;
        Ok(RecordResult {
            data: records.remove(index),
        })
    }

    async fn delete_many(&self, resource: &str, params: DeleteManyParams) -> Result<IdsResult> {
        self.begin_write("delete_many", resource).await?;
        let mut records = self.records.write().await;
        let mut deleted = Vec::new();
        if let Some(records) = records.get_mut(resource) {
            records.retain(|record| {
                match params.ids.iter().find(|id| matches_id(record, id)) {
                    Some(id) => {
                        deleted.push(id.clone());
                        false
                    }
                    None => true,
                }
            });
        }
        Ok(IdsResult { data: deleted })
    }
}
