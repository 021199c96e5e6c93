//! Batch update.

use std::sync::Arc;

use serde_json::Value;

use super::cache_updates::{ids_from_value, ids_value, merge_record, patch_records, record_filters};
use super::params::{required, UpdateManyMutationParams};
use crate::cache::QueryKey;
use crate::context::AdminContext;
use crate::interfaces::QueryCache;
use crate::mutation::{MutationEngine, MutationError, MutationOptions};
use crate::types::UpdateManyParams;

/// Build an engine applying the same `data` to many records.
///
/// The engine's data is the JSON array of updated ids: the requested ones
/// for optimistic writes, the ones the server reports otherwise.
pub fn update_many_mutation(
    ctx: &AdminContext,
    params: UpdateManyMutationParams,
    mut options: MutationOptions<UpdateManyMutationParams, Value>,
) -> Result<MutationEngine<UpdateManyMutationParams, Value>, MutationError> {
    if options.mutation_fn.is_none() {
        let provider = Arc::clone(ctx.data_provider());
        options = options.mutation_fn(move |params: UpdateManyMutationParams| {
            let provider = Arc::clone(&provider);
            async move {
                let resource = required(params.resource, "resource")?;
                let update = UpdateManyParams {
                    ids: required(params.ids, "ids")?,
                    data: required(params.data, "data")?,
                    meta: params.meta,
                };
                let result = provider.update_many(&resource, update).await?;
                Ok(ids_value(&result.data))
            }
        });
    }
    if options.update_cache.is_none() {
        let cache = Arc::clone(ctx.query_cache());
        options = options.update_cache(move |params, _options, result| {
            update_cache(cache.as_ref(), params, result)
        });
    }
    if options.get_query_keys.is_none() {
        options = options.get_query_keys(|params, _options| query_keys(params));
    }
    ctx.engine(params, options)
}

fn update_cache(
    cache: &dyn QueryCache,
    params: &UpdateManyMutationParams,
    result: Option<Value>,
) -> Value {
    let Some(resource) = &params.resource else {
        return result.unwrap_or_default();
    };

    let ids = match &result {
        Some(ids) => ids_from_value(ids),
        None => params.ids.clone().unwrap_or_default(),
    };
    let changes = params.data.clone().unwrap_or_default();
    patch_records(cache, resource, &ids, &|cached| merge_record(Some(cached), &changes));
    ids_value(&ids)
}

fn query_keys(params: &UpdateManyMutationParams) -> Vec<QueryKey> {
    match (&params.resource, &params.ids) {
        (Some(resource), Some(ids)) => record_filters(resource, ids),
        _ => Vec::new(),
    }
}
