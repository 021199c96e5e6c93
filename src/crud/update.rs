//! Single-record update.

use std::sync::Arc;

use serde_json::Value;

use super::cache_updates::{
    bare_record, cached_record, get_one_key, merge_record, patch_records, record_keys,
};
use super::params::{required, UpdateMutationParams};
use crate::cache::QueryKey;
use crate::context::AdminContext;
use crate::interfaces::QueryCache;
use crate::mutation::{MutationEngine, MutationError, MutationOptions};
use crate::types::UpdateParams;

/// Build an engine updating one record.
///
/// Optimistic writes merge `data` over the cached record (falling back to
/// `previous_data`); pessimistic writes store the record the server
/// returned. Either way every list and `getMany` entry holding the record
/// is patched too.
pub fn update_mutation(
    ctx: &AdminContext,
    params: UpdateMutationParams,
    mut options: MutationOptions<UpdateMutationParams, Value>,
) -> Result<MutationEngine<UpdateMutationParams, Value>, MutationError> {
    if options.mutation_fn.is_none() {
        let provider = Arc::clone(ctx.data_provider());
        options = options.mutation_fn(move |params: UpdateMutationParams| {
            let provider = Arc::clone(&provider);
            async move {
                let resource = required(params.resource, "resource")?;
                let update = UpdateParams {
                    id: required(params.id, "id")?,
                    data: required(params.data, "data")?,
                    previous_data: params.previous_data,
                    meta: params.meta,
                };
                Ok(provider.update(&resource, update).await?.data)
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
    params: &UpdateMutationParams,
    result: Option<Value>,
) -> Value {
    let (Some(resource), Some(id)) = (&params.resource, &params.id) else {
        return result.unwrap_or_default();
    };

    let (record, changes) = match result {
        Some(record) => (record.clone(), record),
        None => {
            let changes = params.data.clone().unwrap_or_default();
            let previous = cached_record(cache, resource, id)
                .or_else(|| params.previous_data.clone())
                .unwrap_or_else(|| bare_record(id));
            (merge_record(Some(&previous), &changes), changes)
        }
    };

    cache.set_query_data(&get_one_key(resource, id, params.meta.as_ref()), Some(record.clone()));
    patch_records(cache, resource, std::slice::from_ref(id), &|cached| {
        merge_record(Some(cached), &changes)
    });
    record
}

fn query_keys(params: &UpdateMutationParams) -> Vec<QueryKey> {
    match (&params.resource, &params.id) {
        (Some(resource), Some(id)) => {
            record_keys(resource, std::slice::from_ref(id), params.meta.as_ref())
        }
        _ => Vec::new(),
    }
}
