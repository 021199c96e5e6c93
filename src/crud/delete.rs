//! Single-record deletion.

use std::sync::Arc;

use serde_json::Value;

use super::cache_updates::{bare_record, cached_record, record_filters, remove_records};
use super::params::{required, DeleteMutationParams};
use crate::cache::QueryKey;
use crate::context::AdminContext;
use crate::interfaces::QueryCache;
use crate::mutation::{MutationEngine, MutationError, MutationOptions};
use crate::types::DeleteParams;

/// Build an engine deleting one record.
///
/// The record is dropped from every list of the resource, shrinking their
/// totals. The engine's data is the deleted record.
pub fn delete_mutation(
    ctx: &AdminContext,
    params: DeleteMutationParams,
    mut options: MutationOptions<DeleteMutationParams, Value>,
) -> Result<MutationEngine<DeleteMutationParams, Value>, MutationError> {
    if options.mutation_fn.is_none() {
        let provider = Arc::clone(ctx.data_provider());
        options = options.mutation_fn(move |params: DeleteMutationParams| {
            let provider = Arc::clone(&provider);
            async move {
                let resource = required(params.resource, "resource")?;
                let delete = DeleteParams {
                    id: required(params.id, "id")?,
                    previous_data: params.previous_data,
                    meta: params.meta,
                };
                Ok(provider.delete(&resource, delete).await?.data)
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
    params: &DeleteMutationParams,
    result: Option<Value>,
) -> Value {
    let (Some(resource), Some(id)) = (&params.resource, &params.id) else {
        return result.unwrap_or_default();
    };

    let record = result.unwrap_or_else(|| {
        params
            .previous_data
            .clone()
            .or_else(|| cached_record(cache, resource, id))
            .unwrap_or_else(|| bare_record(id))
    });
    remove_records(cache, resource, std::slice::from_ref(id));
    record
}

fn query_keys(params: &DeleteMutationParams) -> Vec<QueryKey> {
    match (&params.resource, &params.id) {
        (Some(resource), Some(id)) => record_filters(resource, std::slice::from_ref(id)),
        _ => Vec::new(),
    }
}
