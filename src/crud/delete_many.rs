//! Batch deletion.

use std::sync::Arc;

use serde_json::Value;

use super::cache_updates::{ids_from_value, ids_value, record_filters, remove_records};
use super::params::{required, DeleteManyMutationParams};
use crate::cache::QueryKey;
use crate::context::AdminContext;
use crate::interfaces::QueryCache;
use crate::mutation::{MutationEngine, MutationError, MutationOptions};
use crate::types::DeleteManyParams;

/// Build an engine deleting many records.
///
/// The engine's data is the JSON array of deleted ids.
pub fn delete_many_mutation(
    ctx: &AdminContext,
    params: DeleteManyMutationParams,
    mut options: MutationOptions<DeleteManyMutationParams, Value>,
) -> Result<MutationEngine<DeleteManyMutationParams, Value>, MutationError> {
    if options.mutation_fn.is_none() {
        let provider = Arc::clone(ctx.data_provider());
        options = options.mutation_fn(move |params: DeleteManyMutationParams| {
            let provider = Arc::clone(&provider);
            async move {
                let resource = required(params.resource, "resource")?;
                let delete = DeleteManyParams {
                    ids: required(params.ids, "ids")?,
                    meta: params.meta,
                };
                let result = provider.delete_many(&resource, delete).await?;
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
    params: &DeleteManyMutationParams,
    result: Option<Value>,
) -> Value {
    let Some(resource) = &params.resource else {
        return result.unwrap_or_default();
    };

    let ids = match &result {
        Some(ids) => ids_from_value(ids),
        None => params.ids.clone().unwrap_or_default(),
    };
    remove_records(cache, resource, &ids);
    ids_value(&ids)
}

fn query_keys(params: &DeleteManyMutationParams) -> Vec<QueryKey> {
    match (&params.resource, &params.ids) {
        (Some(resource), Some(ids)) => record_filters(resource, ids),
        _ => Vec::new(),
    }
}
