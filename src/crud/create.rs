//! Record creation.

use std::sync::Arc;

use serde_json::Value;

use super::cache_updates::{record_filters, record_keys, write_record};
use super::params::{required, CreateMutationParams};
use crate::cache::QueryKey;
use crate::context::AdminContext;
use crate::interfaces::QueryCache;
use crate::mutation::{MutationEngine, MutationError, MutationOptions};
use crate::types::{CreateParams, Identifier};

/// Build an engine creating one record.
///
/// The created record is written under its `getOne` key. An optimistic
/// write only happens when `data` already carries an `id`.
pub fn create_mutation(
    ctx: &AdminContext,
    params: CreateMutationParams,
    mut options: MutationOptions<CreateMutationParams, Value>,
) -> Result<MutationEngine<CreateMutationParams, Value>, MutationError> {
    if options.mutation_fn.is_none() {
        let provider = Arc::clone(ctx.data_provider());
        options = options.mutation_fn(move |params: CreateMutationParams| {
            let provider = Arc::clone(&provider);
            async move {
                let resource = required(params.resource, "resource")?;
                let create = CreateParams {
                    data: required(params.data, "data")?,
                    meta: params.meta,
                };
                Ok(provider.create(&resource, create).await?.data)
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
    params: &CreateMutationParams,
    result: Option<Value>,
) -> Value {
    let record = result.unwrap_or_else(|| params.data.clone().unwrap_or_default());
    if let Some(resource) = &params.resource {
        write_record(cache, resource, &record, params.meta.as_ref());
    }
    record
}

fn query_keys(params: &CreateMutationParams) -> Vec<QueryKey> {
    let Some(resource) = &params.resource else {
        return Vec::new();
    };
    match params.data.as_ref().and_then(Identifier::of_record) {
        Some(id) => record_keys(resource, std::slice::from_ref(&id), params.meta.as_ref()),
        None => record_filters(resource, &[]),
    }
}
