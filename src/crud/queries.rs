//! Cached reads.
//!
//! Each helper returns the cached data when it is present and not
//! invalidated, and otherwise fetches through the data provider and stores
//! the result under the layout described in
//! [`cache_updates`](super::cache_updates).

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use super::cache_updates::{get_one_key, verb_filter, GET_LIST, GET_MANY, GET_MANY_REFERENCE};
use crate::cache::QueryKey;
use crate::context::AdminContext;
use crate::interfaces::query_cache::Result;
use crate::interfaces::DataProviderError;
use crate::types::{
    GetListParams, GetManyParams, GetManyReferenceParams, GetOneParams, ListResult, Record,
};

/// Key of a list-like call: the verb filter plus the serialized params.
fn params_key(resource: &str, verb: &str, params: &impl Serialize) -> QueryKey {
    verb_filter(resource, verb).with(serde_json::to_value(params).unwrap_or_default())
}

fn to_list(data: Value) -> ListResult {
    ListResult {
        total: data.get("total").and_then(Value::as_u64),
        data: match data {
            Value::Object(mut fields) => match fields.remove("data") {
                Some(Value::Array(records)) => records,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        },
    }
}

pub async fn get_one(ctx: &AdminContext, resource: &str, params: GetOneParams) -> Result<Record> {
    let key = get_one_key(resource, &params.id, params.meta.as_ref());
    let provider = Arc::clone(ctx.data_provider());
    let resource = resource.to_string();
    ctx.query_cache()
        .ensure_query_data(
            &key,
            Box::pin(async move {
                Ok::<_, DataProviderError>(provider.get_one(&resource, params).await?.data)
            }),
        )
        .await
}

pub async fn get_list(ctx: &AdminContext, resource: &str, params: GetListParams) -> Result<ListResult> {
    let key = params_key(resource, GET_LIST, &params);
    let provider = Arc::clone(ctx.data_provider());
    let resource = resource.to_string();
    let data = ctx
        .query_cache()
        .ensure_query_data(
            &key,
            Box::pin(async move {
                let result = provider.get_list(&resource, params).await?;
                Ok::<_, DataProviderError>(json!({ "data": result.data, "total": result.total }))
            }),
        )
        .await?;
    Ok(to_list(data))
}

pub async fn get_many(ctx: &AdminContext, resource: &str, params: GetManyParams) -> Result<Vec<Record>> {
    let key = params_key(resource, GET_MANY, &params);
    let provider = Arc::clone(ctx.data_provider());
    let resource = resource.to_string();
    let data = ctx
        .query_cache()
        .ensure_query_data(
            &key,
            Box::pin(async move {
                let result = provider.get_many(&resource, params).await?;
                Ok::<_, DataProviderError>(Value::Array(result.data))
            }),
        )
        .await?;
    Ok(match data {
        Value::Array(records) => records,
        _ => Vec::new(),
    })
}

pub async fn get_many_reference(
    ctx: &AdminContext,
    resource: &str,
    params: GetManyReferenceParams,
) -> Result<ListResult> {
    let key = params_key(resource, GET_MANY_REFERENCE, &params);
    let provider = Arc::clone(ctx.data_provider());
    let resource = resource.to_string();
    let data = ctx
        .query_cache()
        .ensure_query_data(
            &key,
            Box::pin(async move {
                let result = provider.get_many_reference(&resource, params).await?;
                Ok::<_, DataProviderError>(json!({ "data": result.data, "total": result.total }))
            }),
        )
        .await?;
    Ok(to_list(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::QueryCache;
    use crate::test_utils::MockDataProvider;
    use crate::types::Identifier;

    fn context() -> (Arc<MockDataProvider>, AdminContext) {
        let provider = Arc::new(
            MockDataProvider::new()
                .with_records("posts", vec![json!({"id": 1, "title": "A"}), json!({"id": 2, "title": "B"})]),
        );
        let ctx = AdminContext::new(provider.clone());
        (provider, ctx)
    }

    #[tokio::test]
    async fn test_get_one_reads_through_cache() {
        let (provider, ctx) = context();
        let params = GetOneParams {
            id: Identifier::from(1),
            meta: None,
        };

        let first = get_one(&ctx, "posts", params.clone()).await.unwrap();
        let second = get_one(&ctx, "posts", params).await.unwrap();

        assert_eq!(first, json!({"id": 1, "title": "A"}));
        assert_eq!(second, first);
        assert_eq!(provider.call_count("get_one").await, 1);
    }

    #[tokio::test]
    async fn test_get_list_stores_data_and_total() {
        let (provider, ctx) = context();

        let list = get_list(&ctx, "posts", GetListParams::default()).await.unwrap();
        assert_eq!(list.data.len(), 2);
        assert_eq!(list.total, Some(2));

        let cached = ctx.query_cache().get_queries_data(&verb_filter("posts", GET_LIST));
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].1.as_ref().unwrap()["total"], json!(2));

        ctx.query_cache().invalidate_queries(&verb_filter("posts", GET_LIST));
        get_list(&ctx, "posts", GetListParams::default()).await.unwrap();
        assert_eq!(provider.call_count("get_list").await, 2);
    }

    #[tokio::test]
    async fn test_get_many_caches_array() {
        let (_provider, ctx) = context();
        let records = get_many(
            &ctx,
            "posts",
            GetManyParams {
                ids: vec![Identifier::from(2)],
                meta: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(records, vec![json!({"id": 2, "title": "B"})]);
    }

    #[tokio::test]
    async fn test_get_one_missing_record_fails() {
        let (_provider, ctx) = context();
        let error = get_one(
            &ctx,
            "posts",
            GetOneParams {
                id: Identifier::from(99),
                meta: None,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(error, crate::interfaces::CacheError::Fetch(_)));
    }
}
