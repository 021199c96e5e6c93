//! Lifecycle callbacks advice.
//!
//! Wraps any [`DataProvider`] to run per-resource hooks before and after
//! each verb without modifying the provider itself.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::debug;

use crate::interfaces::data_provider::{DataProvider, Result};
use crate::types::{
    CreateParams, DeleteManyParams, DeleteParams, GetListParams, GetManyParams,
    GetManyReferenceParams, GetOneParams, IdsResult, ListResult, ManyResult, Record,
    RecordResult, UpdateManyParams, UpdateParams,
};

/// Resource name matching every resource.
pub const ANY_RESOURCE: &str = "*";

/// One lifecycle hook.
///
/// Receives the value to transform, the wrapped provider and the resource
/// name, and resolves with the (possibly rewritten) value. Failing aborts
/// the verb with that error.
pub type Callback<T> =
    Arc<dyn Fn(T, Arc<dyn DataProvider>, String) -> BoxFuture<'static, Result<T>> + Send + Sync>;

fn callback<T, F, Fut>(f: F) -> Callback<T>
where
    F: Fn(T, Arc<dyn DataProvider>, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    Arc::new(
        move |value: T,
              provider: Arc<dyn DataProvider>,
              resource: String|
              -> BoxFuture<'static, Result<T>> { Box::pin(f(value, provider, resource)) },
    )
}

macro_rules! resource_callbacks {
    ($($(#[$doc:meta])* $hook:ident: $ty:ty),* $(,)?) => {
        /// Hooks registered for one resource (or [`ANY_RESOURCE`]).
        ///
        /// Each builder method appends a callback; callbacks of the same
        /// hook run in the order they were added.
        pub struct ResourceCallbacks {
            resource: String,
            $($hook: Vec<Callback<$ty>>,)*
        }

        impl ResourceCallbacks {
            pub fn new(resource: impl Into<String>) -> Self {
                Self {
                    resource: resource.into(),
                    $($hook: Vec::new(),)*
                }
            }

            $(
                $(#[$doc])*
                pub fn $hook<F, Fut>(mut self, f: F) -> Self
                where
                    F: Fn($ty, Arc<dyn DataProvider>, String) -> Fut + Send + Sync + 'static,
                    Fut: Future<Output = Result<$ty>> + Send + 'static,
                {
                    self.$hook.push(callback(f));
                    self
                }
            )*
        }
    };
}

resource_callbacks! {
    before_get_list: GetListParams,
    after_get_list: ListResult,
    before_get_one: GetOneParams,
    after_get_one: RecordResult,
    before_get_many: GetManyParams,
    after_get_many: ManyResult,
    before_get_many_reference: GetManyReferenceParams,
    after_get_many_reference: ListResult,
    before_create: CreateParams,
    after_create: RecordResult,
    before_update: UpdateParams,
    after_update: RecordResult,
    before_update_many: UpdateManyParams,
    after_update_many: IdsResult,
    before_delete: DeleteParams,
    after_delete: RecordResult,
    before_delete_many: DeleteManyParams,
    after_delete_many: IdsResult,
    /// Runs on the record data of `create` and `update`, after their
    /// `before_*` hooks.
    before_save: Record,
    /// Runs on every record returned by a read verb.
    after_read: Record,
    /// Runs on the record returned by `create` and `update`, and on every
    /// record touched by `update_many` (fetched back with `get_many`).
    after_save: Record,
}

impl ResourceCallbacks {
    pub fn resource(&self) -> &str {
        &self.resource
    }

    fn applies_to(&self, resource: &str) -> bool {
        self.resource == resource || self.resource == ANY_RESOURCE
    }
}

impl fmt::Debug for ResourceCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCallbacks")
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

/// Wrap `provider` so every verb runs the matching hooks of `handlers`.
///
/// # Example
///
/// ```ignore
/// let provider = with_lifecycle_callbacks(
///     provider,
///     vec![ResourceCallbacks::new("posts").before_save(|mut record, _provider, _resource| async move {
///         record["slug"] = slugify(&record["title"]);
///         Ok(record)
///     })],
/// );
/// ```
pub fn with_lifecycle_callbacks(
    provider: Arc<dyn DataProvider>,
    handlers: Vec<ResourceCallbacks>,
) -> LifecycleCallbacks {
    LifecycleCallbacks::new(provider, handlers)
}

/// Provider wrapper running lifecycle hooks around each verb.
pub struct LifecycleCallbacks {
    inner: Arc<dyn DataProvider>,
    handlers: Vec<ResourceCallbacks>,
}

type Select<T> = fn(&ResourceCallbacks) -> &[Callback<T>];

impl LifecycleCallbacks {
    pub fn new(inner: Arc<dyn DataProvider>, handlers: Vec<ResourceCallbacks>) -> Self {
        Self { inner, handlers }
    }

    /// Get a reference to the wrapped provider.
    pub fn inner(&self) -> &Arc<dyn DataProvider> {
        &self.inner
    }

    fn has_hooks<T>(&self, resource: &str, select: Select<T>) -> bool {
        self.handlers
            .iter()
            .any(|handler| handler.applies_to(resource) && !select(handler).is_empty())
    }

    /// Thread `value` through every matching hook, in registration order.
    async fn apply<T: Send>(&self, resource: &str, select: Select<T>, mut value: T) -> Result<T> {
        for handler in self.handlers.iter().filter(|handler| handler.applies_to(resource)) {
            for hook in select(handler) {
                value = hook(value, Arc::clone(&self.inner), resource.to_string()).await?;
            }
        }
        Ok(value)
    }

    async fn apply_each(
        &self,
        resource: &str,
        select: Select<Record>,
        records: Vec<Record>,
    ) -> Result<Vec<Record>> {
        if !self.has_hooks(resource, select) {
            return Ok(records);
        }
        let mut applied = Vec::with_capacity(records.len());
        for record in records {
            applied.push(self.apply(resource, select, record).await?);
        }
        Ok(applied)
    }
}

#[async_trait]
impl DataProvider for LifecycleCallbacks {
    async fn get_list(&self, resource: &str, params: GetListParams) -> Result<ListResult> {
        let params = self.apply(resource, |h| h.before_get_list.as_slice(), params).await?;
        let result = self.inner.get_list(resource, params).await?;
        let mut result = self.apply(resource, |h| h.after_get_list.as_slice(), result).await?;
        result.data = self
            .apply_each(resource, |h| h.after_read.as_slice(), result.data)
            .await?;
        Ok(result)
    }

    async fn get_one(&self, resource: &str, params: GetOneParams) -> Result<RecordResult> {
        let params = self.apply(resource, |h| h.before_get_one.as_slice(), params).await?;
        let result = self.inner.get_one(resource, params).await?;
        let mut result = self.apply(resource, |h| h.after_get_one.as_slice(), result).await?;
        result.data = self
            .apply(resource, |h| h.after_read.as_slice(), result.data)
            .await?;
        Ok(result)
    }

    async fn get_many(&self, resource: &str, params: GetManyParams) -> Result<ManyResult> {
        let params = self.apply(resource, |h| h.before_get_many.as_slice(), params).await?;
        let result = self.inner.get_many(resource, params).await?;
        let mut result = self.apply(resource, |h| h.after_get_many.as_slice(), result).await?;
        result.data = self
            .apply_each(resource, |h| h.after_read.as_slice(), result.data)
            .await?;
        Ok(result)
    }

    async fn get_many_reference(
        &self,
        resource: &str,
        params: GetManyReferenceParams,
    ) -> Result<ListResult> {
        let params = self
            .apply(resource, |h| h.before_get_many_reference.as_slice(), params)
            .await?;
        let result = self.inner.get_many_reference(resource, params).await?;
        let mut result = self
            .apply(resource, |h| h.after_get_many_reference.as_slice(), result)
            .await?;
        result.data = self
            .apply_each(resource, |h| h.after_read.as_slice(), result.data)
            .await?;
        Ok(result)
    }

    async fn create(&self, resource: &str, params: CreateParams) -> Result<RecordResult> {
        let mut params = self.apply(resource, |h| h.before_create.as_slice(), params).await?;
        params.data = self
            .apply(resource, |h| h.before_save.as_slice(), params.data)
            .await?;
        let result = self.inner.create(resource, params).await?;
        let mut result = self.apply(resource, |h| h.after_create.as_slice(), result).await?;
        result.data = self
            .apply(resource, |h| h.after_save.as_slice(), result.data)
            .await?;
        Ok(result)
    }

    async fn update(&self, resource: &str, params: UpdateParams) -> Result<RecordResult> {
        let mut params = self.apply(resource, |h| h.before_update.as_slice(), params).await?;
        params.data = self
            .apply(resource, |h| h.before_save.as_slice(), params.data)
            .await?;
        let result = self.inner.update(resource, params).await?;
        let mut result = self.apply(resource, |h| h.after_update.as_slice(), result).await?;
        result.data = self
            .apply(resource, |h| h.after_save.as_slice(), result.data)
            .await?;
        Ok(result)
    }

    async fn update_many(&self, resource: &str, params: UpdateManyParams) -> Result<IdsResult> {
        let params = self
            .apply(resource, |h| h.before_update_many.as_slice(), params)
            .await?;
        let meta = params.meta.clone();
        let result = self.inner.update_many(resource, params).await?;
        let result = self
            .apply(resource, |h| h.after_update_many.as_slice(), result)
            .await?;

        if self.has_hooks(resource, |h| h.after_save.as_slice()) {
            let records = self
                .inner
                .get_many(
                    resource,
                    GetManyParams {
                        ids: result.data.clone(),
                        meta,
                    },
                )
                .await?
                .data;
            debug!(resource, count = records.len(), "Running after_save on updated records");
            for record in records {
                self.apply(resource, |h| h.after_save.as_slice(), record).await?;
            }
        }
        Ok(result)
    }

    async fn delete(&self, resource: &str, params: DeleteParams) -> Result<RecordResult> {
        let params = self.apply(resource, |h| h.before_delete.as_slice(), params).await?;
        let result = self.inner.delete(resource, params).await?;
        self.apply(resource, |h| h.after_delete.as_slice(), result).await
    }

    async fn delete_many(&self, resource: &str, params: DeleteManyParams) -> Result<IdsResult> {
        let params = self
            .apply(resource, |h| h.before_delete_many.as_slice(), params)
            .await?;
        let result = self.inner.delete_many(resource, params).await?;
        self.apply(resource, |h| h.after_delete_many.as_slice(), result).await
    }
}
