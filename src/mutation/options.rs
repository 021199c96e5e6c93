//! Hook-time and call-time mutation options.

use std::future::Future;
use std::sync::Arc;

use super::middleware::MutationMiddlewares;
use super::snapshot::Snapshot;
use super::{mutation_fn, MutationFn};
use crate::cache::QueryKey;
use crate::interfaces::DataProviderError;
use crate::types::MutationMode;

/// Options handed to the cache hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheUpdateOptions {
    pub mutation_mode: MutationMode,
}

/// Context passed to lifecycle callbacks.
#[derive(Debug, Clone)]
pub struct MutationContext {
    pub mutation_key: QueryKey,
    pub mutation_mode: MutationMode,
    /// Cache state captured before the optimistic write; empty in
    /// pessimistic mode.
    pub snapshot: Snapshot,
}

/// Writes a mutation's effect into the cache and returns the resulting
/// data. Receives `None` for optimistic writes, the server result otherwise.
pub type UpdateCacheFn<P, D> = Arc<dyn Fn(&P, CacheUpdateOptions, Option<D>) -> D + Send + Sync>;
/// Cache key filters a mutation touches.
pub type QueryKeysFn<P> = Arc<dyn Fn(&P, CacheUpdateOptions) -> Vec<QueryKey> + Send + Sync>;
/// Custom snapshot capture.
pub type SnapshotFn<P> = Arc<dyn Fn(&P, CacheUpdateOptions) -> Snapshot + Send + Sync>;
pub type OnUndoFn<P> = Arc<dyn Fn(&P, CacheUpdateOptions) + Send + Sync>;
pub type OnMutateFn<P> = Arc<dyn Fn(&P, &MutationContext) + Send + Sync>;
pub type OnSuccessFn<P, D> = Arc<dyn Fn(&D, &P, &MutationContext) + Send + Sync>;
pub type OnErrorFn<P> = Arc<dyn Fn(&DataProviderError, &P, &MutationContext) + Send + Sync>;
pub type OnSettledFn<P, D> =
    Arc<dyn Fn(Option<&D>, Option<&DataProviderError>, &P, &MutationContext) + Send + Sync>;
/// Wraps the mutation function, typically with a middleware chain.
pub type MutateWrapperFn<P, D> = Arc<dyn Fn(MutationFn<P, D>) -> MutationFn<P, D> + Send + Sync>;

/// Hook-time configuration of a [`MutationEngine`](super::MutationEngine).
pub struct MutationOptions<P, D> {
    pub(crate) mutation_key: Option<QueryKey>,
    pub(crate) mutation_mode: MutationMode,
    pub(crate) mutation_fn: Option<MutationFn<P, D>>,
    pub(crate) get_mutate_with_middlewares: Option<MutateWrapperFn<P, D>>,
    pub(crate) update_cache: Option<UpdateCacheFn<P, D>>,
    pub(crate) get_query_keys: Option<QueryKeysFn<P>>,
    pub(crate) get_snapshot: Option<SnapshotFn<P>>,
    pub(crate) on_undo: Option<OnUndoFn<P>>,
    pub(crate) on_mutate: Option<OnMutateFn<P>>,
    pub(crate) on_success: Option<OnSuccessFn<P, D>>,
    pub(crate) on_error: Option<OnErrorFn<P>>,
    pub(crate) on_settled: Option<OnSettledFn<P, D>>,
    pub(crate) return_promise: bool,
}

impl<P, D> Default for MutationOptions<P, D> {
    fn default() -> Self {
        Self {
            mutation_key: None,
            mutation_mode: MutationMode::default(),
            mutation_fn: None,
            get_mutate_with_middlewares: None,
            update_cache: None,
            get_query_keys: None,
            get_snapshot: None,
            on_undo: None,
            on_mutate: None,
            on_success: None,
            on_error: None,
            on_settled: None,
            return_promise: false,
        }
    }
}

impl<P, D> MutationOptions<P, D>
where
    P: Send + 'static,
    D: Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mutation_key(mut self, key: QueryKey) -> Self {
        self.mutation_key = Some(key);
        self
    }

    pub fn mutation_mode(mut self, mode: MutationMode) -> Self {
        self.mutation_mode = mode;
        self
    }

    pub fn mutation_fn<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<D, DataProviderError>> + Send + 'static,
    {
        self.mutation_fn = Some(mutation_fn(f));
        self
    }

    pub fn boxed_mutation_fn(mut self, f: MutationFn<P, D>) -> Self {
        self.mutation_fn = Some(f);
        self
    }

    pub fn get_mutate_with_middlewares(
        mut self,
        f: impl Fn(MutationFn<P, D>) -> MutationFn<P, D> + Send + Sync + 'static,
    ) -> Self {
        self.get_mutate_with_middlewares = Some(Arc::new(f));
        self
    }

    /// Route every call through the middlewares registered in `registry`
    /// at the time of the call.
    pub fn middlewares(self, registry: MutationMiddlewares<P, D>) -> Self {
        self.get_mutate_with_middlewares(move |base| registry.get_mutate_with_middlewares(base))
    }

    pub fn update_cache(
        mut self,
        f: impl Fn(&P, CacheUpdateOptions, Option<D>) -> D + Send + Sync + 'static,
    ) -> Self {
        self.update_cache = Some(Arc::new(f));
        self
    }

    pub fn get_query_keys(
        mut self,
        f: impl Fn(&P, CacheUpdateOptions) -> Vec<QueryKey> + Send + Sync + 'static,
    ) -> Self {
        self.get_query_keys = Some(Arc::new(f));
        self
    }

    pub fn get_snapshot(
        mut self,
        f: impl Fn(&P, CacheUpdateOptions) -> Snapshot + Send + Sync + 'static,
    ) -> Self {
        self.get_snapshot = Some(Arc::new(f));
        self
    }

    pub fn on_undo(mut self, f: impl Fn(&P, CacheUpdateOptions) + Send + Sync + 'static) -> Self {
        self.on_undo = Some(Arc::new(f));
        self
    }

    pub fn on_mutate(mut self, f: impl Fn(&P, &MutationContext) + Send + Sync + 'static) -> Self {
        self.on_mutate = Some(Arc::new(f));
        self
    }

    pub fn on_success(
        mut self,
        f: impl Fn(&D, &P, &MutationContext) + Send + Sync + 'static,
    ) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_error(
        mut self,
        f: impl Fn(&DataProviderError, &P, &MutationContext) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn on_settled(
        mut self,
        f: impl Fn(Option<&D>, Option<&DataProviderError>, &P, &MutationContext)
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.on_settled = Some(Arc::new(f));
        self
    }

    pub fn return_promise(mut self, return_promise: bool) -> Self {
        self.return_promise = return_promise;
        self
    }
}

/// Per-call options of [`MutationEngine::mutate`](super::MutationEngine::mutate).
///
/// Callbacks given here take precedence over the hook-time ones.
pub struct MutateOptions<P, D> {
    pub(crate) mutation_mode: Option<MutationMode>,
    pub(crate) return_promise: Option<bool>,
    pub(crate) on_success: Option<OnSuccessFn<P, D>>,
    pub(crate) on_error: Option<OnErrorFn<P>>,
    pub(crate) on_settled: Option<OnSettledFn<P, D>>,
}

impl<P, D> Default for MutateOptions<P, D> {
    fn default() -> Self {
        Self {
            mutation_mode: None,
            return_promise: None,
            on_success: None,
            on_error: None,
            on_settled: None,
        }
    }
}

impl<P, D> MutateOptions<P, D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch the engine's mode. The change persists to later calls.
    pub fn mutation_mode(mut self, mode: MutationMode) -> Self {
        self.mutation_mode = Some(mode);
        self
    }

    /// Await the server result. Only honored in pessimistic mode.
    pub fn return_promise(mut self, return_promise: bool) -> Self {
        self.return_promise = Some(return_promise);
        self
    }

    pub fn on_success(
        mut self,
        f: impl Fn(&D, &P, &MutationContext) + Send + Sync + 'static,
    ) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_error(
        mut self,
        f: impl Fn(&DataProviderError, &P, &MutationContext) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn on_settled(
        mut self,
        f: impl Fn(Option<&D>, Option<&DataProviderError>, &P, &MutationContext)
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.on_settled = Some(Arc::new(f));
        self
    }
}
