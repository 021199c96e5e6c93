//! The mutation-mode engine.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use super::options::{
    CacheUpdateOptions, MutateOptions, MutateWrapperFn, MutationContext, MutationOptions,
    OnErrorFn, OnMutateFn, OnSettledFn, OnSuccessFn, OnUndoFn, QueryKeysFn, SnapshotFn,
    UpdateCacheFn,
};
use super::snapshot::Snapshot;
use super::state::MutationState;
use super::{MutationError, MutationFn, MutationParams};
use crate::cache::QueryKey;
use crate::interfaces::{DataProviderError, QueryCache};
use crate::types::MutationMode;
use crate::undo::{UndoableMutation, UndoableMutationQueue};

/// Everything one `mutate` call needs after it returns.
///
/// Owned by the dispatched task (or the queued undoable entry), so the
/// call-time callbacks still run when the issuer is long gone.
struct Invocation<P, D> {
    params: P,
    query_keys: Vec<QueryKey>,
    context: MutationContext,
    mutate: MutationFn<P, D>,
    on_success: Option<OnSuccessFn<P, D>>,
    on_error: Option<OnErrorFn<P>>,
    on_settled: Option<OnSettledFn<P, D>>,
}

struct EngineInner<P, D> {
    cache: Arc<dyn QueryCache>,
    undoable_mutations: UndoableMutationQueue,
    mutation_key: QueryKey,
    mutation_fn: MutationFn<P, D>,
    get_mutate_with_middlewares: Option<MutateWrapperFn<P, D>>,
    update_cache: Option<UpdateCacheFn<P, D>>,
    get_query_keys: Option<QueryKeysFn<P>>,
    get_snapshot: Option<SnapshotFn<P>>,
    on_undo: Option<OnUndoFn<P>>,
    on_mutate: Option<OnMutateFn<P>>,
    on_success: Option<OnSuccessFn<P, D>>,
    on_error: Option<OnErrorFn<P>>,
    on_settled: Option<OnSettledFn<P, D>>,
    return_promise: bool,
    /// Hook-time parameters, replaced by `set_params`.
    params: Mutex<P>,
    /// Current mode. Call-time overrides stick.
    mode: Mutex<MutationMode>,
    state: watch::Sender<MutationState<D>>,
}

/// Runs mutations in pessimistic, optimistic or undoable mode against a
/// shared [`QueryCache`].
///
/// Cheap to clone; clones share configuration, current mode and status.
///
/// # Example
///
/// ```ignore
/// let engine = MutationEngine::new(cache, queue, json!({}), MutationOptions::new()
///     .mutation_mode(MutationMode::Optimistic)
///     .mutation_fn(|params| async move { provider.update("posts", to_update(params)).await })
///     .update_cache(write_post)
///     .get_query_keys(|_, _| vec![query_key!["posts"]]))?;
///
/// engine.mutate(json!({"id": 1, "data": {"title": "B"}}), MutateOptions::new()).await?;
/// ```
pub struct MutationEngine<P, D> {
    inner: Arc<EngineInner<P, D>>,
}

impl<P, D> Clone for MutationEngine<P, D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, D> MutationEngine<P, D>
where
    P: MutationParams,
    D: Clone + Default + Send + Sync + 'static,
{
    /// Build an engine over `cache`, queuing undoable mutations on
    /// `undoable_mutations`.
    ///
    /// Fails with [`MutationError::MissingMutationFn`] when `options` has no
    /// mutation function.
    pub fn new(
        cache: Arc<dyn QueryCache>,
        undoable_mutations: UndoableMutationQueue,
        params: P,
        options: MutationOptions<P, D>,
    ) -> Result<Self, MutationError> {
        let MutationOptions {
            mutation_key,
            mutation_mode,
            mutation_fn,
            get_mutate_with_middlewares,
            update_cache,
            get_query_keys,
            get_snapshot,
            on_undo,
            on_mutate,
            on_success,
            on_error,
            on_settled,
            return_promise,
        } = options;

        let mutation_fn = mutation_fn.ok_or(MutationError::MissingMutationFn)?;
        let mutation_key = mutation_key.unwrap_or_else(|| {
            QueryKey::default()
                .with("mutation")
                .with(Uuid::new_v4().to_string())
        });
        let (state, _) = watch::channel(MutationState::default());

        Ok(Self {
            inner: Arc::new(EngineInner {
                cache,
                undoable_mutations,
                mutation_key,
                mutation_fn,
                get_mutate_with_middlewares,
                update_cache,
                get_query_keys,
                get_snapshot,
                on_undo,
                on_mutate,
                on_success,
                on_error,
                on_settled,
                return_promise,
                params: Mutex::new(params),
                mode: Mutex::new(mutation_mode),
                state,
            }),
        })
    }

    pub fn mutation_key(&self) -> &QueryKey {
        &self.inner.mutation_key
    }

    /// Mode the next call will use unless it overrides it.
    pub fn mutation_mode(&self) -> MutationMode {
        *self.inner.mode.lock()
    }

    /// Reconfigure the mode, as a re-render with a new hook option would.
    pub fn set_mutation_mode(&self, mode: MutationMode) {
        *self.inner.mode.lock() = mode;
    }

    /// Current hook-time parameters.
    pub fn params(&self) -> P {
        self.inner.params.lock().clone()
    }

    /// Replace the hook-time parameters used by later calls.
    ///
    /// Calls already issued keep the parameters they were issued with.
    pub fn set_params(&self, params: P) {
        *self.inner.params.lock() = params;
    }

    /// Current status.
    pub fn state(&self) -> MutationState<D> {
        self.inner.state.borrow().clone()
    }

    /// Watch status changes.
    pub fn subscribe(&self) -> watch::Receiver<MutationState<D>> {
        self.inner.state.subscribe()
    }

    /// Wait until the status is success or error.
    ///
    /// Resolves at once when the status is already settled. Queuing an
    /// undoable call resets the status to idle, so waiting on a call that
    /// is later undone does not resolve until another call settles.
    pub async fn settled(&self) -> MutationState<D> {
        let mut receiver = self.inner.state.subscribe();
        let state = match receiver.wait_for(MutationState::is_settled).await {
            Ok(state) => (*state).clone(),
            Err(_) => self.state(),
        };
        state
    }

    /// Return the status to idle.
    pub fn reset(&self) {
        self.inner.state.send_replace(MutationState::default());
    }

    /// Issue one mutation.
    ///
    /// `params` are merged over the hook-time parameters (call-time fields
    /// win) and validated before anything else happens. Then, by mode:
    ///
    /// - pessimistic: dispatch now. With `return_promise` the call awaits
    ///   the server and returns `Ok(Some(data))` or the provider error;
    ///   otherwise the call is dispatched in the background and `Ok(None)`
    ///   is returned.
    /// - optimistic: snapshot, cancel competing reads, write the cache,
    ///   schedule success callbacks for the next tick, dispatch in the
    ///   background; returns `Ok(None)`.
    /// - undoable: as optimistic, but the dispatch is queued as an
    ///   [`UndoableMutation`] instead; returns `Ok(None)`.
    ///
    /// Background work is spawned on the current tokio runtime.
    pub async fn mutate(
        &self,
        params: P,
        options: MutateOptions<P, D>,
    ) -> Result<Option<D>, MutationError> {
        let inner = &self.inner;
        let MutateOptions {
            mutation_mode,
            return_promise,
            on_success,
            on_error,
            on_settled,
        } = options;

        let params = inner.params.lock().merge(&params);
        params.validate()?;

        let mode = {
            let mut current = inner.mode.lock();
            if let Some(mode) = mutation_mode {
                *current = mode;
            }
            *current
        };

        let return_promise = return_promise.unwrap_or(inner.return_promise);
        if return_promise && mode != MutationMode::Pessimistic {
            warn!(
                mutation_key = %inner.mutation_key,
                mode = %mode,
                "return_promise can only be used in pessimistic mode, ignoring it"
            );
        }

        let cache_options = CacheUpdateOptions {
            mutation_mode: mode,
        };
        let query_keys = inner.query_keys(&params, cache_options);
        let snapshot = if mode.is_optimistic() {
            inner.snapshot(&params, cache_options, &query_keys)
        } else {
            Snapshot::default()
        };
        let context = MutationContext {
            mutation_key: inner.mutation_key.clone(),
            mutation_mode: mode,
            snapshot,
        };

        debug!(
            mutation_key = %inner.mutation_key,
            mode = %mode,
            snapshot_len = context.snapshot.len(),
            "Mutation issued"
        );

        let mut invocation = Invocation {
            params,
            query_keys,
            context,
            mutate: inner.mutate_with_middlewares(),
            on_success: None,
            on_error,
            on_settled,
        };

        if mode == MutationMode::Pessimistic {
            invocation.on_success = on_success;
            if return_promise {
                inner.begin();
                return Arc::clone(inner)
                    .execute(invocation)
                    .await
                    .map(Some)
                    .map_err(MutationError::from);
            }
            let runtime = current_runtime()?;
            inner.begin();
            runtime.spawn(Arc::clone(inner).execute(invocation));
            return Ok(None);
        }

        let runtime = current_runtime()?;

        for key in invocation.context.snapshot.keys() {
            inner.cache.cancel_queries(key);
        }

        let optimistic = inner.update_cache(&invocation.params, cache_options, None);
        debug!(mutation_key = %inner.mutation_key, "Optimistic result written");

        // Success side effects run on the next tick, never synchronously.
        if let Some(callback) = on_success.or_else(|| inner.on_success.clone()) {
            let params = invocation.params.clone();
            let context = invocation.context.clone();
            runtime.spawn(async move { callback(&optimistic, &params, &context) });
        }

        if mode == MutationMode::Optimistic {
            inner.begin();
            runtime.spawn(Arc::clone(inner).execute(invocation));
        } else {
            inner.state.send_replace(MutationState::default());
            let engine = Arc::clone(inner);
            inner
                .undoable_mutations
                .add_mutation(UndoableMutation::new(move |is_undo| {
                    if is_undo {
                        engine.undo(invocation);
                    } else {
                        engine.begin();
                        runtime.spawn(Arc::clone(&engine).execute(invocation));
                    }
                }));
            debug!(mutation_key = %inner.mutation_key, "Undoable mutation queued");
        }

        Ok(None)
    }
}

impl<P, D> EngineInner<P, D>
where
    P: MutationParams,
    D: Clone + Default + Send + Sync + 'static,
{
    fn query_keys(&self, params: &P, options: CacheUpdateOptions) -> Vec<QueryKey> {
        self.get_query_keys
            .as_ref()
            .map(|get_query_keys| get_query_keys(params, options))
            .unwrap_or_default()
    }

    fn snapshot(&self, params: &P, options: CacheUpdateOptions, query_keys: &[QueryKey]) -> Snapshot {
        match &self.get_snapshot {
            Some(get_snapshot) => get_snapshot(params, options),
            None => Snapshot::capture(self.cache.as_ref(), query_keys),
        }
    }

    fn update_cache(&self, params: &P, options: CacheUpdateOptions, result: Option<D>) -> D {
        match &self.update_cache {
            Some(update_cache) => update_cache(params, options, result),
            None => result.unwrap_or_default(),
        }
    }

    fn mutate_with_middlewares(&self) -> MutationFn<P, D> {
        match &self.get_mutate_with_middlewares {
            Some(wrap) => wrap(Arc::clone(&self.mutation_fn)),
            None => Arc::clone(&self.mutation_fn),
        }
    }

    fn begin(&self) {
        self.state.send_replace(MutationState::pending());
    }

    fn undo(&self, invocation: Invocation<P, D>) {
        let Invocation {
            params, context, ..
        } = invocation;
        if let Some(on_undo) = &self.on_undo {
            on_undo(
                &params,
                CacheUpdateOptions {
                    mutation_mode: context.mutation_mode,
                },
            );
        }
        context.snapshot.restore(self.cache.as_ref());
        debug!(mutation_key = %self.mutation_key, "Undoable mutation undone");
    }

    /// Dispatch the network call and apply its outcome.
    async fn execute(self: Arc<Self>, invocation: Invocation<P, D>) -> Result<D, DataProviderError> {
        let Invocation {
            params,
            query_keys,
            context,
            mutate,
            on_success,
            on_error,
            on_settled,
        } = invocation;
        let mode = context.mutation_mode;

        if let Some(on_mutate) = &self.on_mutate {
            on_mutate(&params, &context);
        }

        let outcome = mutate(params.clone()).await;

        match &outcome {
            Ok(data) => {
                debug!(mutation_key = %self.mutation_key, mode = %mode, "Mutation succeeded");
                // Optimistic modes already ran their success side effects.
                if mode == MutationMode::Pessimistic {
                    self.update_cache(
                        &params,
                        CacheUpdateOptions {
                            mutation_mode: mode,
                        },
                        Some(data.clone()),
                    );
                    if let Some(callback) = on_success.as_ref().or(self.on_success.as_ref()) {
                        callback(data, &params, &context);
                    }
                }
            }
            Err(error) => {
                if mode.is_optimistic() {
                    warn!(
                        mutation_key = %self.mutation_key,
                        mode = %mode,
                        error = %error,
                        "Mutation failed, rolling back optimistic update"
                    );
                    context.snapshot.restore(self.cache.as_ref());
                } else {
                    warn!(mutation_key = %self.mutation_key, error = %error, "Mutation failed");
                }
                if let Some(callback) = on_error.as_ref().or(self.on_error.as_ref()) {
                    callback(error, &params, &context);
                }
            }
        }

        if mode.is_optimistic() {
            for key in &query_keys {
                self.cache.invalidate_queries(key);
            }
        }

        if let Some(callback) = on_settled.as_ref().or(self.on_settled.as_ref()) {
            callback(outcome.as_ref().ok(), outcome.as_ref().err(), &params, &context);
        }

        self.state.send_modify(|state| state.settle(outcome.clone()));
        outcome
    }
}

fn current_runtime() -> Result<Handle, MutationError> {
    Handle::try_current().map_err(|_| MutationError::NoRuntime)
}
