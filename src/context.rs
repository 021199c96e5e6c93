//! Application-wide context shared by every mutation site.
//!
//! Holds the data provider, the query cache and the undoable mutation
//! queue, plus the configured mutation defaults.

use std::sync::Arc;

use tracing::info;

use crate::cache::InMemoryQueryCache;
use crate::config::Config;
use crate::interfaces::{DataProvider, QueryCache};
use crate::mutation::{MutationEngine, MutationError, MutationOptions, MutationParams};
use crate::undo::{UndoWindow, UndoableMutationQueue};

/// Shared services for an admin application.
///
/// Cheap to clone; clones share the provider, cache and queue.
#[derive(Clone)]
pub struct AdminContext {
    data_provider: Arc<dyn DataProvider>,
    query_cache: Arc<dyn QueryCache>,
    undoable_mutations: UndoableMutationQueue,
    config: Config,
}

impl AdminContext {
    /// Context over `data_provider` with an empty in-memory cache and
    /// default configuration.
    pub fn new(data_provider: Arc<dyn DataProvider>) -> Self {
        Self::from_config(data_provider, Config::default())
    }

    pub fn from_config(data_provider: Arc<dyn DataProvider>, config: Config) -> Self {
        info!(
            default_mode = %config.mutations.default_mode,
            undo_timeout_ms = config.undo.timeout_ms,
            "Admin context created"
        );
        Self {
            data_provider,
            query_cache: Arc::new(InMemoryQueryCache::new()),
            undoable_mutations: UndoableMutationQueue::new(),
            config,
        }
    }

    /// Replace the query cache.
    pub fn with_query_cache(mut self, query_cache: Arc<dyn QueryCache>) -> Self {
        self.query_cache = query_cache;
        self
    }

    pub fn data_provider(&self) -> &Arc<dyn DataProvider> {
        &self.data_provider
    }

    pub fn query_cache(&self) -> &Arc<dyn QueryCache> {
        &self.query_cache
    }

    pub fn undoable_mutations(&self) -> &UndoableMutationQueue {
        &self.undoable_mutations
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Mutation options pre-filled with the configured defaults.
    pub fn mutation_options<P, D>(&self) -> MutationOptions<P, D>
    where
        P: Send + 'static,
        D: Send + 'static,
    {
        MutationOptions::new()
            .mutation_mode(self.config.mutations.default_mode)
            .return_promise(self.config.mutations.return_promise)
    }

    /// Build an engine bound to this context's cache and undo queue.
    pub fn engine<P, D>(
        &self,
        params: P,
        options: MutationOptions<P, D>,
    ) -> Result<MutationEngine<P, D>, MutationError>
    where
        P: MutationParams,
        D: Clone + Default + Send + Sync + 'static,
    {
        MutationEngine::new(
            Arc::clone(&self.query_cache),
            self.undoable_mutations.clone(),
            params,
            options,
        )
    }

    /// Undo window draining this context's queue with the configured delay.
    pub fn undo_window(&self) -> UndoWindow {
        UndoWindow::from_config(self.undoable_mutations.clone(), &self.config.undo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::MutateOptions;
    use crate::test_utils::MockDataProvider;
    use crate::types::MutationMode;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_engines_share_queue_and_cache() {
        let ctx = AdminContext::new(Arc::new(MockDataProvider::new()));
        let engine = ctx
            .engine(
                json!({}),
                ctx.mutation_options::<Value, Value>()
                    .mutation_mode(MutationMode::Undoable)
                    .mutation_fn(|_params: Value| async { Ok(json!(null)) }),
            )
            .unwrap();

        engine.mutate(json!({}), MutateOptions::new()).await.unwrap();

        assert_eq!(ctx.undoable_mutations().len(), 1);
        assert_eq!(ctx.undo_window().flush(), 1);
    }

    #[test]
    fn test_config_defaults_flow_into_engines() {
        let config = Config::from_yaml(
            "mutations:\n  default_mode: optimistic\nundo:\n  timeout_ms: 250\n",
        )
        .unwrap();
        let ctx = AdminContext::from_config(Arc::new(MockDataProvider::new()), config);

        let engine = ctx
            .engine(
                json!({}),
                ctx.mutation_options::<Value, Value>()
                    .mutation_fn(|_params: Value| async { Ok(json!(null)) }),
            )
            .unwrap();

        assert_eq!(engine.mutation_mode(), MutationMode::Optimistic);
        assert_eq!(ctx.undo_window().timeout().as_millis(), 250);
    }
}
