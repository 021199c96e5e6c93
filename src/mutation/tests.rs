use super::*;
use crate::cache::{InMemoryQueryCache, QueryKey};
use crate::interfaces::QueryCache;
use crate::query_key;
use crate::types::MutationMode;
use crate::undo::UndoableMutationQueue;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::oneshot;

fn post_key() -> QueryKey {
    query_key!["posts", "getOne", {"id": "1"}]
}

fn seeded_cache() -> Arc<InMemoryQueryCache> {
    let cache = Arc::new(InMemoryQueryCache::new());
    cache.set_query_data(&post_key(), Some(json!({"id": 1, "title": "A"})));
    cache.set_query_data(&query_key!["comments", "getOne", {"id": "9"}], Some(json!({"id": 9})));
    cache
}

/// Options writing `params.data` over the cached post and reporting the
/// `posts` resource as affected.
fn post_options(cache: &Arc<InMemoryQueryCache>) -> MutationOptions<Value, Value> {
    let writer = Arc::clone(cache);
    MutationOptions::new()
        .update_cache(move |params: &Value, _options, result: Option<Value>| {
            let data = result.unwrap_or_else(|| {
                let mut record = writer.get_query_data(&post_key()).unwrap_or(json!({}));
                if let (Some(record), Some(changes)) =
                    (record.as_object_mut(), params["data"].as_object())
                {
                    for (field, value) in changes {
                        record.insert(field.clone(), value.clone());
                    }
                }
                record
            });
            writer.set_query_data(&post_key(), Some(data.clone()));
            data
        })
        .get_query_keys(|_params: &Value, _options| vec![query_key!["posts"]])
}

fn engine(
    cache: &Arc<InMemoryQueryCache>,
    queue: &UndoableMutationQueue,
    options: MutationOptions<Value, Value>,
) -> MutationEngine<Value, Value> {
    let cache: Arc<dyn QueryCache> = cache.clone();
    MutationEngine::new(cache, queue.clone(), json!({}), options).unwrap()
}

fn title(cache: &InMemoryQueryCache) -> Value {
    cache.get_query_data(&post_key()).unwrap_or(Value::Null)["title"].clone()
}

#[tokio::test]
async fn test_missing_mutation_fn_is_rejected() {
    let cache: Arc<dyn QueryCache> = Arc::new(InMemoryQueryCache::new());
    let result = MutationEngine::<Value, Value>::new(
        cache,
        UndoableMutationQueue::new(),
        json!({}),
        MutationOptions::new(),
    );
    assert_eq!(result.err(), Some(MutationError::MissingMutationFn));
}

#[tokio::test]
async fn test_pessimistic_writes_server_result() {
    let cache = seeded_cache();
    let queue = UndoableMutationQueue::new();
    let engine = engine(
        &cache,
        &queue,
        post_options(&cache).mutation_fn(|_params: Value| async {
            Ok(json!({"id": 1, "title": "server"}))
        }),
    );

    let result = engine
        .mutate(json!({"data": {"title": "B"}}), MutateOptions::new().return_promise(true))
        .await
        .unwrap();

    assert_eq!(result, Some(json!({"id": 1, "title": "server"})));
    assert_eq!(title(&cache), json!("server"));
    assert!(engine.state().is_success());
    // Pessimistic settles do not invalidate.
    assert!(!cache.is_invalidated(&post_key()));
}

#[tokio::test]
async fn test_pessimistic_does_not_touch_cache_before_server_answers() {
    let cache = seeded_cache();
    let queue = UndoableMutationQueue::new();
    let (release, gate) = oneshot::channel::<()>();
    let gate = Arc::new(Mutex::new(Some(gate)));
    let engine = engine(
        &cache,
        &queue,
        post_options(&cache).mutation_fn(move |_params: Value| {
            let gate = gate.lock().take();
            async move {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                Ok(json!({"id": 1, "title": "server"}))
            }
        }),
    );

    let result = engine
        .mutate(json!({"data": {"title": "B"}}), MutateOptions::new())
        .await
        .unwrap();
    assert_eq!(result, None);
    tokio::task::yield_now().await;
    assert_eq!(title(&cache), json!("A"));
    assert!(engine.state().is_loading());

    release.send(()).unwrap();
    let state = engine.settled().await;
    assert!(state.is_success());
    assert_eq!(title(&cache), json!("server"));
}

#[tokio::test]
async fn test_pessimistic_failure_leaves_cache_untouched() {
    let cache = seeded_cache();
    let queue = UndoableMutationQueue::new();
    let before = cache.get_queries_data(&QueryKey::default());
    let errors = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&errors);
    let engine = engine(
        &cache,
        &queue,
        post_options(&cache)
            .mutation_fn(|_params: Value| async { Err(DataProviderError::rejected("boom")) })
            .on_error(move |error, _params, _context| seen.lock().push(error.to_string())),
    );

    let result = engine
        .mutate(json!({"data": {"title": "B"}}), MutateOptions::new().return_promise(true))
        .await;

    assert_eq!(
        result,
        Err(MutationError::Provider(DataProviderError::rejected("boom")))
    );
    assert_eq!(cache.get_queries_data(&QueryKey::default()), before);
    assert_eq!(errors.lock().len(), 1);
    assert!(engine.state().is_error());
}

#[tokio::test]
async fn test_optimistic_writes_before_dispatch_and_rolls_back() {
    let cache = seeded_cache();
    let queue = UndoableMutationQueue::new();
    let (release, gate) = oneshot::channel::<()>();
    let gate = Arc::new(Mutex::new(Some(gate)));
    let engine = engine(
        &cache,
        &queue,
        post_options(&cache)
            .mutation_mode(MutationMode::Optimistic)
            .mutation_fn(move |_params: Value| {
                let gate = gate.lock().take();
                async move {
                    if let Some(gate) = gate {
                        let _ = gate.await;
                    }
                    Err(DataProviderError::rejected("boom"))
                }
            }),
    );

    engine
        .mutate(json!({"data": {"title": "B"}}), MutateOptions::new())
        .await
        .unwrap();
    assert_eq!(title(&cache), json!("B"));

    // Unrelated write made while the call is in flight.
    let unrelated = query_key!["comments", "getOne", {"id": "9"}];
    cache.set_query_data(&unrelated, Some(json!({"id": 9, "body": "new"})));

    release.send(()).unwrap();
    let state = engine.settled().await;

    assert!(state.is_error());
    assert_eq!(title(&cache), json!("A"));
    assert_eq!(cache.get_query_data(&unrelated), Some(json!({"id": 9, "body": "new"})));
    assert!(cache.is_invalidated(&post_key()));
    assert!(!cache.is_invalidated(&unrelated));
}

#[tokio::test]
async fn test_optimistic_success_callback_runs_on_next_tick() {
    let cache = seeded_cache();
    let queue = UndoableMutationQueue::new();
    let successes = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&successes);
    let engine = engine(
        &cache,
        &queue,
        post_options(&cache)
            .mutation_mode(MutationMode::Optimistic)
            .mutation_fn(|_params: Value| async { Ok(json!({"id": 1, "title": "server"})) })
            .on_success(move |data: &Value, _params, context| {
                seen.lock().push((data.clone(), context.mutation_mode))
            }),
    );

    engine
        .mutate(json!({"data": {"title": "B"}}), MutateOptions::new())
        .await
        .unwrap();
    assert!(successes.lock().is_empty());

    engine.settled().await;
    tokio::task::yield_now().await;

    // Called once, with the optimistic result rather than the server's.
    assert_eq!(
        *successes.lock(),
        vec![(json!({"id": 1, "title": "B"}), MutationMode::Optimistic)]
    );
    // The server result is not written in optimistic mode.
    assert_eq!(title(&cache), json!("B"));
    assert!(cache.is_invalidated(&post_key()));
}

#[tokio::test]
async fn test_optimistic_cancels_in_flight_reads() {
    let cache = seeded_cache();
    let queue = UndoableMutationQueue::new();
    let (_release, gate) = oneshot::channel::<()>();

    let reader = Arc::clone(&cache);
    let read = tokio::spawn(async move {
        reader
            .fetch_query(
                &post_key(),
                Box::pin(async move {
                    let _ = gate.await;
                    Ok::<_, DataProviderError>(json!({"id": 1, "title": "stale"}))
                }),
            )
            .await
    });
    tokio::task::yield_now().await;
    assert!(cache.is_fetching(&post_key()));

    let engine = engine(
        &cache,
        &queue,
        post_options(&cache)
            .mutation_mode(MutationMode::Optimistic)
            .mutation_fn(|_params: Value| async { Ok(json!({"id": 1, "title": "B"})) }),
    );
    engine
        .mutate(json!({"data": {"title": "B"}}), MutateOptions::new())
        .await
        .unwrap();

    assert!(read.await.unwrap().is_err());
    assert_eq!(title(&cache), json!("B"));
}

#[tokio::test]
async fn test_mode_override_is_sticky() {
    let cache = seeded_cache();
    let queue = UndoableMutationQueue::new();
    let engine = engine(
        &cache,
        &queue,
        post_options(&cache).mutation_fn(|params: Value| async move { Ok(params["data"].clone()) }),
    );
    assert_eq!(engine.mutation_mode(), MutationMode::Pessimistic);

    engine
        .mutate(
            json!({"data": {"title": "B"}}),
            MutateOptions::new().mutation_mode(MutationMode::Undoable),
        )
        .await
        .unwrap();
    assert_eq!(queue.len(), 1);

    engine
        .mutate(json!({"data": {"title": "C"}}), MutateOptions::new())
        .await
        .unwrap();
    assert_eq!(engine.mutation_mode(), MutationMode::Undoable);
    assert_eq!(queue.len(), 2);
}

#[tokio::test]
async fn test_return_promise_ignored_outside_pessimistic_mode() {
    let cache = seeded_cache();
    let queue = UndoableMutationQueue::new();
    let engine = engine(
        &cache,
        &queue,
        post_options(&cache)
            .mutation_mode(MutationMode::Optimistic)
            .return_promise(true)
            .mutation_fn(|_params: Value| async { Err(DataProviderError::rejected("boom")) }),
    );

    let result = engine
        .mutate(json!({"data": {"title": "B"}}), MutateOptions::new())
        .await;

    assert_eq!(result, Ok(None));
    assert!(engine.settled().await.is_error());
}

#[tokio::test]
async fn test_call_time_callbacks_take_precedence() {
    let cache = seeded_cache();
    let queue = UndoableMutationQueue::new();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let (hook_success, hook_settled) = (Arc::clone(&calls), Arc::clone(&calls));
    let engine = engine(
        &cache,
        &queue,
        post_options(&cache)
            .mutation_fn(|_params: Value| async { Ok(json!({"id": 1})) })
            .on_success(move |_data, _params, _context| hook_success.lock().push("hook success"))
            .on_settled(move |_data, _error, _params, _context| {
                hook_settled.lock().push("hook settled")
            }),
    );

    let call_success = Arc::clone(&calls);
    engine
        .mutate(
            json!({}),
            MutateOptions::new()
                .return_promise(true)
                .on_success(move |_data, _params, _context| call_success.lock().push("call success")),
        )
        .await
        .unwrap();

    assert_eq!(*calls.lock(), vec!["call success", "hook settled"]);
}

#[tokio::test]
async fn test_params_merge_and_validation() {
    #[derive(Debug, Clone, Default, PartialEq)]
    struct Params {
        id: Option<i64>,
        data: Option<Value>,
    }

    impl MutationParams for Params {
        fn merge(&self, overrides: &Self) -> Self {
            Self {
                id: overrides.id.or(self.id),
                data: overrides.data.clone().or_else(|| self.data.clone()),
            }
        }

        fn validate(&self) -> Result<(), MutationError> {
            if self.id.is_none() {
                return Err(MutationError::MissingParameter("id"));
            }
            Ok(())
        }
    }

    let received = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&received);
    let cache: Arc<dyn QueryCache> = Arc::new(InMemoryQueryCache::new());
    let engine = MutationEngine::new(
        cache,
        UndoableMutationQueue::new(),
        Params {
            id: None,
            data: Some(json!({"title": "hook"})),
        },
        MutationOptions::new().mutation_fn(move |params: Params| {
            seen.lock().push(params.clone());
            async move { Ok(params.data.unwrap_or_default()) }
        }),
    )
    .unwrap();

    let missing = engine
        .mutate(Params::default(), MutateOptions::new().return_promise(true))
        .await;
    assert_eq!(missing, Err(MutationError::MissingParameter("id")));
    assert!(received.lock().is_empty());
    assert!(engine.state().is_idle());

    engine
        .mutate(
            Params {
                id: Some(1),
                data: None,
            },
            MutateOptions::new().return_promise(true),
        )
        .await
        .unwrap();
    assert_eq!(
        *received.lock(),
        vec![Params {
            id: Some(1),
            data: Some(json!({"title": "hook"})),
        }]
    );
}

#[tokio::test]
async fn test_set_params_affects_later_calls() {
    let cache: Arc<dyn QueryCache> = Arc::new(InMemoryQueryCache::new());
    let engine = MutationEngine::new(
        cache,
        UndoableMutationQueue::new(),
        json!({"resource": "posts"}),
        MutationOptions::new().mutation_fn(|params: Value| async move { Ok(params) }),
    )
    .unwrap();

    engine.set_params(json!({"resource": "comments"}));
    let result = engine
        .mutate(json!({"id": 1}), MutateOptions::new().return_promise(true))
        .await
        .unwrap();

    assert_eq!(result, Some(json!({"resource": "comments", "id": 1})));
}

#[tokio::test]
async fn test_undoable_undo_restores_without_network_call() {
    let cache = seeded_cache();
    let queue = UndoableMutationQueue::new();
    let calls = Arc::new(Mutex::new(0));
    let undos = Arc::new(Mutex::new(0));
    let (counted, undone) = (Arc::clone(&calls), Arc::clone(&undos));
    let engine = engine(
        &cache,
        &queue,
        post_options(&cache)
            .mutation_mode(MutationMode::Undoable)
            .mutation_fn(move |_params: Value| {
                *counted.lock() += 1;
                async { Ok(json!({"id": 1})) }
            })
            .on_undo(move |_params, options| {
                assert_eq!(options.mutation_mode, MutationMode::Undoable);
                *undone.lock() += 1;
            }),
    );

    engine
        .mutate(json!({"data": {"title": "B"}}), MutateOptions::new())
        .await
        .unwrap();
    assert_eq!(title(&cache), json!("B"));
    assert!(engine.state().is_idle());

    queue.take_mutation().unwrap().undo();
    tokio::task::yield_now().await;

    assert_eq!(title(&cache), json!("A"));
    assert_eq!(*calls.lock(), 0);
    assert_eq!(*undos.lock(), 1);
    assert!(!cache.is_invalidated(&post_key()));
}

#[tokio::test]
async fn test_undoable_commit_dispatches_once() {
    let cache = seeded_cache();
    let queue = UndoableMutationQueue::new();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let counted = Arc::clone(&calls);
    let engine = engine(
        &cache,
        &queue,
        post_options(&cache)
            .mutation_mode(MutationMode::Undoable)
            .mutation_fn(move |params: Value| {
                counted.lock().push(params.clone());
                async { Ok(json!({"id": 1, "title": "server"})) }
            }),
    );

    engine
        .mutate(json!({"data": {"title": "B"}}), MutateOptions::new())
        .await
        .unwrap();
    assert!(calls.lock().is_empty());

    queue.take_mutation().unwrap().commit();
    let state = engine.settled().await;

    assert!(state.is_success());
    assert_eq!(*calls.lock(), vec![json!({"data": {"title": "B"}})]);
    assert_eq!(title(&cache), json!("B"));
    assert!(cache.is_invalidated(&post_key()));
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_undoable_commit_failure_rolls_back_before_invalidating() {
    let cache = seeded_cache();
    let queue = UndoableMutationQueue::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let (failed, settled) = (Arc::clone(&events), Arc::clone(&events));
    let reader = Arc::clone(&cache);
    let engine = engine(
        &cache,
        &queue,
        post_options(&cache)
            .mutation_mode(MutationMode::Undoable)
            .mutation_fn(|_params: Value| async {
                Err(DataProviderError::with_code("rejected", "conflict"))
            })
            .on_error(move |error, _params, _context| {
                failed.lock().push(format!("error {}", error.code().unwrap_or_default()))
            })
            .on_settled(move |_data, _error, _params, _context| {
                settled.lock().push(format!(
                    "settled title={} invalidated={}",
                    reader.get_query_data(&post_key()).unwrap_or(Value::Null)["title"],
                    reader.is_invalidated(&post_key())
                ))
            }),
    );

    engine
        .mutate(json!({"data": {"title": "B"}}), MutateOptions::new())
        .await
        .unwrap();
    queue.take_mutation().unwrap().commit();
    let state = engine.settled().await;

    assert!(state.is_error());
    assert_eq!(title(&cache), json!("A"));
    assert!(cache.is_invalidated(&post_key()));
    assert_eq!(
        *events.lock(),
        vec![
            "error conflict".to_string(),
            "settled title=\"A\" invalidated=true".to_string()
        ]
    );
}

#[tokio::test]
async fn test_queuing_undoable_call_resets_settled_status() {
    let cache = seeded_cache();
    let queue = UndoableMutationQueue::new();
    let engine = engine(
        &cache,
        &queue,
        post_options(&cache).mutation_fn(|params: Value| async move { Ok(params["data"].clone()) }),
    );

    engine
        .mutate(
            json!({"data": {"title": "B"}}),
            MutateOptions::new().return_promise(true),
        )
        .await
        .unwrap();
    assert!(engine.state().is_success());

    engine
        .mutate(
            json!({"data": {"title": "C"}}),
            MutateOptions::new().mutation_mode(MutationMode::Undoable),
        )
        .await
        .unwrap();
    assert!(engine.state().is_idle());

    queue.take_mutation().unwrap().undo();
    let waited = tokio::time::timeout(std::time::Duration::from_millis(20), engine.settled()).await;
    assert!(waited.is_err());
    assert_eq!(title(&cache), json!("B"));
}

#[tokio::test]
async fn test_middleware_registry_rewrites_params() {
    let cache = seeded_cache();
    let queue = UndoableMutationQueue::new();
    let registry: MutationMiddlewares<Value, Value> = MutationMiddlewares::new();
    let engine = engine(
        &cache,
        &queue,
        post_options(&cache)
            .middlewares(registry.clone())
            .mutation_fn(|params: Value| async move { Ok(params["data"].clone()) }),
    );

    // Registered after the engine was built, but before the call.
    registry.register(middleware(|mut params: Value, next: MutationFn<Value, Value>| {
        params["data"]["b"] = json!(2);
        next(params)
    }));

    let result = engine
        .mutate(json!({"data": {"a": 1}}), MutateOptions::new().return_promise(true))
        .await
        .unwrap();

    assert_eq!(result, Some(json!({"a": 1, "b": 2})));
}

#[tokio::test]
async fn test_reset_returns_to_idle() {
    let cache: Arc<dyn QueryCache> = Arc::new(InMemoryQueryCache::new());
    let engine = MutationEngine::new(
        cache,
        UndoableMutationQueue::new(),
        json!({}),
        MutationOptions::new().mutation_fn(|_params: Value| async { Ok(json!(1)) }),
    )
    .unwrap();

    engine
        .mutate(json!({}), MutateOptions::new().return_promise(true))
        .await
        .unwrap();
    assert!(engine.state().is_success());

    engine.reset();
    assert!(engine.state().is_idle());
}

#[test]
fn test_value_params_merge() {
    let base = json!({"resource": "posts", "id": 1});
    assert_eq!(
        base.merge(&json!({"id": 2, "data": {}})),
        json!({"resource": "posts", "id": 2, "data": {}})
    );
    assert_eq!(base.merge(&Value::Null), base);
}
