//! Mutation middleware chain.
//!
//! Middlewares wrap the network call of a mutation. Each receives the
//! parameters and a `next` function: calling `next` (possibly with
//! rewritten parameters) continues down the chain, returning without
//! calling it short-circuits the mutation entirely.
//!
//! The most recently registered middleware runs first; its `next` leads to
//! the one registered before it, and so on down to the base mutation.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{MutationFn, MutationFuture};
use crate::interfaces::DataProviderError;

/// Interceptor around a mutation function.
pub type Middleware<P, D> = Arc<dyn Fn(P, MutationFn<P, D>) -> MutationFuture<D> + Send + Sync>;

/// Box an async closure into a [`Middleware`].
pub fn middleware<P, D, F, Fut>(f: F) -> Middleware<P, D>
where
    F: Fn(P, MutationFn<P, D>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<D, DataProviderError>> + Send + 'static,
{
    Arc::new(move |params: P, next: MutationFn<P, D>| -> MutationFuture<D> {
        Box::pin(f(params, next))
    })
}

/// Registry of middlewares for one mutation site.
///
/// Cloning yields another handle to the same registry, so components far
/// from the engine can register interceptors without the engine knowing
/// about them.
pub struct MutationMiddlewares<P, D> {
    middlewares: Arc<Mutex<Vec<Middleware<P, D>>>>,
}

impl<P, D> Clone for MutationMiddlewares<P, D> {
    fn clone(&self) -> Self {
        Self {
            middlewares: Arc::clone(&self.middlewares),
        }
    }
}

impl<P, D> Default for MutationMiddlewares<P, D> {
    fn default() -> Self {
        Self {
            middlewares: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<P, D> fmt::Debug for MutationMiddlewares<P, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationMiddlewares")
            .field("registered", &self.middlewares.lock().len())
            .finish()
    }
}

impl<P, D> MutationMiddlewares<P, D>
where
    P: Send + 'static,
    D: Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware. It will run before every one registered so far.
    pub fn register(&self, middleware: Middleware<P, D>) {
        self.middlewares.lock().push(middleware);
    }

    /// Remove every registration of `middleware` (compared by identity).
    ///
    /// Unregistering a middleware that was never registered does nothing.
    pub fn unregister(&self, middleware: &Middleware<P, D>) {
        self.middlewares
            .lock()
            .retain(|registered| !Arc::ptr_eq(registered, middleware));
    }

    pub fn len(&self) -> usize {
        self.middlewares.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.lock().is_empty()
    }

    /// Wrap `base` with the middlewares registered right now.
    ///
    /// Later registrations do not affect the returned function.
    pub fn get_mutate_with_middlewares(&self, base: MutationFn<P, D>) -> MutationFn<P, D> {
        let middlewares = self.middlewares.lock().clone();
        middlewares.into_iter().fold(base, |next, middleware| {
            let wrapped: MutationFn<P, D> =
                Arc::new(move |params: P| middleware(params, Arc::clone(&next)));
            wrapped
        })
    }
}
