//! Event routing and handler chains.
//!
//! A [`Router`] is assembled at startup: middleware added with
//! [`Router::wrap`] is prepended to every route registered *afterwards* on the
//! same router or its groups. Once the server starts, the router is frozen
//! into a read-only [`RouteTable`] shared by all connections without locking.

use std::{collections::HashMap, fmt, iter, sync::Arc};

use async_trait::async_trait;
use futures::future::BoxFuture;
use log::warn;

use crate::{
    context::Context,
    message::{NOT_FOUND, NOT_FOUND_BODY},
};

/// A step in a handler chain.
///
/// Middleware calls [`Context::next`] to run the rest of the chain and
/// resumes once it has finished. Handlers that return without calling `next`
/// are followed by the next one in line; [`Context::abort`] ends the chain.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Handle the request held by `ctx`.
    async fn call(&self, ctx: &mut Context);
}

/// Shared reference to a handler.
pub type HandlerRef = Arc<dyn Handler>;

/// Adapter turning a closure into a [`Handler`]; see [`handler_fn`].
pub struct FnHandler<F>(F);

/// Build a handler from a closure returning a boxed future.
///
/// # Examples
///
/// ```
/// use eventwire::router::{Router, handler_fn};
///
/// let router = Router::new().route(
///     1,
///     handler_fn(|ctx| {
///         Box::pin(async move {
///             let body = ctx.request().body().clone();
///             let _ = ctx.send(1, body).await;
///         })
///     }),
/// );
/// assert!(router.contains(1));
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    async fn call(&self, ctx: &mut Context) { (self.0)(ctx).await }
}

/// Built-in handler answering unknown events with the reserved 404 response.
#[derive(Clone, Copy, Debug, Default)]
pub struct NotFound;

#[async_trait]
impl Handler for NotFound {
    async fn call(&self, ctx: &mut Context) {
        if let Err(e) = ctx.send(NOT_FOUND, NOT_FOUND_BODY).await {
            warn!(
                "not-found response failed: connection_id={}, event={}, error={e}",
                ctx.connection().id(),
                ctx.request().event()
            );
        }
    }
}

type Chain = Arc<[HandlerRef]>;

/// Builder mapping event identifiers to handler chains.
///
/// A group is itself a `Router` that starts from its parent's middleware;
/// middleware added inside the group does not leak back to the parent.
///
/// # Examples
///
/// ```
/// use eventwire::{
///     middleware::{Logger, Recovery},
///     router::{Router, handler_fn},
/// };
///
/// let echo = || handler_fn(|ctx| Box::pin(async move { let _ = ctx.send(0, "pong").await; }));
///
/// let table = Router::new()
///     .wrap(Recovery)
///     .route(0, echo())
///     .group(|admin| admin.wrap(Logger).route(100, echo()))
///     .into_table();
///
/// assert_eq!(table.chain(0).len(), 2);
/// assert_eq!(table.chain(100).len(), 3);
/// ```
#[derive(Default)]
pub struct Router {
    prefix: Vec<HandlerRef>,
    routes: HashMap<u32, Chain>,
}

impl Router {
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Append middleware applied to routes registered after this call.
    #[must_use]
    pub fn wrap(mut self, middleware: impl Handler) -> Self {
        self.prefix.push(Arc::new(middleware));
        self
    }

    /// Register `handler` for `event` behind the current middleware.
    ///
    /// Registering the same event again replaces the earlier chain.
    #[must_use]
    pub fn route(mut self, event: u32, handler: impl Handler) -> Self {
        let chain: Chain = self
            .prefix
            .iter()
            .cloned()
            .chain(iter::once(Arc::new(handler) as HandlerRef))
            .collect();
        if self.routes.insert(event, chain).is_some() {
            warn!("route re-registered, replacing previous chain: event={event}");
        }
        self
    }

    /// Build a group that inherits the current middleware.
    #[must_use]
    pub fn group(mut self, build: impl FnOnce(Router) -> Router) -> Self {
        let child = Router {
            prefix: self.prefix.clone(),
            routes: std::mem::take(&mut self.routes),
        };
        self.routes = build(child).routes;
        self
    }

    /// Returns `true` if a route exists for `event`.
    #[must_use]
    pub fn contains(&self, event: u32) -> bool { self.routes.contains_key(&event) }

    /// Freeze the router into a lookup table.
    ///
    /// Unknown events resolve to the router-level middleware followed by
    /// [`NotFound`].
    #[must_use]
    pub fn into_table(self) -> RouteTable {
        let not_found = self
            .prefix
            .into_iter()
            .chain(iter::once(Arc::new(NotFound) as HandlerRef))
            .collect();
        RouteTable {
            routes: self.routes,
            not_found,
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut events: Vec<_> = self.routes.keys().copied().collect();
        events.sort_unstable();
        f.debug_struct("Router")
            .field("middleware", &self.prefix.len())
            .field("events", &events)
            .finish()
    }
}

/// Read-only routes used while the server runs.
pub struct RouteTable {
    routes: HashMap<u32, Chain>,
    not_found: Chain,
}

impl RouteTable {
    /// Handler chain for `event`, falling back to the not-found chain.
    #[must_use]
    pub fn chain(&self, event: u32) -> Arc<[HandlerRef]> {
        self.routes
            .get(&event)
            .map_or_else(|| Arc::clone(&self.not_found), Arc::clone)
    }

    /// Returns `true` if a route exists for `event`.
    #[must_use]
    pub fn contains(&self, event: u32) -> bool { self.routes.contains_key(&event) }

    /// Number of registered events.
    #[must_use]
    pub fn len(&self) -> usize { self.routes.len() }

    /// Returns `true` if no events are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.routes.is_empty() }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.routes.len())
            .finish_non_exhaustive()
    }
}
