//! The composer: a builder for middleware trees.
//!
//! Every combinator registers middleware on the composer it is called on and
//! returns a *child* composer for the sub-chain it created. Middleware added
//! to the child later still runs inside that sub-chain:
//!
//! ```rust
//! use hookchain::{from_fn, Composer};
//!
//! let app = Composer::default();
//!
//! let issues = app.on("issues", from_fn(|_ctx, next| next.run()));
//! issues.on("issues.opened", from_fn(|_ctx, next| next.run()));   // only opened issues
//!
//! app.use_(from_fn(|_ctx, next| next.run()));                     // every event that gets here
//! ```
//!
//! The parent's chain refers to the child's handler cell, never the other way
//! round, so the structure is a tree.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, Instrument};

use crate::boundary;
use crate::context::Context;
use crate::error::{DispatchError, Error};
use crate::middleware::{concat, BoxFuture, Ctx, IntoMiddleware, Middleware, Next, Outcome};
use crate::query::{EventQueries, Query, Schema};

/// Builds and runs a middleware tree.
///
/// A `Composer` without middleware is a pass-through: [`handle`](Composer::handle)
/// completes without doing anything.
pub struct Composer {
    handler: Arc<RwLock<Middleware>>,
    schema: Option<Arc<Schema>>,
}

/// A predicate as evaluated at dispatch time.
#[derive(Clone)]
struct Condition(Arc<dyn Fn(Ctx) -> BoxFuture<bool> + Send + Sync>);

impl Condition {
    fn sync<P>(predicate: P) -> Self
    where
        P: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(move |ctx: Ctx| -> BoxFuture<bool> {
            let holds = predicate(&ctx);
            Box::pin(std::future::ready(holds))
        }))
    }

    fn deferred<P, Fut>(predicate: P) -> Self
    where
        P: Fn(Ctx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self(Arc::new(move |ctx: Ctx| -> BoxFuture<bool> { Box::pin(predicate(ctx)) }))
    }

    fn negate(self) -> Self {
        Self(Arc::new(move |ctx: Ctx| -> BoxFuture<bool> {
            let holds = (self.0)(ctx);
            Box::pin(async move { !holds.await })
        }))
    }
}

impl Composer {
    /// Creates a composer running `middleware`.
    ///
    /// Pass a tuple or a `Vec<Middleware>` to start with several units.
    pub fn new(middleware: impl IntoMiddleware) -> Self {
        Self {
            handler: Arc::new(RwLock::new(middleware.into_middleware())),
            schema: None,
        }
    }

    /// Creates an empty composer whose queries are checked against `schema`.
    ///
    /// Every composer created from this one inherits the schema.
    pub fn with_schema(schema: Schema) -> Self {
        Self { schema: Some(Arc::new(schema)), ..Self::default() }
    }

    /// This composer as a single middleware unit.
    ///
    /// The unit reads the composer's current chain at dispatch time, so
    /// middleware registered afterwards is still observed.
    ///
    /// Registering this unit inside the same composer's tree makes the chain
    /// call itself, and the next dispatch overflows the stack. Pass `&composer`
    /// instead to register a snapshot of the chain as it is now.
    pub fn middleware(&self) -> Middleware {
        let cell = Arc::clone(&self.handler);
        Middleware::raw(move |ctx, next| current(&cell).call(ctx, next))
    }

    /// Runs `ctx` through the whole tree.
    ///
    /// Completes when the event was fully processed, including when some
    /// middleware chose not to continue. Fails when middleware failed outside
    /// any error boundary, or when a continuation was run twice.
    pub async fn handle(&self, ctx: Context) -> Result<(), Error> {
        let ctx = Arc::new(ctx);
        let span = tracing::debug_span!("dispatch", event = ctx.event_name());
        let handler = current(&self.handler);

        let result = handler.call(Arc::clone(&ctx), Next::terminal()).instrument(span).await;
        debug!(event = ctx.event_name(), ok = result.is_ok(), "dispatch finished");

        match result {
            Ok(()) => Ok(()),
            Err(failure) if failure.is_double_continuation() => Err(Error::DoubleContinuation),
            Err(failure) => Err(Error::Unhandled {
                event: ctx.event_name().to_owned(),
                source: DispatchError::new(failure, ctx),
            }),
        }
    }

    // ── Combinators ──────────────────────────────────────────────────────────

    /// Appends `middleware` to this composer's chain and returns the child
    /// composer holding it.
    pub fn use_(&self, middleware: impl IntoMiddleware) -> Composer {
        let child = self.child(middleware);
        let mut handler = self.handler.write().unwrap_or_else(PoisonError::into_inner);
        *handler = concat(handler.clone(), child.middleware());
        child
    }

    /// Runs `middleware` only for events matching one of `queries`.
    ///
    /// # Panics
    ///
    /// Panics if a query is malformed or rejected by the schema. Use
    /// [`try_on`](Composer::try_on) to handle that as an error.
    ///
    /// ```rust
    /// # use hookchain::{from_fn, Composer};
    /// # let mw = || from_fn(|_ctx, next| next.run());
    /// let app = Composer::default();
    /// app.on("push", mw());
    /// app.on(["issues.opened", "issues.reopened"], mw());
    /// ```
    pub fn on(&self, queries: impl EventQueries, middleware: impl IntoMiddleware) -> Composer {
        self.try_on(queries, middleware)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    /// Like [`on`](Composer::on), returning query errors instead of panicking.
    pub fn try_on(
        &self,
        queries: impl EventQueries,
        middleware: impl IntoMiddleware,
    ) -> Result<Composer, Error> {
        let queries = queries.into_queries()?;
        if queries.is_empty() {
            return Err(Error::InvalidQuery { query: String::new(), reason: "no queries given" });
        }
        if let Some(schema) = &self.schema {
            for query in &queries {
                schema.validate(query)?;
            }
        }
        let queries: Arc<[Query]> = queries.into();
        Ok(self.filter(move |ctx: &Context| queries.iter().any(|q| q.matches(ctx)), middleware))
    }

    /// Runs `middleware` only when `predicate` holds.
    pub fn filter<P>(&self, predicate: P, middleware: impl IntoMiddleware) -> Composer
    where
        P: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.filter_with(Condition::sync(predicate), middleware)
    }

    /// [`filter`](Composer::filter) with a predicate that may suspend.
    pub fn filter_async<P, Fut>(&self, predicate: P, middleware: impl IntoMiddleware) -> Composer
    where
        P: Fn(Ctx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.filter_with(Condition::deferred(predicate), middleware)
    }

    /// Runs `middleware` only when `predicate` does *not* hold.
    pub fn drop<P>(&self, predicate: P, middleware: impl IntoMiddleware) -> Composer
    where
        P: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.filter_with(Condition::sync(predicate).negate(), middleware)
    }

    /// [`drop`](Composer::drop) with a predicate that may suspend.
    pub fn drop_async<P, Fut>(&self, predicate: P, middleware: impl IntoMiddleware) -> Composer
    where
        P: Fn(Ctx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.filter_with(Condition::deferred(predicate).negate(), middleware)
    }

    /// Runs exactly one of `on_true` and `on_false`, picked by `predicate`.
    ///
    /// The predicate is evaluated once per dispatch.
    pub fn branch<P>(
        &self,
        predicate: P,
        on_true: impl IntoMiddleware,
        on_false: impl IntoMiddleware,
    ) -> Composer
    where
        P: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.branch_with(Condition::sync(predicate), on_true.into_middleware(), on_false.into_middleware())
    }

    /// [`branch`](Composer::branch) with a predicate that may suspend.
    pub fn branch_async<P, Fut>(
        &self,
        predicate: P,
        on_true: impl IntoMiddleware,
        on_false: impl IntoMiddleware,
    ) -> Composer
    where
        P: Fn(Ctx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.branch_with(Condition::deferred(predicate), on_true.into_middleware(), on_false.into_middleware())
    }

    /// Computes the middleware to run from the context, on every dispatch.
    ///
    /// The factory's result is treated as a fresh composer; nothing is cached
    /// between events.
    ///
    /// ```rust
    /// # use hookchain::{from_fn, Composer, Middleware};
    /// let app = Composer::default();
    /// app.lazy(|ctx| async move {
    ///     if ctx.get("/sender/type").is_some_and(|t| t == "Bot") {
    ///         Middleware::pass_through()
    ///     } else {
    ///         from_fn(|_ctx, next| next.run())
    ///     }
    /// });
    /// ```
    pub fn lazy<F, Fut, M>(&self, factory: F) -> Composer
    where
        F: Fn(Ctx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = M> + Send + 'static,
        M: IntoMiddleware,
    {
        self.use_(Middleware::raw(move |ctx, next| {
            let selecting = factory(Arc::clone(&ctx));
            Box::pin(async move {
                let selected = selecting.await.into_middleware();
                selected.call(ctx, next).await
            })
        }))
    }

    /// Dispatches to the middleware registered under the key `router` returns.
    ///
    /// When the router returns `None` or an unregistered key, the event passes
    /// through unchanged.
    pub fn route<K, R, I, M>(&self, router: R, routes: I) -> Composer
    where
        R: Fn(&Context) -> Option<K> + Send + Sync + 'static,
        I: IntoIterator<Item = (K, M)>,
        K: Eq + Hash + Send + Sync + 'static,
        M: IntoMiddleware,
    {
        self.route_or(router, routes, Middleware::pass_through())
    }

    /// [`route`](Composer::route) with an explicit `fallback`.
    ///
    /// ```rust
    /// # use hookchain::{from_fn, Composer};
    /// # let mw = || from_fn(|_ctx, next| next.run());
    /// let app = Composer::default();
    /// app.route_or(
    ///     |ctx| ctx.action(),
    ///     [("opened".to_owned(), mw()), ("closed".to_owned(), mw())],
    ///     mw(),
    /// );
    /// ```
    pub fn route_or<K, R, I, M>(
        &self,
        router: R,
        routes: I,
        fallback: impl IntoMiddleware,
    ) -> Composer
    where
        R: Fn(&Context) -> Option<K> + Send + Sync + 'static,
        I: IntoIterator<Item = (K, M)>,
        K: Eq + Hash + Send + Sync + 'static,
        M: IntoMiddleware,
    {
        let routes: HashMap<K, Middleware> = routes
            .into_iter()
            .map(|(key, middleware)| (key, middleware.into_middleware()))
            .collect();
        let fallback = fallback.into_middleware();

        self.lazy(move |ctx| {
            let selected = router(&ctx)
                .and_then(|key| routes.get(&key).cloned())
                .unwrap_or_else(|| fallback.clone());
            std::future::ready(selected)
        })
    }

    /// Guards `middleware` and everything later added to the returned child.
    ///
    /// A failure inside the guarded region is handed to `handler` as a
    /// [`DispatchError`]. If the guarded middleware (or the handler, after a
    /// failure) runs its continuation, dispatch resumes after the boundary;
    /// otherwise it stops there. A failing handler propagates outward.
    pub fn error_boundary<H, Fut>(&self, handler: H, middleware: impl IntoMiddleware) -> Composer
    where
        H: Fn(DispatchError, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        let child = self.child(middleware);
        self.use_(boundary::guard(handler, child.middleware()));
        child
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn child(&self, middleware: impl IntoMiddleware) -> Composer {
        Composer {
            handler: Arc::new(RwLock::new(middleware.into_middleware())),
            schema: self.schema.clone(),
        }
    }

    fn filter_with(&self, condition: Condition, middleware: impl IntoMiddleware) -> Composer {
        let child = self.child(middleware);
        self.branch_with(condition, child.middleware(), Middleware::pass_through());
        child
    }

    fn branch_with(&self, condition: Condition, on_true: Middleware, on_false: Middleware) -> Composer {
        self.lazy(move |ctx| {
            let holds = (condition.0)(ctx);
            let (on_true, on_false) = (on_true.clone(), on_false.clone());
            async move { if holds.await { on_true } else { on_false } }
        })
    }
}

impl Default for Composer {
    fn default() -> Self { Self::new(Middleware::pass_through()) }
}

impl IntoMiddleware for Composer {
    fn into_middleware(self) -> Middleware { self.middleware() }
}

/// Snapshot of the chain at conversion time.
impl IntoMiddleware for &Composer {
    fn into_middleware(self) -> Middleware { current(&self.handler) }
}

fn current(cell: &RwLock<Middleware>) -> Middleware {
    cell.read().unwrap_or_else(PoisonError::into_inner).clone()
}
