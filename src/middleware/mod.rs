//! Middleware and type erasure.
//!
//! # How middleware is stored
//!
//! A composer holds middleware of many concrete types in one tree, so every
//! unit is hidden behind a trait object (`dyn ErasedMiddleware`) and stored
//! uniformly as a [`Middleware`].
//!
//! ```text
//! async fn audit(ctx: Ctx, next: Next) -> Outcome { … }   ← user writes this
//!        ↓ composer.use_(audit)
//! audit.into_middleware()                                ← IntoMiddleware blanket impl
//!        ↓
//! Middleware(Arc::new(FnMiddleware(audit)))              ← heap-allocated wrapper
//!        ↓
//! middleware.call(ctx, next)  at dispatch time           ← one vtable dispatch
//!        ↓
//! Box::pin(audit(ctx, next))                             ← BoxFuture
//! ```
//!
//! Anything that can produce a middleware on demand implements
//! [`IntoMiddleware`]: plain functions, [`Middleware`] itself, a
//! [`Composer`](crate::Composer), and ordered sequences (`Vec<Middleware>` or
//! tuples), which are folded into one unit with [`concat`].

mod next;

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, LazyLock};

use crate::context::Context;
use crate::failure::Failure;

pub use next::Next;
pub(crate) use next::done;

/// How the dispatch shares a [`Context`] between middleware.
pub type Ctx = Arc<Context>;

/// What every middleware and continuation resolves to.
pub type Outcome = Result<(), Failure>;

/// A heap-allocated, type-erased future.
///
/// `Send + 'static` so a host can run dispatches on a multi-threaded runtime.
pub type BoxFuture<T = Outcome> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Internal dispatch interface.
pub(crate) trait ErasedMiddleware: Send + Sync + 'static {
    fn call(&self, ctx: Ctx, next: Next) -> BoxFuture;
}

/// A type-erased middleware unit, cheap to clone.
#[derive(Clone)]
pub struct Middleware(Arc<dyn ErasedMiddleware>);

static PASS_THROUGH: LazyLock<Middleware> = LazyLock::new(|| Middleware::raw(|_, next| next.run()));

impl Middleware {
    /// Runs this unit against `ctx`; `next` is what follows it.
    pub fn call(&self, ctx: Ctx, next: Next) -> BoxFuture {
        self.0.call(ctx, next)
    }

    /// The identity unit: always invokes its continuation exactly once.
    pub fn pass_through() -> Self {
        PASS_THROUGH.clone()
    }

    /// Wraps a function that already returns a boxed future.
    pub(crate) fn raw<F>(f: F) -> Self
    where
        F: Fn(Ctx, Next) -> BoxFuture + Send + Sync + 'static,
    {
        Self(Arc::new(RawMiddleware(f)))
    }
}

/// Turns a closure into a [`Middleware`].
///
/// Prefer this over passing a closure straight to a combinator: the direct
/// `Fn` bound lets the compiler infer the argument types.
///
/// ```rust
/// use hookchain::{from_fn, Composer};
///
/// let app = Composer::default();
/// app.use_(from_fn(|ctx, next| async move {
///     tracing::info!(event = ctx.event_name(), "received");
///     next.run().await
/// }));
/// ```
pub fn from_fn<F, Fut>(f: F) -> Middleware
where
    F: Fn(Ctx, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    Middleware(Arc::new(FnMiddleware(f)))
}

/// Runs `first` with a continuation that runs `second`.
///
/// If `first` never calls its continuation, `second` never runs.
pub fn concat(first: Middleware, second: Middleware) -> Middleware {
    Middleware::raw(move |ctx, next| {
        let second = second.clone();
        let rest = Arc::clone(&ctx);
        first.call(ctx, Next::new(move || second.call(rest, next)))
    })
}

// ── IntoMiddleware ────────────────────────────────────────────────────────────

/// Anything that produces a [`Middleware`] on demand.
///
/// Implement it on your own types to pass them to any combinator:
///
/// ```rust
/// use hookchain::{from_fn, IntoMiddleware, Middleware};
///
/// struct RequireAction(&'static str);
///
/// impl IntoMiddleware for RequireAction {
///     fn into_middleware(self) -> Middleware {
///         let wanted = self.0;
///         from_fn(move |ctx, next| async move {
///             if ctx.action().as_deref() == Some(wanted) {
///                 next.run().await
///             } else {
///                 Ok(())
///             }
///         })
///     }
/// }
/// ```
pub trait IntoMiddleware {
    fn into_middleware(self) -> Middleware;
}

impl<F, Fut> IntoMiddleware for F
where
    F: Fn(Ctx, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    fn into_middleware(self) -> Middleware {
        from_fn(self)
    }
}

impl IntoMiddleware for Middleware {
    fn into_middleware(self) -> Middleware { self }
}

/// An ordered sequence; an empty one is the pass-through.
impl IntoMiddleware for Vec<Middleware> {
    fn into_middleware(self) -> Middleware {
        self.into_iter().reduce(concat).unwrap_or_else(Middleware::pass_through)
    }
}

macro_rules! impl_into_middleware_for_tuple {
    ($($ty:ident),+) => {
        impl<$($ty: IntoMiddleware),+> IntoMiddleware for ($($ty,)+) {
            #[allow(non_snake_case)]
            fn into_middleware(self) -> Middleware {
                let ($($ty,)+) = self;
                vec![$($ty.into_middleware()),+].into_middleware()
            }
        }
    };
}

impl_into_middleware_for_tuple!(A);
impl_into_middleware_for_tuple!(A, B);
impl_into_middleware_for_tuple!(A, B, C);
impl_into_middleware_for_tuple!(A, B, C, D);
impl_into_middleware_for_tuple!(A, B, C, D, E);
impl_into_middleware_for_tuple!(A, B, C, D, E, F);
impl_into_middleware_for_tuple!(A, B, C, D, E, F, G);
impl_into_middleware_for_tuple!(A, B, C, D, E, F, G, H);

// ── Concrete wrappers ─────────────────────────────────────────────────────────

/// Holds a user function `F` and boxes the future it returns.
struct FnMiddleware<F>(F);

impl<F, Fut> ErasedMiddleware for FnMiddleware<F>
where
    F: Fn(Ctx, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    fn call(&self, ctx: Ctx, next: Next) -> BoxFuture {
        Box::pin((self.0)(ctx, next))
    }
}

/// Holds an internal function that already boxes its future.
struct RawMiddleware<F>(F);

impl<F> ErasedMiddleware for RawMiddleware<F>
where
    F: Fn(Ctx, Next) -> BoxFuture + Send + Sync + 'static,
{
    fn call(&self, ctx: Ctx, next: Next) -> BoxFuture {
        (self.0)(ctx, next)
    }
}
