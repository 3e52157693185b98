//! Error boundaries.
//!
//! A boundary runs its guarded middleware with a local continuation that only
//! records whether it was called. The outer continuation runs afterwards,
//! outside the guarded region:
//!
//! ```text
//! guarded(ctx, mark)  ──Ok──────────────────────────────┐
//!        │                                              ▼
//!        └─Err(failure) → handler(DispatchError, mark) ─→ marked? ─yes→ next.run()
//!                                                       └─no──→ stop
//! ```
//!
//! Failures raised after the boundary are therefore never caught by it, and a
//! handler that fails itself propagates to the next boundary outward.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

use crate::error::DispatchError;
use crate::middleware::{done, Middleware, Next, Outcome};

pub(crate) fn guard<H, Fut>(handler: H, guarded: Middleware) -> Middleware
where
    H: Fn(DispatchError, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    let handler = Arc::new(handler);
    Middleware::raw(move |ctx, next| {
        let handler = Arc::clone(&handler);
        let guarded = guarded.clone();
        Box::pin(async move {
            let completed = Arc::new(AtomicBool::new(false));

            if let Err(failure) = guarded.call(Arc::clone(&ctx), mark(&completed)).await {
                if failure.is_double_continuation() {
                    return Err(failure);
                }
                completed.store(false, Ordering::SeqCst);
                let err = DispatchError::new(failure, Arc::clone(&ctx));
                warn!(event = ctx.event_name(), error = %err, "error boundary caught a failure");
                handler(err, mark(&completed)).await?;
            }

            if completed.load(Ordering::SeqCst) {
                next.run().await
            } else {
                Ok(())
            }
        })
    })
}

/// A continuation that only sets `flag`.
fn mark(flag: &Arc<AtomicBool>) -> Next {
    let flag = Arc::clone(flag);
    Next::new(move || {
        flag.store(true, Ordering::SeqCst);
        done()
    })
}
