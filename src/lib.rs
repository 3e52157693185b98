//! # hookchain
//!
//! Composable middleware trees for dispatching events such as repository
//! webhooks. You hand it one event at a time. It runs the event through a
//! tree of handlers you built once at startup.
//!
//! ## The contract
//!
//! The host owns everything around the event: receiving it, verifying it,
//! retrying it, deciding when to give up. hookchain owns the part that
//! changes between applications:
//!
//! - Ordered middleware chains with explicit continuations ([`Next`])
//! - Event/action routing against a closed [`Schema`]
//! - Predicate branches, keyed routes, and middleware chosen per event
//! - Error boundaries that turn failures into a [`DispatchError`]
//!
//! Siblings never run concurrently and nothing is timed out. A host that
//! needs a deadline wraps [`Composer::handle`] itself.
//!
//! ## Quick start
//!
//! ```rust
//! use hookchain::{from_fn, Composer, Context, Ctx, DispatchError, Next, Outcome, Schema};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let schema = Schema::new()
//!     .event("push", [] as [&str; 0])
//!     .event("issues", ["opened", "closed"]);
//!
//! let app = Composer::with_schema(schema);
//!
//! app.error_boundary(report, from_fn(|ctx, next| async move {
//!     tracing::info!(event = ctx.event_name(), "received");
//!     next.run().await
//! }))
//! .on("issues.opened", label_new_issue);
//!
//! let ctx = Context::new("issues", json!({ "action": "opened", "number": 1 }));
//! app.handle(ctx).await.unwrap();
//! # }
//!
//! async fn label_new_issue(ctx: Ctx, next: Next) -> Outcome {
//!     ctx.update(|event| event["labels"] = json!(["triage"]));
//!     next.run().await
//! }
//!
//! async fn report(err: DispatchError, _next: Next) -> Outcome {
//!     tracing::warn!(event = err.context().event_name(), "{err}");
//!     Ok(())
//! }
//! ```

mod boundary;
mod composer;
mod context;
mod error;
mod failure;
mod query;

pub mod middleware;

pub use composer::Composer;
pub use context::Context;
pub use error::{DispatchError, Error};
pub use failure::{BoxError, Failure};
pub use middleware::{concat, from_fn, Ctx, IntoMiddleware, Middleware, Next, Outcome};
pub use query::{EventQueries, Query, Schema};
