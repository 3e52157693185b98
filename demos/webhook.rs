//! Repository-webhook style dispatch with hookchain.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example webhook
//!
//! The host side (receiving HTTP deliveries, verifying signatures) is left
//! out: each event below is what an adapter would build from one delivery.

use hookchain::{from_fn, Composer, Context, Ctx, DispatchError, Failure, Next, Outcome, Schema};
use serde_json::json;

const SCHEMA: &str = r#"{
    "push":         [],
    "issues":       ["opened", "closed", "labeled"],
    "pull_request": ["opened", "synchronize", "closed"]
}"#;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let schema = Schema::from_json(SCHEMA).expect("schema is valid JSON");
    let app = Composer::with_schema(schema);

    // Bot deliveries stop here; nothing registered later sees them.
    app.filter(is_bot, from_fn(|ctx, _next| {
        tracing::info!(event = ctx.event_name(), "ignoring bot");
        std::future::ready(Ok(()))
    }));
    app.drop(has_sender, from_fn(|_ctx, _next| std::future::ready(Ok(()))));

    let guarded = app.error_boundary(report, log_event);

    guarded.on("push", count_commits);
    guarded.on(["issues.opened", "pull_request.opened"], welcome);
    guarded.route_or(
        |ctx| ctx.action(),
        [("closed".to_owned(), from_fn(|ctx, next| async move {
            tracing::info!(event = ctx.event_name(), "closed");
            next.run().await
        }))],
        from_fn(|_ctx, next| next.run()),
    );

    let deliveries = [
        Context::new("push", json!({ "commits": [{ "id": "a1" }, { "id": "b2" }], "sender": { "type": "User" } })),
        Context::new("issues", json!({ "action": "opened", "number": 12, "sender": { "type": "User" } })),
        Context::new("pull_request", json!({ "action": "closed", "number": 3, "sender": { "type": "User" } })),
        Context::new("issues", json!({ "action": "labeled", "sender": { "type": "Bot" } })),
        Context::new("push", json!({ "commits": "not-a-list", "sender": { "type": "User" } })),
    ];

    for ctx in deliveries {
        if let Err(e) = app.handle(ctx).await {
            tracing::error!("dispatch failed: {e}");
        }
    }
}

fn is_bot(ctx: &Context) -> bool {
    ctx.get("/sender/type").is_some_and(|t| t == "Bot")
}

fn has_sender(ctx: &Context) -> bool {
    ctx.get("/sender").is_some()
}

async fn log_event(ctx: Ctx, next: Next) -> Outcome {
    tracing::info!(event = ctx.event_name(), action = ?ctx.action(), "delivery");
    next.run().await
}

async fn count_commits(ctx: Ctx, next: Next) -> Outcome {
    let raw = ctx.get("/commits").unwrap_or_default();
    let Some(commits) = raw.as_array() else {
        return Err(Failure::value(raw.clone()));
    };
    tracing::info!(count = commits.len(), "push received");
    next.run().await
}

async fn welcome(ctx: Ctx, next: Next) -> Outcome {
    let number = ctx.get("/number").and_then(|n| n.as_u64()).unwrap_or_default();
    tracing::info!(number, "welcoming new contribution");
    next.run().await
}

async fn report(err: DispatchError, _next: Next) -> Outcome {
    tracing::warn!(event = err.context().event_name(), "{err}");
    Ok(())
}
