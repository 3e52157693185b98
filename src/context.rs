//! The per-event context passed through a dispatch.

use std::sync::{PoisonError, RwLock};

use serde_json::Value;

/// One event travelling through a handler tree.
///
/// The event name is fixed at construction. The payload may be read and
/// modified by any middleware; a change made by one unit is visible to every
/// unit that runs after it in the same dispatch.
///
/// ```rust
/// use hookchain::Context;
/// use serde_json::json;
///
/// let ctx = Context::new("issues", json!({ "action": "opened", "number": 7 }));
/// assert_eq!(ctx.event_name(), "issues");
/// assert_eq!(ctx.action().as_deref(), Some("opened"));
///
/// ctx.update(|event| event["seen"] = json!(true));
/// assert_eq!(ctx.get("/seen"), Some(json!(true)));
/// ```
#[derive(Debug)]
pub struct Context {
    event_name: String,
    event: RwLock<Value>,
}

impl Context {
    pub fn new(event_name: impl Into<String>, event: Value) -> Self {
        Self { event_name: event_name.into(), event: RwLock::new(event) }
    }

    pub fn event_name(&self) -> &str { &self.event_name }

    /// The payload's `action` field, when it is a string.
    pub fn action(&self) -> Option<String> {
        self.read(|event| event.get("action").and_then(Value::as_str).map(str::to_owned))
    }

    /// A snapshot of the current payload.
    pub fn event(&self) -> Value {
        self.read(Value::clone)
    }

    /// Looks up a payload field by JSON pointer (`"/repository/name"`).
    pub fn get(&self, pointer: &str) -> Option<Value> {
        self.read(|event| event.pointer(pointer).cloned())
    }

    pub fn read<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        let guard = self.event.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        let mut guard = self.event.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
