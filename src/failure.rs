//! The value a middleware fails with.
//!
//! Middleware returns `Result<(), Failure>`. Any error type converts into a
//! [`Failure`] through `?`, the same way `anyhow::Error` absorbs errors, so a
//! middleware body reads like any other fallible async function:
//!
//! ```rust
//! use hookchain::{Ctx, Next, Outcome};
//!
//! async fn parse_count(ctx: Ctx, next: Next) -> Outcome {
//!     let raw = ctx.get("/count").unwrap_or_default();
//!     let _count: u32 = raw.as_str().unwrap_or("0").parse()?;
//!     next.run().await
//! }
//! ```
//!
//! Values that are not errors at all can be raised with [`Failure::value`].

use std::backtrace::Backtrace;
use std::fmt;

use serde_json::Value;

use crate::error::Error;

/// Type-erased error as stored inside a [`Failure`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Longest prefix of a string value kept in a failure message.
const MAX_INLINE_CHARS: usize = 50;

/// Anything a middleware can fail with.
///
/// Does not implement `std::error::Error`; the blanket `From<E: Error>`
/// conversion depends on that. Error boundaries wrap it in a
/// [`DispatchError`](crate::DispatchError), which does.
pub struct Failure(Repr);

enum Repr {
    Error { kind: String, source: BoxError, backtrace: Backtrace },
    Value(Value),
    DoubleContinuation,
}

impl Failure {
    /// Fails with a plain, non-error value.
    pub fn value(value: impl Into<Value>) -> Self {
        Self(Repr::Value(value.into()))
    }

    /// Fails with an already boxed error. The kind is reported as `Error`.
    pub fn boxed(source: BoxError) -> Self {
        Self::with_kind("Error", source)
    }

    /// Fails with an error under an explicit kind name.
    pub fn with_kind(kind: impl Into<String>, source: BoxError) -> Self {
        Self(Repr::Error { kind: kind.into(), source, backtrace: Backtrace::capture() })
    }

    pub(crate) fn double_continuation() -> Self {
        Self(Repr::DoubleContinuation)
    }

    /// `true` for the programmer error raised when a continuation runs twice.
    pub fn is_double_continuation(&self) -> bool {
        matches!(self.0, Repr::DoubleContinuation)
    }

    /// The wrapped error, when the failure is a structured error.
    pub fn as_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match &self.0 {
            Repr::Error { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }

    /// The non-error value, when the failure is one.
    pub fn as_value(&self) -> Option<&Value> {
        match &self.0 {
            Repr::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Where the structured error was converted into a failure.
    ///
    /// Only populated when backtraces are enabled (`RUST_BACKTRACE`).
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match &self.0 {
            Repr::Error { backtrace, .. } => Some(backtrace),
            _ => None,
        }
    }

    /// Human-readable description used by [`DispatchError`](crate::DispatchError).
    pub(crate) fn message(&self) -> String {
        match &self.0 {
            Repr::Error { kind, source, .. } => format!("{kind} in middleware: {source}"),
            Repr::DoubleContinuation => Error::DoubleContinuation.to_string(),
            Repr::Value(value) => {
                let kind = value_kind(value);
                match inline(value) {
                    Some(repr) => format!("Non-error value of type {kind} thrown in middleware: {repr}"),
                    None => format!("Non-error value of type {kind} thrown in middleware!"),
                }
            }
        }
    }
}

impl<E> From<E> for Failure
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        let kind = short_type_name::<E>().to_owned();
        let source: BoxError = Box::new(err);
        // A double-continuation error re-raised with `?` keeps its meaning.
        if matches!(source.downcast_ref::<Error>(), Some(Error::DoubleContinuation)) {
            return Self::double_continuation();
        }
        Self(Repr::Error { kind, source, backtrace: Backtrace::capture() })
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Error { kind, source, .. } => {
                f.debug_struct("Failure").field("kind", kind).field("source", source).finish()
            }
            Repr::Value(value) => f.debug_tuple("Failure").field(value).finish(),
            Repr::DoubleContinuation => f.write_str("Failure(DoubleContinuation)"),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Error { source, .. } => fmt::Display::fmt(source, f),
            Repr::Value(value) => fmt::Display::fmt(value, f),
            Repr::DoubleContinuation => fmt::Display::fmt(&Error::DoubleContinuation, f),
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn inline(value: &Value) -> Option<String> {
    match value {
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.chars().take(MAX_INLINE_CHARS).collect()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// `my_crate::errors::TypeError<T>` → `TypeError`.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::").next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct TypeError(&'static str);

    impl fmt::Display for TypeError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl std::error::Error for TypeError {}

    #[test]
    fn test_error_message_names_the_kind() {
        let failure = Failure::from(TypeError("bad"));
        assert_eq!(failure.message(), "TypeError in middleware: bad");
        assert!(failure.as_error().is_some_and(|e| e.is::<TypeError>()));
    }

    #[test]
    fn test_explicit_kind() {
        let failure = Failure::with_kind("RateLimited", "slow down".into());
        assert_eq!(failure.message(), "RateLimited in middleware: slow down");
    }

    #[test]
    fn test_string_value_is_inlined() {
        let failure = Failure::value("nonerror");
        assert_eq!(
            failure.message(),
            "Non-error value of type string thrown in middleware: nonerror",
        );
    }

    #[test]
    fn test_long_string_is_truncated() {
        let long = "x".repeat(80);
        let message = Failure::value(long).message();
        let expected = format!("Non-error value of type string thrown in middleware: {}", "x".repeat(50));
        assert_eq!(message, expected);
    }

    #[test]
    fn test_primitive_values_are_inlined() {
        assert_eq!(
            Failure::value(true).message(),
            "Non-error value of type boolean thrown in middleware: true",
        );
        assert_eq!(
            Failure::value(42).message(),
            "Non-error value of type number thrown in middleware: 42",
        );
    }

    #[test]
    fn test_object_values_get_marker() {
        assert_eq!(
            Failure::value(Value::Null).message(),
            "Non-error value of type null thrown in middleware!",
        );
        assert_eq!(
            Failure::value(json!({ "a": 1 })).message(),
            "Non-error value of type object thrown in middleware!",
        );
        assert_eq!(
            Failure::value(json!([1, 2])).message(),
            "Non-error value of type array thrown in middleware!",
        );
    }

    #[test]
    fn test_reraised_double_continuation_keeps_meaning() {
        let failure = Failure::from(Error::DoubleContinuation);
        assert!(failure.is_double_continuation());
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<TypeError>(), "TypeError");
        assert_eq!(short_type_name::<std::io::Error>(), "Error");
        assert_eq!(short_type_name::<Vec<TypeError>>(), "Vec");
    }
}
