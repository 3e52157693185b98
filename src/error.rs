//! Error types.

use std::backtrace::Backtrace;
use std::fmt;

use crate::context::Context;
use crate::failure::Failure;
use crate::middleware::Ctx;

/// The error type returned by hookchain's fallible operations.
///
/// Failures inside a dispatch that an error boundary recovers from never show
/// up here. This type surfaces composition bugs, rejected queries and schemas,
/// and failures no boundary caught.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A middleware invoked its continuation a second time.
    #[error("next() called multiple times in one middleware activation")]
    DoubleContinuation,

    /// A middleware failed and no error boundary enclosed it.
    #[error("unhandled failure while dispatching `{event}`: {source}")]
    Unhandled {
        event: String,
        #[source]
        source: DispatchError,
    },

    /// The query string is not of the form `<event>` or `<event>.<action>`.
    #[error("invalid event query `{query}`: {reason}")]
    InvalidQuery { query: String, reason: &'static str },

    /// The schema does not know the queried event.
    #[error("unknown event `{event}` in query `{query}`")]
    UnknownEvent { query: String, event: String },

    /// The schema knows the event but not the queried action.
    #[error("event `{event}` has no action `{action}` (query `{query}`)")]
    UnknownAction { query: String, event: String, action: String },

    /// The schema document could not be deserialized.
    #[error("invalid event schema: {0}")]
    Schema(#[from] serde_json::Error),
}

/// A failure caught during dispatch, paired with the context it happened in.
///
/// Error boundaries hand one of these to their handler. The message follows
/// a fixed format so that logs stay greppable:
///
/// - `TypeError in middleware: bad` for errors (`<kind> in middleware: <message>`)
/// - `Non-error value of type string thrown in middleware: nonerror` for values
pub struct DispatchError {
    failure: Failure,
    context: Ctx,
    message: String,
}

impl DispatchError {
    pub(crate) fn new(failure: Failure, context: Ctx) -> Self {
        let message = failure.message();
        Self { failure, context, message }
    }

    pub fn message(&self) -> &str { &self.message }

    /// What the middleware failed with.
    pub fn failure(&self) -> &Failure { &self.failure }

    /// The context that was being dispatched.
    pub fn context(&self) -> &Context { &self.context }

    /// Backtrace of the original error, when one was captured.
    pub fn backtrace(&self) -> Option<&Backtrace> { self.failure.backtrace() }

    pub fn into_failure(self) -> Failure { self.failure }
}

impl fmt::Debug for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchError")
            .field("event", &self.context.event_name())
            .field("message", &self.message)
            .field("failure", &self.failure)
            .finish()
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failure.as_error().map(|e| e as &(dyn std::error::Error + 'static))
    }
}
