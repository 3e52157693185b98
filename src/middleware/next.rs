//! The continuation handed to every middleware.

use std::sync::{Mutex, PoisonError};

use tracing::error;

use super::{BoxFuture, Outcome};
use crate::failure::Failure;

type Continuation = Box<dyn FnOnce() -> BoxFuture + Send + 'static>;

/// Hands control to whatever follows the current middleware.
///
/// Call [`run`](Next::run) at most once. Not calling it stops the dispatch
/// at this middleware; calling it twice is a composition bug and resolves to
/// a double-continuation failure that no error boundary catches.
pub struct Next {
    continuation: Mutex<Option<Continuation>>,
}

impl Next {
    pub(crate) fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> BoxFuture + Send + 'static,
    {
        Self { continuation: Mutex::new(Some(Box::new(f))) }
    }

    /// The continuation after the root: completes immediately.
    pub(crate) fn terminal() -> Self {
        Self::new(done)
    }

    /// Runs the rest of the chain.
    pub fn run(&self) -> BoxFuture {
        let taken = self.continuation.lock().unwrap_or_else(PoisonError::into_inner).take();
        match taken {
            Some(continuation) => continuation(),
            None => {
                error!("next() called multiple times in one middleware activation");
                Box::pin(std::future::ready(Err(Failure::double_continuation())))
            }
        }
    }
}

/// An already completed [`Outcome`].
pub(crate) fn done() -> BoxFuture<Outcome> {
    Box::pin(std::future::ready(Ok(())))
}
