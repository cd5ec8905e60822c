use std::borrow::Cow;
use std::time::Duration;

use thiserror::Error;

use crate::EventType;

/// Errors that can occur when creating an [`EventBridge`][crate::EventBridge] or waiting for
/// an event through it.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The caller provided invalid input when creating the bridge.
    #[error("invalid argument: {problem}")]
    InvalidArgument {
        /// A human-readable description of the problem.
        problem: &'static str,
    },

    /// The event stream does not expose the event generation capability the bridge needs.
    ///
    /// The underlying cause reported by the stream is logged but not returned, as there is
    /// nothing a caller can do about it beyond knowing that the stream cannot be bridged.
    #[error("event stream does not expose an event generator")]
    BindingFailed,

    /// The completion could not be finalized or the type of the completed event could not be
    /// determined.
    #[error("failed to handle event completion")]
    CallbackFailed(#[source] SourceError),

    /// An event arrived but it was not of the type that was waited for.
    #[error("expected event {expected} but received {received}")]
    Unexpected {
        /// The event type the waiter accepts.
        expected: EventType,

        /// The event type that actually arrived.
        received: EventType,
    },

    /// The event arrived but the handler registered for its type reported a failure.
    #[error("handler for event {event_type} failed")]
    HandlerFailed {
        /// The type of the event being handled.
        event_type: EventType,

        /// The failure reported by the handler.
        #[source]
        source: SourceError,
    },

    /// The event source rejected a request.
    #[error("event source request failed")]
    Source(#[from] SourceError),

    /// No completion arrived within the configured wait timeout.
    ///
    /// The request stays outstanding with the event source. Its completion is discarded
    /// when it eventually arrives.
    #[error("no event completion arrived within {timeout:?}")]
    TimedOut {
        /// The wait timeout configured on the bridge.
        timeout: Duration,
    },

    /// A request abandoned by an earlier timed out wait has not completed yet, so a new
    /// request cannot be issued.
    #[error("a previously abandoned request is still outstanding")]
    RequestOutstanding,

    /// The event source accepted the request but dropped its completion target without ever
    /// invoking it.
    #[error("event source dropped the request without completing it")]
    RequestDropped,
}

/// A failure reported by an event source or by an event handler.
///
/// This is the error type of the collaborator traits implemented outside this crate
/// ([`EventStream`][crate::EventStream], [`EventGenerator`][crate::EventGenerator],
/// [`SourceEvent`][crate::SourceEvent] and [`EventHandler`][crate::EventHandler]).
///
/// # Example
///
/// ```rust
/// use event_bridge::SourceError;
///
/// let error = SourceError::new("event queue has been shut down");
/// assert_eq!(error.message(), "event queue has been shut down");
/// ```
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("{message}")]
pub struct SourceError {
    message: Cow<'static, str>,
}

impl SourceError {
    /// Creates a new error with a human-readable description of the failure.
    #[must_use]
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// A human-readable description of the failure.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A specialized `Result` type for event bridge operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;
