use crate::SourceError;

/// Reacts to the event types that an [`EventBridge`][crate::EventBridge] dispatches.
///
/// Each method is called on the callback thread of the event source, before the waiter is
/// woken up. A failure is returned to the waiter as
/// [`Error::HandlerFailed`][crate::Error::HandlerFailed].
///
/// All methods default to reporting success, so implementations only need to override the
/// events they care about.
#[cfg_attr(test, mockall::automock)]
pub trait EventHandler<E: Send + Sync + 'static>: Send + Sync + 'static {
    /// Handles [`EventType::STREAM_STARTED`][crate::EventType::STREAM_STARTED].
    ///
    /// # Errors
    ///
    /// Returns an error if handling the event failed.
    fn on_stream_started(&self, _event: &E) -> Result<(), SourceError> {
        Ok(())
    }

    /// Handles [`EventType::STREAM_SEEKED`][crate::EventType::STREAM_SEEKED].
    ///
    /// # Errors
    ///
    /// Returns an error if handling the event failed.
    fn on_stream_seeked(&self, _event: &E) -> Result<(), SourceError> {
        Ok(())
    }
}

/// An [`EventHandler`] that accepts every event without doing anything.
///
/// This is the handler a bridge uses unless another one is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHandler;

impl<E: Send + Sync + 'static> EventHandler<E> for NoopHandler {}
