use std::time::Duration;

use tracing::{debug, warn};

use crate::{
    BridgeState, Error, EventBridge, EventHandler, EventOf, EventStream, NoopHandler, Result,
};

/// What the completion callback does when it fails to handle a completion.
///
/// A completion fails when the event cannot be retrieved, when its type cannot be read or when
/// it is of a type other than the one being waited for. The failure is always reported to the
/// event source that invoked the callback; this policy decides whether the waiter hears about
/// it too.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum CallbackFailurePolicy {
    /// The failure is recorded and the waiter is woken up to receive it.
    #[default]
    SignalWaiter,

    /// The waiter is not woken up. It stays blocked until its wait timeout elapses, or forever
    /// if the bridge has no wait timeout.
    ///
    /// Only useful when an external mechanism is responsible for detecting stuck waits.
    Silent,
}

/// Creates instances of [`EventBridge`].
///
/// Required parameters:
/// * `stream`
///
/// Use `EventBridge::builder()` to create a new instance of this builder.
///
/// # Example
///
/// ```rust
/// # use event_bridge::{CompletionTarget, EventGenerator, EventStream, EventType, SourceError, SourceEvent};
/// # #[derive(Debug)]
/// # struct Stream;
/// # struct Generator;
/// # struct Event;
/// # impl SourceEvent for Event {
/// #     fn event_type(&self) -> Result<EventType, SourceError> { Ok(EventType::STREAM_STARTED) }
/// # }
/// # impl EventGenerator for Generator {
/// #     type Event = Event;
/// #     type Token = ();
/// #     fn begin_get_event(&self, target: Box<dyn CompletionTarget<()>>) -> Result<(), SourceError> {
/// #         drop(target.invoke(()));
/// #         Ok(())
/// #     }
/// #     fn end_get_event(&self, _token: ()) -> Result<Event, SourceError> { Ok(Event) }
/// # }
/// # impl EventStream for Stream {
/// #     type Generator = Generator;
/// #     fn event_generator(&self) -> Result<Generator, SourceError> { Ok(Generator) }
/// # }
/// use std::time::Duration;
///
/// use event_bridge::{CallbackFailurePolicy, EventBridge};
///
/// let bridge = EventBridge::builder()
///     .stream(Stream)
///     .wait_timeout(Duration::from_secs(5))
///     .callback_failure_policy(CallbackFailurePolicy::SignalWaiter)
///     .build()
///     .unwrap();
///
/// bridge.wait_for_event(EventType::STREAM_STARTED).unwrap();
/// ```
#[derive(derive_more::Debug)]
#[must_use]
pub struct EventBridgeBuilder<S>
where
    S: EventStream,
{
    #[debug(ignore)]
    stream: Option<S>,

    #[debug(ignore)]
    handler: Option<Box<dyn EventHandler<EventOf<S>>>>,

    /// Defaults to no timeout, which means a wait lasts until a completion arrives.
    wait_timeout: Option<Duration>,

    callback_failure_policy: CallbackFailurePolicy,
}

impl<S> EventBridgeBuilder<S>
where
    S: EventStream,
{
    pub(crate) fn new() -> Self {
        Self {
            stream: None,
            handler: None,
            wait_timeout: None,
            callback_failure_policy: CallbackFailurePolicy::default(),
        }
    }

    /// Sets the event stream to bridge. This is a required property.
    ///
    /// The bridge takes exclusive ownership of the stream and releases it when the bridge is
    /// destroyed.
    pub fn stream(self, stream: S) -> Self {
        Self {
            stream: Some(stream),
            ..self
        }
    }

    /// Sets the handler that the bridge dispatches recognized event types to.
    ///
    /// Defaults to [`NoopHandler`], which accepts every event.
    pub fn handler(self, handler: impl EventHandler<EventOf<S>>) -> Self {
        Self {
            handler: Some(Box::new(handler)),
            ..self
        }
    }

    /// Bounds how long a single wait blocks for its completion.
    ///
    /// Defaults to no bound. A wait that times out returns
    /// [`Error::TimedOut`][crate::Error::TimedOut] and abandons its request.
    pub fn wait_timeout(self, timeout: Duration) -> Self {
        Self {
            wait_timeout: Some(timeout),
            ..self
        }
    }

    /// Sets what happens to the waiter when the completion callback fails.
    ///
    /// Defaults to [`CallbackFailurePolicy::SignalWaiter`].
    pub fn callback_failure_policy(self, policy: CallbackFailurePolicy) -> Self {
        Self {
            callback_failure_policy: policy,
            ..self
        }
    }

    /// Binds the bridge to the event generator of the stream and returns the first reference
    /// to the bridge.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if no stream has been set.
    ///
    /// Returns [`Error::BindingFailed`] if the stream does not expose an event generator.
    pub fn build(self) -> Result<EventBridge<S>> {
        let Some(stream) = self.stream else {
            debug!("refusing to create event bridge without an event stream");

            return Err(Error::InvalidArgument {
                problem: "an event stream is required",
            });
        };

        let generator = stream.event_generator().map_err(|cause| {
            warn!(%cause, "event stream does not expose an event generator");
            Error::BindingFailed
        })?;

        let handler = self
            .handler
            .unwrap_or_else(|| Box::new(NoopHandler));

        debug!(
            wait_timeout = ?self.wait_timeout,
            callback_failure_policy = ?self.callback_failure_policy,
            "event bridge created"
        );

        Ok(EventBridge::from_state(BridgeState::new(
            stream,
            generator,
            handler,
            self.wait_timeout,
            self.callback_failure_policy,
        )))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::fake::{FakeStream, FakeStreamBehavior};

    #[test]
    fn missing_stream_is_invalid_argument() {
        let result = EventBridgeBuilder::<FakeStream>::new().build();

        assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn stream_without_generator_is_binding_failed() {
        let stream = FakeStream::with_behavior(FakeStreamBehavior::NoGenerator);

        let result = EventBridge::builder().stream(stream).build();

        // The raw cause from the stream is not leaked to the caller.
        assert_eq!(result.unwrap_err(), Error::BindingFailed);
    }

    #[test]
    fn defaults_are_unbounded_and_signaling() {
        let builder = EventBridgeBuilder::<FakeStream>::new();

        assert_eq!(builder.wait_timeout, None);
        assert_eq!(
            builder.callback_failure_policy,
            CallbackFailurePolicy::SignalWaiter
        );
    }

    #[test]
    fn options_are_applied() {
        let builder = EventBridgeBuilder::<FakeStream>::new()
            .wait_timeout(Duration::from_millis(250))
            .callback_failure_policy(CallbackFailurePolicy::Silent);

        assert_eq!(builder.wait_timeout, Some(Duration::from_millis(250)));
        assert_eq!(
            builder.callback_failure_policy,
            CallbackFailurePolicy::Silent
        );
    }

    #[test]
    fn built_bridge_has_single_reference() {
        let bridge = EventBridge::builder()
            .stream(FakeStream::new())
            .build()
            .unwrap();

        assert_eq!(bridge.ref_count(), 1);
    }
}
