use std::any::type_name;
use std::fmt;

use tracing::{trace, warn};

use crate::{
    BridgeState, CompletionTarget, EventBridgeBuilder, EventGenerator, EventStream, EventType,
    RefCounted, Result, TokenOf, evaluate,
};

/// Bridges an asynchronous event stream to a blocking wait for a specific event.
///
/// The bridge subscribes to the event generator of an [`EventStream`]. A thread calls
/// [`wait_for_event()`][Self::wait_for_event] to request the next event and block until the
/// event source delivers it on its own callback thread. The bridge validates the delivered
/// event against the expected type, dispatches it to the configured
/// [`EventHandler`][crate::EventHandler] and hands the outcome back to the waiting thread.
///
/// # Ownership
///
/// `EventBridge` is a reference-counted handle. Cloning it (or calling
/// [`retain()`][Self::retain]) adds a reference; dropping it (or calling
/// [`release()`][Self::release]) removes one. The bridge, including the event stream it owns,
/// is destroyed when the last reference goes away. Every outstanding request holds one
/// reference, so the bridge stays alive until the event source has delivered or discarded
/// the completion, even if all handles held by the application have been dropped.
///
/// # One wait at a time
///
/// The bridge supports a single outstanding request. Only one thread may wait on a bridge at
/// a time; a concurrent second wait panics.
///
/// # Example
///
/// ```rust
/// # use event_bridge::{CompletionTarget, EventGenerator, EventStream, SourceError, SourceEvent};
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
/// #         std::thread::spawn(move || drop(target.invoke(())));
/// #         Ok(())
/// #     }
/// #     fn end_get_event(&self, _token: ()) -> Result<Event, SourceError> { Ok(Event) }
/// # }
/// # impl EventStream for Stream {
/// #     type Generator = Generator;
/// #     fn event_generator(&self) -> Result<Generator, SourceError> { Ok(Generator) }
/// # }
/// use event_bridge::{EventBridge, EventType};
///
/// let bridge = EventBridge::new(Stream).unwrap();
///
/// // The event is delivered on another thread; this blocks until it arrives.
/// let received = bridge.wait_for_event(EventType::STREAM_STARTED).unwrap();
/// assert_eq!(received, EventType::STREAM_STARTED);
/// ```
pub struct EventBridge<S>
where
    S: EventStream,
{
    state: RefCounted<BridgeState<S>>,
}

impl<S> EventBridge<S>
where
    S: EventStream,
{
    /// Creates a bridge for `stream` with default options.
    ///
    /// Use [`EventBridge::builder()`] for custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BindingFailed`][crate::Error::BindingFailed] if the stream does not
    /// expose an event generator.
    pub fn new(stream: S) -> Result<Self> {
        Self::builder().stream(stream).build()
    }

    /// Creates a builder for configuring a bridge.
    pub fn builder() -> EventBridgeBuilder<S> {
        EventBridgeBuilder::new()
    }

    pub(crate) fn from_state(state: BridgeState<S>) -> Self {
        Self {
            state: RefCounted::new(state),
        }
    }

    /// Blocks until the next event arrives and verifies that it is of type `expected`.
    ///
    /// Returns the type of the received event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Source`][crate::Error::Source] if the event source rejects the
    /// request. In this case, no wait takes place.
    ///
    /// Returns [`Error::Unexpected`][crate::Error::Unexpected] if an event of another type
    /// arrives.
    ///
    /// Returns [`Error::CallbackFailed`][crate::Error::CallbackFailed] if the completed event
    /// cannot be retrieved or inspected, and
    /// [`Error::HandlerFailed`][crate::Error::HandlerFailed] if the event handler fails.
    ///
    /// Returns [`Error::RequestDropped`][crate::Error::RequestDropped] if the event source
    /// accepts the request but drops it without delivering a completion.
    ///
    /// Returns [`Error::TimedOut`][crate::Error::TimedOut] if a wait timeout is configured
    /// and no completion arrives in time, and
    /// [`Error::RequestOutstanding`][crate::Error::RequestOutstanding] if an earlier timed
    /// out request has still not completed.
    ///
    /// # Panics
    ///
    /// Panics if another thread is waiting on the same bridge.
    pub fn wait_for_event(&self, expected: EventType) -> Result<EventType> {
        self.wait(Some(expected))
    }

    /// Blocks until the next event arrives, accepting an event of any type.
    ///
    /// Returns the type of the received event.
    ///
    /// # Errors
    ///
    /// Same as [`wait_for_event()`][Self::wait_for_event], except that
    /// [`Error::Unexpected`][crate::Error::Unexpected] is never returned.
    ///
    /// # Panics
    ///
    /// Panics if another thread is waiting on the same bridge.
    pub fn wait_for_any_event(&self) -> Result<EventType> {
        self.wait(None)
    }

    fn wait(&self, expected: Option<EventType>) -> Result<EventType> {
        self.state.start_request(expected)?;

        let target = Box::new(BridgeCompletion {
            bridge: self.retain(),
            invoked: false,
        });

        if let Err(error) = self.state.generator().begin_get_event(target) {
            warn!(%error, "event source rejected request for next event");
            self.state.cancel_request();
            return Err(error.into());
        }

        self.state.arm_request()?;

        let completion = self.state.await_completion()?;
        let outcome = evaluate(completion, expected);

        trace!(?expected, ?outcome, "wait for event finished");

        outcome
    }

    /// The event stream this bridge was created for.
    #[must_use]
    pub fn stream(&self) -> &S {
        self.state.stream()
    }

    /// Adds a reference to the bridge, returning the new handle.
    ///
    /// Equivalent to `clone()`.
    #[must_use]
    pub fn retain(&self) -> Self {
        let (state, ref_count) = self.state.retain();
        trace!(ref_count, "event bridge retained");

        Self { state }
    }

    /// Removes this reference to the bridge, returning the number of references that remain.
    ///
    /// When zero is returned, the bridge and the event stream it owns have been destroyed.
    /// Equivalent to `drop()`, except that it reports the remaining count.
    #[expect(
        clippy::must_use_candidate,
        reason = "releasing without looking at the count is equivalent to drop()"
    )]
    pub fn release(self) -> usize {
        let ref_count = self.state.release();
        trace!(ref_count, "event bridge released");

        ref_count
    }

    /// The current number of references to the bridge, including those held by outstanding
    /// requests.
    ///
    /// The value may be outdated by the time the caller looks at it if other threads hold
    /// references.
    #[must_use]
    pub fn ref_count(&self) -> usize {
        self.state.ref_count()
    }

    #[cfg(test)]
    pub(crate) fn request_state(&self) -> u8 {
        self.state.request_state()
    }
}

impl<S> Clone for EventBridge<S>
where
    S: EventStream,
{
    fn clone(&self) -> Self {
        self.retain()
    }
}

impl<S> fmt::Debug for EventBridge<S>
where
    S: EventStream,
{
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("state", &*self.state)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

/// The completion target registered with the event generator for one request.
///
/// Holds a reference to the bridge for as long as the request is outstanding. If the event
/// source drops it without invoking it, the request ends with
/// [`Error::RequestDropped`][crate::Error::RequestDropped].
struct BridgeCompletion<S>
where
    S: EventStream,
{
    bridge: EventBridge<S>,
    invoked: bool,
}

impl<S> CompletionTarget<TokenOf<S>> for BridgeCompletion<S>
where
    S: EventStream,
{
    fn invoke(mut self: Box<Self>, token: TokenOf<S>) -> Result<()> {
        self.invoked = true;

        // Our reference to the bridge is released when `self` is dropped at the end of this
        // call, after the waiter has been signaled.
        self.bridge.state.complete(token)
    }
}

impl<S> Drop for BridgeCompletion<S>
where
    S: EventStream,
{
    fn drop(&mut self) {
        if !self.invoked {
            self.bridge.state.discard_request();
        }
    }
}
