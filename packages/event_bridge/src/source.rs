//! The collaborator interfaces of an asynchronous event source.
//!
//! An event source is split into two capabilities:
//!
//! * [`EventStream`] is the object a bridge is created from. Its only job is to hand out the
//!   event generation capability, if it has one.
//! * [`EventGenerator`] is that capability: it accepts requests for the next event and
//!   finalizes their completion.
//!
//! The bridge registers itself with the generator as a [`CompletionTarget`]. The generator
//! invokes the target on whatever thread it likes, once per request, passing back an opaque
//! token that the target uses to retrieve the completed event.

use crate::{EventType, Result, SourceError};

/// An object that may expose an event generation capability.
///
/// Asking for the capability is the explicit equivalent of an interface query: streams that
/// cannot generate events return an error and the bridge reports
/// [`Error::BindingFailed`][crate::Error::BindingFailed].
pub trait EventStream: Send + Sync + 'static {
    /// The event generation capability of this stream.
    type Generator: EventGenerator;

    /// Returns the event generation capability of this stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream does not support event generation.
    fn event_generator(&self) -> std::result::Result<Self::Generator, SourceError>;
}

/// Delivers events asynchronously, one per request.
pub trait EventGenerator: Send + Sync + 'static {
    /// The events produced by this generator.
    type Event: SourceEvent;

    /// Opaque token handed to the completion target, used to retrieve the completed event.
    type Token: Send + 'static;

    /// Requests delivery of the next event.
    ///
    /// Must return immediately. When the next event is available, the generator invokes
    /// `target` exactly once, on any thread (including synchronously from within this call).
    /// If the request is rejected, the target must not be invoked. A generator that gives up
    /// on an accepted request may drop `target` instead, which fails the request with
    /// [`Error::RequestDropped`][crate::Error::RequestDropped].
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be accepted.
    fn begin_get_event(
        &self,
        target: Box<dyn CompletionTarget<Self::Token>>,
    ) -> std::result::Result<(), SourceError>;

    /// Finalizes a completed request, returning the delivered event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be retrieved.
    fn end_get_event(&self, token: Self::Token) -> std::result::Result<Self::Event, SourceError>;
}

/// An event delivered by an [`EventGenerator`].
#[cfg_attr(test, mockall::automock)]
pub trait SourceEvent: Send + Sync + 'static {
    /// Returns the type tag of the event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event does not carry a readable type tag.
    fn event_type(&self) -> std::result::Result<EventType, SourceError>;
}

/// The role of a component that receives the completion callback of an asynchronous request.
pub trait CompletionTarget<T>: Send {
    /// Handles the completion of a request, identified by the opaque `token`.
    ///
    /// The result tells the invoker whether the completion was handled. There is nothing the
    /// invoker is expected to do about a failure other than record it.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion could not be handled.
    fn invoke(self: Box<Self>, token: T) -> Result<()>;
}

/// The event type produced by the generator of the event stream `S`.
pub type EventOf<S> = <<S as EventStream>::Generator as EventGenerator>::Event;

/// The completion token type used by the generator of the event stream `S`.
pub type TokenOf<S> = <<S as EventStream>::Generator as EventGenerator>::Token;
