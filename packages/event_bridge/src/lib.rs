#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Turns push-style asynchronous event delivery into a blocking wait for a specific event.
//!
//! Many media and device frameworks deliver events by calling back into the application on a
//! thread of their own choosing. Code that drives such a framework step by step ("start the
//! stream, then wait until it has started") wants the opposite: a call that blocks until the
//! next event arrives and reports whether it was the right one.
//!
//! An [`EventBridge`] sits between the two. It is created from an [`EventStream`] and registers
//! itself with the stream's [`EventGenerator`] each time a thread calls
//! [`EventBridge::wait_for_event()`]. When the generator invokes the completion callback, the
//! bridge retrieves the event, checks its type, dispatches it to an [`EventHandler`] and wakes
//! up the waiting thread with the outcome.
//!
//! ```rust
//! # use event_bridge::{CompletionTarget, EventGenerator, EventStream, SourceError, SourceEvent};
//! # struct Stream;
//! # struct Generator;
//! # struct Event(EventType);
//! # impl SourceEvent for Event {
//! #     fn event_type(&self) -> Result<EventType, SourceError> { Ok(self.0) }
//! # }
//! # impl EventGenerator for Generator {
//! #     type Event = Event;
//! #     type Token = EventType;
//! #     fn begin_get_event(&self, target: Box<dyn CompletionTarget<EventType>>) -> Result<(), SourceError> {
//! #         std::thread::spawn(move || drop(target.invoke(EventType::STREAM_SEEKED)));
//! #         Ok(())
//! #     }
//! #     fn end_get_event(&self, token: EventType) -> Result<Event, SourceError> { Ok(Event(token)) }
//! # }
//! # impl EventStream for Stream {
//! #     type Generator = Generator;
//! #     fn event_generator(&self) -> Result<Generator, SourceError> { Ok(Generator) }
//! # }
//! use event_bridge::{Error, EventBridge, EventType};
//!
//! let bridge = EventBridge::new(Stream).unwrap();
//!
//! match bridge.wait_for_event(EventType::STREAM_STARTED) {
//!     Ok(_) => println!("stream started"),
//!     Err(Error::Unexpected { received, .. }) => println!("got {received} instead"),
//!     Err(error) => panic!("stream failed: {error}"),
//! }
//! ```
//!
//! # Lifetime
//!
//! The bridge is reference counted. Each outstanding request holds a reference of its own, so
//! an event source may complete a request after the application has dropped all of its handles
//! without touching freed memory.
//!
//! # Failure handling
//!
//! A failed completion is always reported back to the event source that invoked the callback.
//! Whether the waiter is woken up to receive the failure as well is decided by
//! [`CallbackFailurePolicy`]. A wait can be bounded with
//! [`EventBridgeBuilder::wait_timeout()`].

mod bridge;
mod bridge_state;
mod builder;
mod constants;
mod error;
mod event_type;
mod handler;
mod ref_count;
mod request_state;
mod source;

#[cfg(test)]
mod fake;

pub use bridge::*;
pub(crate) use bridge_state::*;
pub use builder::*;
pub(crate) use constants::*;
pub use error::*;
pub use event_type::*;
pub use handler::*;
pub(crate) use ref_count::*;
pub(crate) use request_state::*;
pub use source::*;
