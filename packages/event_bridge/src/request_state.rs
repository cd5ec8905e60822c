//! State machine of the single outstanding request of a bridge.
//!
//! The following states exist:
//!
//! 0 - idle - no request is outstanding; a waiter may issue a new one.
//! 1 - waiting - a request is outstanding and its waiter is (about to be) blocked on it.
//! 2 - abandoned - a request is outstanding but its waiter timed out and left; the completion
//!                 will be retrieved and discarded when it arrives.
//! 3 - dropped - the completion of a request failed and was not delivered to the waiter
//!               because the bridge is configured not to signal on failure; the waiter is
//!               still blocked and will only leave if it has a timeout.
//!
//! Transitions:
//!
//! * `idle -> waiting` - waiter, before issuing a request.
//! * `waiting -> idle` - completion, right before signaling the waiter; or waiter, if the
//!   request was rejected synchronously.
//! * `waiting -> abandoned` - waiter, on timeout.
//! * `waiting -> dropped` - completion, when it fails and is configured to stay silent.
//! * `abandoned -> idle` - late completion, after discarding its outcome.
//! * `dropped -> idle` - waiter, on timeout.
//!
//! Exactly one party moves the state out of `waiting`. Whoever loses that race adapts to the
//! winner's decision, which is how a timeout and a completion can cross without losing a
//! signal or leaving one behind for a future waiter.
//!
//! An event source may also drop the completion target without ever invoking it. Once the
//! request has been issued, this counts as a failed completion (`Error::RequestDropped`) and
//! takes the same transitions as one. While the waiter is still inside `begin_get_event()`, it
//! cannot yet tell an accepted request from a rejected one, so a second, per-request state
//! decides who handles the drop:
//!
//! 0 - pending - `begin_get_event()` has not returned yet.
//! 1 - armed - the event source accepted the request and the waiter is about to block.
//! 2 - target dropped - the completion target was dropped before the request was armed.
//!
//! * `pending -> armed` - waiter, after `begin_get_event()` accepted the request.
//! * `pending -> target dropped` - completion target, dropped without being invoked. The
//!   waiter sees this when it tries to arm the request and reports the drop (or the
//!   rejection) without touching the completion signal.
//!
//! A completion target dropped after the request was armed delivers the failure itself.

pub(crate) const REQUEST_IDLE: u8 = 0;
pub(crate) const REQUEST_WAITING: u8 = 1;
pub(crate) const REQUEST_ABANDONED: u8 = 2;
pub(crate) const REQUEST_DROPPED: u8 = 3;

pub(crate) const ISSUE_PENDING: u8 = 0;
pub(crate) const ISSUE_ARMED: u8 = 1;
pub(crate) const ISSUE_TARGET_DROPPED: u8 = 2;
