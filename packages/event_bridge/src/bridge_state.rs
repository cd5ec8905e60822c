use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use rsevents::{Awaitable, AutoResetEvent, EventState};
use tracing::{debug, trace, warn};

use crate::{
    CallbackFailurePolicy, ERR_POISONED_LOCK, Error, EventGenerator, EventHandler, EventOf,
    EventStream, EventType, ISSUE_ARMED, ISSUE_PENDING, ISSUE_TARGET_DROPPED, REQUEST_ABANDONED,
    REQUEST_DROPPED, REQUEST_IDLE, REQUEST_WAITING, Result, SourceEvent, TokenOf,
};

/// Marks "accept any event type" in the expected type slot. Real event types are `u32`, so
/// this value can never collide with one.
const ANY_EVENT_TYPE: u64 = u64::MAX;

/// The outcome of one completion, recorded by the callback thread for the waiter.
#[derive(Debug)]
pub(crate) enum Completion {
    /// The event could not be retrieved, its type could not be read or it was not the
    /// expected type. The event was not dispatched.
    Failed(Error),

    /// The event was dispatched to the handler for its type.
    Dispatched {
        event_type: EventType,
        handler_result: Result<()>,
    },
}

/// The state shared by all references to a bridge and by the completion targets of its
/// outstanding request.
#[derive(derive_more::Debug)]
pub(crate) struct BridgeState<S>
where
    S: EventStream,
{
    #[debug(ignore)]
    stream: S,

    #[debug(ignore)]
    generator: S::Generator,

    #[debug(ignore)]
    handler: Box<dyn EventHandler<EventOf<S>>>,

    wait_timeout: Option<Duration>,
    callback_failure_policy: CallbackFailurePolicy,

    /// Written by the waiter before it issues a request, read by the callback thread.
    /// Holds either an `EventType` tag or `ANY_EVENT_TYPE`.
    expected_type: AtomicU64,

    /// See `request_state.rs`.
    request_state: AtomicU8,

    /// Whether the outstanding request has been accepted by the event source, see
    /// `request_state.rs`.
    issue_state: AtomicU8,

    /// Written by the callback thread before it sets `completed`, taken by the waiter after
    /// its wait on `completed` returns. The lock is never contended in a correct exchange,
    /// the ordering between the two threads comes from `completed`.
    completion: Mutex<Option<Completion>>,

    /// Set by the callback thread (release), awaited by the waiter (acquire).
    #[debug(ignore)]
    completed: AutoResetEvent,
}

impl<S> BridgeState<S>
where
    S: EventStream,
{
    pub(crate) fn new(
        stream: S,
        generator: S::Generator,
        handler: Box<dyn EventHandler<EventOf<S>>>,
        wait_timeout: Option<Duration>,
        callback_failure_policy: CallbackFailurePolicy,
    ) -> Self {
        Self {
            stream,
            generator,
            handler,
            wait_timeout,
            callback_failure_policy,
            expected_type: AtomicU64::new(ANY_EVENT_TYPE),
            request_state: AtomicU8::new(REQUEST_IDLE),
            issue_state: AtomicU8::new(ISSUE_PENDING),
            completion: Mutex::new(None),
            completed: AutoResetEvent::new(EventState::Unset),
        }
    }

    pub(crate) fn stream(&self) -> &S {
        &self.stream
    }

    pub(crate) fn generator(&self) -> &S::Generator {
        &self.generator
    }

    /// Claims the right to issue a request and records what the waiter expects.
    ///
    /// # Panics
    ///
    /// Panics if another wait is in progress on the same bridge.
    pub(crate) fn start_request(&self, expected: Option<EventType>) -> Result<()> {
        match self.request_state.compare_exchange(
            REQUEST_IDLE,
            REQUEST_WAITING,
            Ordering::Acquire,
            Ordering::Acquire,
        ) {
            Ok(_) => {}
            Err(REQUEST_ABANDONED) => return Err(Error::RequestOutstanding),
            Err(_) => panic!(
                "concurrent waits on the same event bridge are not supported - \
                only one thread may wait for an event at a time"
            ),
        }

        // The generator receives the completion target after this store and hands it to the
        // callback thread, which carries this write along.
        self.expected_type
            .store(encode_expected(expected), Ordering::Relaxed);
        self.issue_state.store(ISSUE_PENDING, Ordering::Relaxed);

        Ok(())
    }

    /// Marks the request as accepted by the event source, after `begin_get_event()` returned
    /// successfully. From here on, the completion target owns the outcome of the request.
    ///
    /// Fails if the event source dropped the completion target before this point.
    pub(crate) fn arm_request(&self) -> Result<()> {
        match self.issue_state.compare_exchange(
            ISSUE_PENDING,
            ISSUE_ARMED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(()),
            Err(ISSUE_TARGET_DROPPED) => {
                warn!("event source accepted the request but dropped it right away");
                self.cancel_request();
                Err(Error::RequestDropped)
            }
            Err(state) => panic!("request armed in unexpected issue state {state}"),
        }
    }

    /// Called when the event source drops the completion target of the outstanding request
    /// without invoking it.
    pub(crate) fn discard_request(&self) {
        if self
            .issue_state
            .compare_exchange(
                ISSUE_PENDING,
                ISSUE_TARGET_DROPPED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            // The waiter is still in `begin_get_event()` and will find out when arming.
            debug!("completion target dropped while the request was being issued");
            return;
        }

        warn!("event source dropped the outstanding request without completing it");
        self.deliver(Completion::Failed(Error::RequestDropped));
    }

    /// Returns the bridge to idle after the generator rejected a request synchronously, or
    /// dropped it before it could be armed. The completion signal has not been touched.
    pub(crate) fn cancel_request(&self) {
        self.request_state.store(REQUEST_IDLE, Ordering::Release);
    }

    /// Blocks until the outstanding request completes or the wait timeout elapses.
    pub(crate) fn await_completion(&self) -> Result<Completion> {
        if let Some(timeout) = self.wait_timeout {
            if !self.completed.wait_for(timeout) {
                self.abandon_request(timeout)?;
            }
        } else {
            self.completed.wait();
        }

        Ok(self
            .completion
            .lock()
            .expect(ERR_POISONED_LOCK)
            .take()
            .expect("a completion is always recorded before the waiter is signaled"))
    }

    /// Called by the waiter when its timeout elapses. Returns `Ok` if the completion won the
    /// race and the waiter has consumed its signal after all.
    fn abandon_request(&self, timeout: Duration) -> Result<()> {
        match self.request_state.compare_exchange(
            REQUEST_WAITING,
            REQUEST_ABANDONED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                debug!(?timeout, "wait timed out, abandoning outstanding request");
                Err(Error::TimedOut { timeout })
            }
            Err(REQUEST_IDLE) => {
                // The completion moved the request to idle just before we could abandon it,
                // so its signal is set or about to be. Consume it, lest it wake a future wait.
                trace!("completion arrived as the wait timed out");
                self.completed.wait();
                Ok(())
            }
            Err(REQUEST_DROPPED) => {
                debug!(?timeout, "wait timed out after a silently dropped completion");
                self.request_state.store(REQUEST_IDLE, Ordering::Release);
                Err(Error::TimedOut { timeout })
            }
            Err(state) => panic!("wait timed out in unexpected request state {state}"),
        }
    }

    /// Handles the completion of the outstanding request on the callback thread.
    ///
    /// The result is what the completion target reports back to the event source.
    pub(crate) fn complete(&self, token: TokenOf<S>) -> Result<()> {
        let completion = self.receive(token);

        let outcome = match &completion {
            Completion::Failed(error) => Err(error.clone()),
            Completion::Dispatched { .. } => Ok(()),
        };

        self.deliver(completion);

        outcome
    }

    fn receive(&self, token: TokenOf<S>) -> Completion {
        let event = match self.generator.end_get_event(token) {
            Ok(event) => event,
            Err(error) => {
                warn!(%error, "failed to retrieve completed event");
                return Completion::Failed(Error::CallbackFailed(error));
            }
        };

        let event_type = match event.event_type() {
            Ok(event_type) => event_type,
            Err(error) => {
                warn!(%error, "failed to read type of completed event");
                return Completion::Failed(Error::CallbackFailed(error));
            }
        };

        if let Some(expected) = decode_expected(self.expected_type.load(Ordering::Relaxed)) {
            if event_type != expected {
                warn!(%expected, received = %event_type, "received unexpected event type");
                return Completion::Failed(Error::Unexpected {
                    expected,
                    received: event_type,
                });
            }
        }

        Completion::Dispatched {
            event_type,
            handler_result: self.dispatch(event_type, &event),
        }
    }

    fn dispatch(&self, event_type: EventType, event: &EventOf<S>) -> Result<()> {
        let result = match event_type {
            EventType::STREAM_STARTED => {
                debug!("stream started");
                self.handler.on_stream_started(event)
            }
            EventType::STREAM_SEEKED => {
                debug!("stream seeked");
                self.handler.on_stream_seeked(event)
            }
            _ => {
                debug!(%event_type, "unhandled event type");
                Ok(())
            }
        };

        result.map_err(|source| {
            warn!(%event_type, %source, "event handler failed");
            Error::HandlerFailed { event_type, source }
        })
    }

    #[cfg_attr(test, mutants::skip)] // Waiters hang forever if tampered.
    fn deliver(&self, completion: Completion) {
        if matches!(completion, Completion::Failed(_))
            && self.callback_failure_policy == CallbackFailurePolicy::Silent
        {
            self.drop_silently();
            return;
        }

        *self.completion.lock().expect(ERR_POISONED_LOCK) = Some(completion);

        match self.request_state.compare_exchange(
            REQUEST_WAITING,
            REQUEST_IDLE,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => self.completed.set(),
            Err(REQUEST_ABANDONED) => {
                let discarded = self.completion.lock().expect(ERR_POISONED_LOCK).take();
                debug!(?discarded, "discarding completion of abandoned request");

                // Only now may a new request be issued - the slot is empty again.
                self.request_state.store(REQUEST_IDLE, Ordering::Release);
            }
            Err(state) => panic!(
                "event source delivered a completion in request state {state} - \
                completions are only valid for accepted requests"
            ),
        }
    }

    fn drop_silently(&self) {
        match self.request_state.compare_exchange(
            REQUEST_WAITING,
            REQUEST_DROPPED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => debug!("completion failed, not signaling the waiter"),
            Err(REQUEST_ABANDONED) => {
                self.request_state.store(REQUEST_IDLE, Ordering::Release);
            }
            Err(state) => panic!(
                "event source delivered a completion in request state {state} - \
                completions are only valid for accepted requests"
            ),
        }
    }

    #[cfg(test)]
    pub(crate) fn request_state(&self) -> u8 {
        self.request_state.load(Ordering::Acquire)
    }
}

fn encode_expected(expected: Option<EventType>) -> u64 {
    expected.map_or(ANY_EVENT_TYPE, |event_type| u64::from(event_type.get()))
}

fn decode_expected(raw: u64) -> Option<EventType> {
    if raw == ANY_EVENT_TYPE {
        return None;
    }

    Some(EventType::new(
        u32::try_from(raw).expect("expected type slot only ever holds u32 tags or the marker"),
    ))
}

/// Validates the outcome of a completion against what the waiter asked for.
pub(crate) fn evaluate(completion: Completion, expected: Option<EventType>) -> Result<EventType> {
    match completion {
        Completion::Failed(error)
        | Completion::Dispatched {
            handler_result: Err(error),
            ..
        } => Err(error),
        Completion::Dispatched {
            event_type,
            handler_result: Ok(()),
        } => match expected {
            Some(expected) if expected != event_type => Err(Error::Unexpected {
                expected,
                received: event_type,
            }),
            _ => Ok(event_type),
        },
    }
}
