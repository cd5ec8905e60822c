//! Scriptable in-memory event stream for testing the bridge.
//!
//! Tests push the outcomes of future completions into the script via a [`FakeController`].
//! Depending on the [`FakeStreamBehavior`], requests are completed on a separate executor
//! thread, inline, held until released or dropped, dropped without ever being completed or
//! rejected outright.

use std::collections::VecDeque;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, mpsc};

use worker_thread::WorkerThread;

use crate::{
    CompletionTarget, EventGenerator, EventStream, EventType, MockSourceEvent, Result, SourceError,
};

type FakeTarget = Box<dyn CompletionTarget<FakeToken>>;

/// Creates an event that reports the given type.
pub(crate) fn typed_event(event_type: EventType) -> MockSourceEvent {
    let mut event = MockSourceEvent::new();
    event.expect_event_type().return_const(Ok(event_type));
    event
}

/// Creates the completion token that delivers `event`.
pub(crate) fn event_token(event: MockSourceEvent) -> FakeToken {
    FakeToken(Scripted::Event(event))
}

/// Creates an event whose type cannot be read.
pub(crate) fn untyped_event() -> MockSourceEvent {
    let mut event = MockSourceEvent::new();
    event
        .expect_event_type()
        .return_const(Err(SourceError::new("event carries no type")));
    event
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) enum FakeStreamBehavior {
    /// Requests are completed on a dedicated executor thread as soon as a scripted outcome
    /// is available.
    #[default]
    Deliver,

    /// Requests are completed inline, before `begin_get_event()` returns. The outcome must
    /// have been scripted before the request is made.
    CompleteSynchronously,

    /// Requests are accepted but only completed by [`FakeController::release_held_requests`]
    /// or dropped by [`FakeController::drop_held_requests`].
    HoldRequests,

    /// Requests are accepted and their completion targets dropped on the executor thread
    /// without being invoked.
    DropRequests,

    /// Requests are accepted but their completion targets are dropped without being invoked,
    /// before `begin_get_event()` returns.
    DropRequestsSynchronously,

    /// Requests are rejected synchronously.
    RejectRequests,

    /// The stream has no event generator.
    NoGenerator,
}

#[derive(Debug)]
enum Scripted {
    Event(MockSourceEvent),
    RetrievalFailure(SourceError),
}

/// The opaque completion token of the fake generator, carrying the scripted outcome.
#[derive(Debug)]
pub(crate) struct FakeToken(Scripted);

#[derive(derive_more::Debug)]
struct Script {
    items: Mutex<VecDeque<Scripted>>,
    item_added: Condvar,

    invoke_results: Mutex<Vec<Result<()>>>,
    invoke_result_added: Condvar,

    #[debug(ignore)]
    held: Mutex<Vec<FakeTarget>>,

    destroyed: AtomicUsize,
}

impl Script {
    fn next_item(&self) -> Scripted {
        let mut items = self.items.lock().unwrap();

        loop {
            if let Some(item) = items.pop_front() {
                return item;
            }

            items = self.item_added.wait(items).unwrap();
        }
    }

    fn complete(&self, target: FakeTarget) {
        let result = target.invoke(FakeToken(self.next_item()));

        self.invoke_results.lock().unwrap().push(result);
        self.invoke_result_added.notify_all();
    }
}

/// Test-side handle to the script of a [`FakeStream`].
#[derive(Clone, Debug)]
pub(crate) struct FakeController {
    script: Arc<Script>,
}

impl FakeController {
    /// Scripts the next completion to deliver `event`.
    pub(crate) fn push_event(&self, event: MockSourceEvent) {
        self.push(Scripted::Event(event));
    }

    /// Scripts the next completion to fail when the event is retrieved.
    pub(crate) fn push_retrieval_failure(&self, error: SourceError) {
        self.push(Scripted::RetrievalFailure(error));
    }

    fn push(&self, item: Scripted) {
        self.script.items.lock().unwrap().push_back(item);
        self.script.item_added.notify_all();
    }

    /// Waits until `count` completions have been invoked and returns what the completion
    /// target reported back to the source for each of them.
    pub(crate) fn invoke_results(&self, count: usize) -> Vec<Result<()>> {
        let mut results = self.script.invoke_results.lock().unwrap();

        while results.len() < count {
            results = self.script.invoke_result_added.wait(results).unwrap();
        }

        results.clone()
    }

    /// Completes all held requests on the calling thread.
    pub(crate) fn release_held_requests(&self) {
        // Not holding the lock while invoking, as completion may release the last reference
        // to the bridge and with it the generator.
        let held = mem::take(&mut *self.script.held.lock().unwrap());

        for target in held {
            self.script.complete(target);
        }
    }

    /// How many requests are currently held.
    pub(crate) fn held_count(&self) -> usize {
        self.script.held.lock().unwrap().len()
    }

    /// Drops all held requests on the calling thread without completing them.
    pub(crate) fn drop_held_requests(&self) {
        let held = mem::take(&mut *self.script.held.lock().unwrap());

        drop(held);
    }

    /// How many times a stream of this script has been destroyed.
    pub(crate) fn destroyed_count(&self) -> usize {
        self.script.destroyed.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub(crate) struct FakeStream {
    script: Arc<Script>,
    behavior: FakeStreamBehavior,
}

impl FakeStream {
    pub(crate) fn new() -> Self {
        Self::with_behavior(FakeStreamBehavior::default())
    }

    pub(crate) fn with_behavior(behavior: FakeStreamBehavior) -> Self {
        Self {
            script: Arc::new(Script {
                items: Mutex::new(VecDeque::new()),
                item_added: Condvar::new(),
                invoke_results: Mutex::new(Vec::new()),
                invoke_result_added: Condvar::new(),
                held: Mutex::new(Vec::new()),
                destroyed: AtomicUsize::new(0),
            }),
            behavior,
        }
    }

    pub(crate) fn controller(&self) -> FakeController {
        FakeController {
            script: Arc::clone(&self.script),
        }
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.script.destroyed.fetch_add(1, Ordering::Relaxed);
    }
}

impl EventStream for FakeStream {
    type Generator = FakeGenerator;

    fn event_generator(&self) -> std::result::Result<FakeGenerator, SourceError> {
        if self.behavior == FakeStreamBehavior::NoGenerator {
            return Err(SourceError::new("stream is not an event generator"));
        }

        let (requests_tx, requests_rx) = mpsc::channel::<FakeTarget>();

        let executor = WorkerThread::named("fake-event-executor");
        executor
            .run({
                let script = Arc::clone(&self.script);
                let behavior = self.behavior;
                move || {
                    for target in requests_rx {
                        if behavior == FakeStreamBehavior::DropRequests {
                            drop(target);
                        } else {
                            script.complete(target);
                        }
                    }
                }
            })
            .map_err(|error| SourceError::new(format!("no executor thread: {error}")))?;

        Ok(FakeGenerator {
            script: Arc::clone(&self.script),
            behavior: self.behavior,
            requests: requests_tx,
            _executor: executor,
        })
    }
}

#[derive(derive_more::Debug)]
pub(crate) struct FakeGenerator {
    script: Arc<Script>,
    behavior: FakeStreamBehavior,

    // Dropped before the executor handle, so the executor loop ends before we join it.
    #[debug(ignore)]
    requests: mpsc::Sender<FakeTarget>,

    _executor: WorkerThread,
}

impl EventGenerator for FakeGenerator {
    type Event = MockSourceEvent;
    type Token = FakeToken;

    fn begin_get_event(&self, target: FakeTarget) -> std::result::Result<(), SourceError> {
        match self.behavior {
            FakeStreamBehavior::Deliver | FakeStreamBehavior::DropRequests => self
                .requests
                .send(target)
                .map_err(|_| SourceError::new("executor is gone")),
            FakeStreamBehavior::CompleteSynchronously => {
                self.script.complete(target);
                Ok(())
            }
            FakeStreamBehavior::DropRequestsSynchronously => {
                drop(target);
                Ok(())
            }
            FakeStreamBehavior::HoldRequests => {
                self.script.held.lock().unwrap().push(target);
                Ok(())
            }
            FakeStreamBehavior::RejectRequests | FakeStreamBehavior::NoGenerator => {
                Err(SourceError::new("request rejected"))
            }
        }
    }

    fn end_get_event(&self, token: FakeToken) -> std::result::Result<MockSourceEvent, SourceError> {
        match token.0 {
            Scripted::Event(event) => Ok(event),
            Scripted::RetrievalFailure(error) => Err(error),
        }
    }
}
