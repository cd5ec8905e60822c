//! Drives a simulated media stream step by step, blocking on each event it delivers.
//!
//! The simulated stream delivers its events from an executor thread of its own, the way a
//! media framework calls back into the application. Run with `RUST_LOG=trace` to see what the
//! bridge is doing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use event_bridge::{
    CompletionTarget, EventBridge, EventGenerator, EventHandler, EventStream, EventType,
    SourceError, SourceEvent,
};
use tracing_subscriber::EnvFilter;
use worker_thread::WorkerThread;

type Target = Box<dyn CompletionTarget<EventType>>;

#[derive(Debug)]
struct MediaEvent(EventType);

impl SourceEvent for MediaEvent {
    fn event_type(&self) -> Result<EventType, SourceError> {
        Ok(self.0)
    }
}

/// A stream that plays back a fixed script of events.
#[derive(Debug)]
struct SimulatedStream {
    script: Arc<Mutex<VecDeque<EventType>>>,
}

impl EventStream for SimulatedStream {
    type Generator = SimulatedGenerator;

    fn event_generator(&self) -> Result<SimulatedGenerator, SourceError> {
        let (requests_tx, requests_rx) = mpsc::channel::<Target>();

        let executor = WorkerThread::named("media-events");
        executor
            .run({
                let script = Arc::clone(&self.script);
                move || {
                    for target in requests_rx {
                        // Decoding takes a while.
                        thread::sleep(Duration::from_millis(50));

                        let Some(next) = script.lock().expect("script lock poisoned").pop_front()
                        else {
                            // Out of script, so the request is dropped without being completed.
                            continue;
                        };

                        if let Err(error) = target.invoke(next) {
                            println!("bridge reported failure to the stream: {error}");
                        }
                    }
                }
            })
            .map_err(|error| SourceError::new(error.to_string()))?;

        Ok(SimulatedGenerator {
            requests: requests_tx,
            _executor: executor,
        })
    }
}

#[derive(Debug)]
struct SimulatedGenerator {
    requests: mpsc::Sender<Target>,
    _executor: WorkerThread,
}

impl EventGenerator for SimulatedGenerator {
    type Event = MediaEvent;
    type Token = EventType;

    fn begin_get_event(&self, target: Target) -> Result<(), SourceError> {
        self.requests
            .send(target)
            .map_err(|_| SourceError::new("media event executor has stopped"))
    }

    fn end_get_event(&self, token: EventType) -> Result<MediaEvent, SourceError> {
        Ok(MediaEvent(token))
    }
}

#[derive(Debug)]
struct PrintingHandler;

impl EventHandler<MediaEvent> for PrintingHandler {
    fn on_stream_started(&self, _event: &MediaEvent) -> Result<(), SourceError> {
        println!("handler: playback started on {:?}", thread::current().name());
        Ok(())
    }

    fn on_stream_seeked(&self, _event: &MediaEvent) -> Result<(), SourceError> {
        println!("handler: seek completed on {:?}", thread::current().name());
        Ok(())
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let stream = SimulatedStream {
        script: Arc::new(Mutex::new(VecDeque::from([
            EventType::STREAM_STARTED,
            EventType::STREAM_SEEKED,
            EventType::STREAM_STARTED,
        ]))),
    };

    let bridge = EventBridge::builder()
        .stream(stream)
        .handler(PrintingHandler)
        .wait_timeout(Duration::from_secs(1))
        .build()
        .expect("simulated stream always exposes an event generator");

    match bridge.wait_for_event(EventType::STREAM_STARTED) {
        Ok(event_type) => println!("main: received {event_type}"),
        Err(error) => println!("main: waiting for start failed: {error}"),
    }

    match bridge.wait_for_event(EventType::STREAM_SEEKED) {
        Ok(event_type) => println!("main: received {event_type}"),
        Err(error) => println!("main: waiting for seek failed: {error}"),
    }

    // The script delivers another start where we expect a seek.
    match bridge.wait_for_event(EventType::STREAM_SEEKED) {
        Ok(event_type) => println!("main: received {event_type}"),
        Err(error) => println!("main: waiting for seek failed: {error}"),
    }

    // The script is exhausted, so this runs into the wait timeout.
    match bridge.wait_for_any_event() {
        Ok(event_type) => println!("main: received {event_type}"),
        Err(error) => println!("main: waiting for any event failed: {error}"),
    }
}
