#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for testing and examples in the event bridge packages.
//!
//! Most of what we test here is blocking code that hands control between threads. A bug in
//! that code does not fail loudly, it hangs. The helpers in this crate turn hangs into test
//! failures ([`with_watchdog`]) and let a test assert that something is expected to stay
//! blocked ([`assert_blocks_for`]).

use std::sync::mpsc;
use std::time::Duration;
use std::{env, panic, thread};

/// How long [`with_watchdog`] lets a test run before failing it.
///
/// Miri is dramatically slower for thread synchronization, so we use a
/// longer timeout there to avoid false positives while still catching real hangs.
#[must_use]
pub fn default_watchdog_timeout() -> Duration {
    if cfg!(miri) {
        Duration::from_secs(60)
    } else {
        Duration::from_secs(10)
    }
}

/// Runs a test with the [default timeout][default_watchdog_timeout] to prevent infinite hangs.
///
/// When the `MUTATION_TESTING` environment variable is set to "1", the watchdog
/// is disabled and the test function is executed directly. This allows mutation
/// testing to properly detect hanging mutations.
///
/// # Panics
///
/// Panics if the test exceeds the timeout (when not in mutation testing mode).
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// with_watchdog(|| {
///     assert_eq!(2 + 2, 4);
/// });
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    with_watchdog_for(default_watchdog_timeout(), test_fn)
}

/// Runs a test on a separate thread and fails if it does not complete within `timeout`.
///
/// The test thread is abandoned if it times out; the process is expected to exit soon after
/// because the calling test fails.
///
/// # Panics
///
/// Panics if the test exceeds the timeout (when not in mutation testing mode).
///
/// Resumes the panic of the test thread if the test itself panicked.
pub fn with_watchdog_for<F, R>(timeout: Duration, test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let (tx, rx) = mpsc::channel();

    let test_handle = thread::spawn(move || {
        let result = test_fn();
        // If this fails, the receiver has timed out and nobody cares about the result anymore.
        drop(tx.send(result));
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            test_handle.join().expect("test thread should not panic");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("test exceeded watchdog timeout of {timeout:?} - is something deadlocked?");
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match test_handle.join() {
            Ok(()) => panic!("test thread disconnected unexpectedly"),
            Err(e) => panic::resume_unwind(e),
        },
    }
}

/// Asserts that `blocking_fn` does not return within `duration`.
///
/// The function is started on a detached background thread that is left running (and typically
/// blocked forever) after the assertion. Use this to document situations where blocking
/// indefinitely is the expected behavior.
///
/// # Panics
///
/// Panics if `blocking_fn` returns or panics within `duration`.
///
/// # Example
///
/// ```rust
/// use std::sync::mpsc;
/// use std::time::Duration;
///
/// use testing::assert_blocks_for;
///
/// let (_tx, rx) = mpsc::channel::<()>();
///
/// assert_blocks_for(Duration::from_millis(50), move || {
///     drop(rx.recv());
/// });
/// ```
pub fn assert_blocks_for<F>(duration: Duration, blocking_fn: F)
where
    F: FnOnce() + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<()>();

    thread::spawn(move || {
        // The sender is dropped on both return and panic, so either unblocks the receiver.
        let _finished = tx;
        blocking_fn();
    });

    match rx.recv_timeout(duration) {
        Err(mpsc::RecvTimeoutError::Timeout) => {}
        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
            panic!("expected the operation to remain blocked for {duration:?} but it finished");
        }
    }
}
