use std::any::{Any, type_name};
use std::fmt;
use std::mem;
use std::panic;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::{ERR_POISONED_LOCK, Error, Result};

enum WorkerState<R> {
    /// Created but `run()` has not been called yet.
    Created,

    /// The entry point was started on the thread behind the handle. It may have returned
    /// already, nobody has joined the thread yet.
    Running(JoinHandle<R>),

    /// Joined by one of the owners. Terminal state.
    Joined,
}

struct WorkerInner<R> {
    name: Option<String>,
    state: Mutex<WorkerState<R>>,
}

impl<R> Drop for WorkerInner<R> {
    fn drop(&mut self) {
        // We are the last owner, so nobody else can be holding the lock.
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);

        let WorkerState::Running(handle) = mem::replace(state, WorkerState::Joined) else {
            return;
        };

        if handle.thread().id() == thread::current().id() {
            // The entry point released the last handle itself. The thread exits on its own
            // once the entry point returns, there is nobody left to join it.
            debug!(name = ?self.name, "last handle released on the worker thread, detaching");
            return;
        }

        debug!(name = ?self.name, "last handle released, joining worker thread");

        if let Err(payload) = handle.join() {
            // Nobody joined the thread to observe the panic, so we surface it here instead of
            // silently swallowing it. Unless we are already unwinding, in which case a second
            // panic would abort the process.
            if !thread::panicking() {
                panic::resume_unwind(payload);
            }
        }
    }
}

/// A thread that runs a single entry point exactly once and can be joined by any of its owners.
///
/// The worker thread is created in a dormant state. Calling [`run()`][Self::run] starts the
/// operating system thread; a worker thread cannot be started a second time. Cloning the
/// handle adds an owner; the thread is joined automatically when the last owner is dropped
/// (if nobody joined it explicitly before that).
///
/// # Example
///
/// ```rust
/// use worker_thread::WorkerThread;
///
/// let worker = WorkerThread::new();
/// worker.run(|| 40 + 2).unwrap();
///
/// assert_eq!(worker.join().unwrap(), 42);
/// ```
pub struct WorkerThread<R = ()>
where
    R: Send + 'static,
{
    inner: Arc<WorkerInner<R>>,
}

impl<R> WorkerThread<R>
where
    R: Send + 'static,
{
    /// Creates a new worker thread that has not yet been started.
    #[must_use]
    pub fn new() -> Self {
        Self::from_name(None)
    }

    /// Creates a new worker thread that will be given the specified name once started.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::thread;
    ///
    /// use worker_thread::WorkerThread;
    ///
    /// let worker = WorkerThread::named("event-executor");
    /// worker
    ///     .run(|| thread::current().name().map(ToString::to_string))
    ///     .unwrap();
    ///
    /// assert_eq!(worker.join().unwrap().as_deref(), Some("event-executor"));
    /// ```
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::from_name(Some(name.into()))
    }

    fn from_name(name: Option<String>) -> Self {
        Self {
            inner: Arc::new(WorkerInner {
                name,
                state: Mutex::new(WorkerState::Created),
            }),
        }
    }

    /// Starts the worker thread, executing `entry_point` on it.
    ///
    /// Returns immediately once the thread has been created. Any state the entry point needs
    /// is captured by the closure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyStarted`] if the worker thread has been started before.
    ///
    /// Returns [`Error::Spawn`] if the operating system fails to create the thread.
    pub fn run<F>(&self, entry_point: F) -> Result<()>
    where
        F: FnOnce() -> R + Send + 'static,
    {
        let mut state = self.inner.state.lock().expect(ERR_POISONED_LOCK);

        if !matches!(*state, WorkerState::Created) {
            return Err(Error::AlreadyStarted);
        }

        let mut builder = thread::Builder::new();

        if let Some(name) = &self.inner.name {
            builder = builder.name(name.clone());
        }

        let handle = builder
            .spawn(move || {
                debug!("worker thread started");
                let result = entry_point();
                debug!("worker thread exiting");
                result
            })
            .map_err(Error::Spawn)?;

        *state = WorkerState::Running(handle);

        Ok(())
    }

    /// Blocks until the worker thread exits and returns the value produced by its entry point.
    ///
    /// Only one owner can join the thread. The lock on the shared state is released before
    /// blocking, so other owners are free to query the worker while the join is in progress.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotStarted`] if [`run()`][Self::run] has not been called.
    ///
    /// Returns [`Error::AlreadyJoined`] if another owner has already joined the thread.
    ///
    /// Returns [`Error::Panicked`] if the entry point panicked.
    pub fn join(&self) -> Result<R> {
        let handle = {
            let mut state = self.inner.state.lock().expect(ERR_POISONED_LOCK);

            match mem::replace(&mut *state, WorkerState::Joined) {
                WorkerState::Running(handle) => handle,
                WorkerState::Created => {
                    *state = WorkerState::Created;
                    return Err(Error::NotStarted);
                }
                WorkerState::Joined => return Err(Error::AlreadyJoined),
            }
        };

        handle.join().map_err(|payload| Error::Panicked {
            message: panic_message(payload.as_ref()),
        })
    }

    /// Whether [`run()`][Self::run] has been called on any handle to this worker thread.
    #[must_use]
    pub fn is_started(&self) -> bool {
        !matches!(
            *self.inner.state.lock().expect(ERR_POISONED_LOCK),
            WorkerState::Created
        )
    }

    /// The number of handles that currently own this worker thread.
    #[must_use]
    pub fn owner_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Adds an owner, returning its handle. Equivalent to `clone()`.
    #[must_use]
    pub fn retain(&self) -> Self {
        self.clone()
    }

    /// Gives up this handle and returns the number of owners that remain.
    ///
    /// Releasing the last owner joins the thread if it is still running and nobody has joined
    /// it yet. Exactly one release reports zero remaining owners, even when owners are released
    /// concurrently. Any other count may be outdated by the time the caller looks at it if other
    /// threads hold handles.
    ///
    /// # Panics
    ///
    /// Resumes the panic of the entry point if the last owner is released, the thread
    /// panicked and nobody joined it before.
    #[expect(
        clippy::must_use_candidate,
        reason = "releasing without looking at the count is equivalent to drop()"
    )]
    pub fn release(self) -> usize {
        let observed = self.owner_count();

        match Arc::into_inner(self.inner) {
            Some(inner) => {
                drop(inner);
                0
            }
            // Another owner remained when we let go, even if it has been released since.
            None => observed.saturating_sub(1).max(1),
        }
    }
}

impl<R> Default for WorkerThread<R>
where
    R: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for WorkerThread<R>
where
    R: Send + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> fmt::Debug for WorkerThread<R>
where
    R: Send + 'static,
{
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("name", &self.inner.name)
            .field("is_started", &self.is_started())
            .field("owner_count", &self.owner_count())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
