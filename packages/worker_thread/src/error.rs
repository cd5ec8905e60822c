use std::io;

use thiserror::Error;

/// Errors that can occur when operating a [`WorkerThread`][crate::WorkerThread].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The worker thread has already been started. A worker thread can only run once.
    #[error("worker thread has already been started")]
    AlreadyStarted,

    /// The worker thread has not been started, so there is nothing to join.
    #[error("worker thread has not been started")]
    NotStarted,

    /// The worker thread has already been joined by another owner.
    #[error("worker thread has already been joined")]
    AlreadyJoined,

    /// The operating system refused to create the thread.
    #[error("failed to spawn worker thread")]
    Spawn(#[source] io::Error),

    /// The entry point of the worker thread panicked.
    #[error("worker thread panicked: {message}")]
    Panicked {
        /// The panic message, if the panic payload was a string.
        message: String,
    },
}

/// A specialized `Result` type for worker thread operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;
