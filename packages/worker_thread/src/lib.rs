#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A one-shot worker thread with shared ownership.
//!
//! [`WorkerThread`] wraps a single operating system thread that is created dormant, started
//! exactly once with an entry point and joined by any one of its owners. It is the thread
//! primitive that event sources use to deliver completions on a thread of their own.
//!
//! ```rust
//! use worker_thread::WorkerThread;
//!
//! let worker = WorkerThread::named("completion-executor");
//! let owner = worker.clone();
//!
//! worker.run(|| "delivered").unwrap();
//! assert_eq!(owner.join().unwrap(), "delivered");
//! ```

mod constants;
mod error;
mod worker;

pub(crate) use constants::*;
pub use error::Error;
pub(crate) use error::Result;
pub use worker::*;
