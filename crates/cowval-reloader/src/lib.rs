//! # cowval reloader
//!
//! A value refreshed on a fixed cadence with a copy-on-write strategy.
//!
//! Callers queue operations with [`Reloader::accept`]. On every tick the
//! background task drains the queue, copies the current snapshot, applies
//! the batch to the copy and publishes it atomically. [`Reloader::reload`]
//! is a single lock-free load and always returns a complete snapshot.
//!
//! Failures inside a cycle never reach `accept` or `reload` callers; they
//! are logged and delivered on [`Reloader::errors`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod buffer;
pub mod cycle;
pub mod error;
pub mod reloader;
pub mod snapshot;
pub mod stream;

pub use buffer::PendingBuffer;
pub use cycle::{CycleOutcome, CycleReport};
pub use error::*;
pub use reloader::{Reloader, ReloaderBuilder};
pub use snapshot::SnapshotCell;
pub use stream::ErrorStream;

pub use cowval_common::{Op, Operation, Value};
