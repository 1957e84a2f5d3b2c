//! # cowval demo
//!
//! A route table kept by a copy-on-write reloader: simulated control-plane
//! updates are queued as operations while readers resolve paths against
//! lock-free snapshots.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod error;
pub mod logging;
pub mod routes;

pub use app::*;
pub use error::*;
pub use routes::*;
