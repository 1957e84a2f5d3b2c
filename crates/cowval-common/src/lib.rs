//! # cowval common
//!
//! Capability traits shared by every crate in the cowval workspace.
//!
//! A [`Value`] is the domain data kept by a reloader; an [`Operation`] is a
//! queued unit of change applied to a fresh copy of that value on each
//! refresh cycle.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod test_utils;

pub use types::*;
