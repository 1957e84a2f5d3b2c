//! # cowval config
//!
//! Configuration for cowval reloaders and the processes that host them.
//!
//! This crate provides the serde schema, defaults, validation and file
//! loading with environment overrides and atomic saves.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod defaults;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validator;

pub use error::*;
pub use loader::*;
pub use schema::*;
pub use validator::*;
