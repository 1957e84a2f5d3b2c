//! Error types for the reload engine.

use cowval_config::ConfigError;
use std::time::Duration;

/// Boxed error returned by a caller's `apply`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A failure inside one refresh cycle, delivered on the error stream.
#[derive(thiserror::Error, Debug)]
pub enum CycleError {
    /// `apply` returned an error. The partially applied copy was published.
    #[error("Cycle {cycle}: apply failed for batch of {ops} ops: {source}")]
    Apply {
        /// Cycle number.
        cycle: u64,
        /// Size of the batch.
        ops: usize,
        /// Error returned by `apply`.
        #[source]
        source: BoxError,
    },

    /// Copy and apply did not finish in time. The batch was discarded.
    #[error("Cycle {cycle}: copy and apply exceeded {timeout:?}, {ops} ops discarded")]
    ApplyTimeout {
        /// Cycle number.
        cycle: u64,
        /// Size of the discarded batch.
        ops: usize,
        /// Configured limit.
        timeout: Duration,
    },

    /// Copy or apply panicked. The batch was discarded.
    #[error("Cycle {cycle}: copy or apply panicked ({message}), {ops} ops discarded")]
    Panicked {
        /// Cycle number.
        cycle: u64,
        /// Size of the discarded batch.
        ops: usize,
        /// Panic payload, when it was a string.
        message: String,
    },
}

impl CycleError {
    /// Cycle in which the error happened.
    pub const fn cycle(&self) -> u64 {
        match self {
            Self::Apply { cycle, .. }
            | Self::ApplyTimeout { cycle, .. }
            | Self::Panicked { cycle, .. } => *cycle,
        }
    }
}

/// Synchronous rejection of a submitted operation.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// The pending buffer already holds its configured maximum.
    #[error("Pending buffer is full ({capacity} ops)")]
    BufferFull {
        /// Configured maximum.
        capacity: usize,
    },

    /// The reloader has been shut down.
    #[error("Reloader has been shut down")]
    Stopped,
}

/// Errors raised while starting or stopping a reloader.
#[derive(thiserror::Error, Debug)]
pub enum ReloaderError {
    /// No Tokio runtime is available to host the background task.
    #[error("A Tokio runtime is required to start a reloader")]
    NoRuntime,

    /// A builder setting is out of range.
    #[error("Invalid reloader settings: {0}")]
    InvalidSettings(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The background task did not stop in time and was aborted.
    #[error("Reloader did not stop within {0:?}")]
    ShutdownTimeout(Duration),

    /// The background task panicked or was cancelled.
    #[error("Reloader task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type for reloader lifecycle operations.
pub type ReloaderResult<T> = Result<T, ReloaderError>;
