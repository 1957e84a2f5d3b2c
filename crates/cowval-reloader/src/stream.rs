//! Non-blocking delivery of cycle errors to any number of consumers.

use crate::error::CycleError;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::warn;

/// Errors raised by refresh cycles after this stream was created.
///
/// Each stream buffers a bounded number of undelivered errors. A consumer
/// that falls further behind loses the oldest ones; the refresh cycle never
/// waits for it. Lost errors are counted by [`missed`](Self::missed).
///
/// The stream ends once the reloader's background task has exited and every
/// buffered error has been received.
pub struct ErrorStream {
    inner: broadcast::Receiver<Arc<CycleError>>,
    missed: u64,
}

impl ErrorStream {
    pub(crate) fn new(inner: broadcast::Receiver<Arc<CycleError>>) -> Self {
        Self { inner, missed: 0 }
    }

    /// Waits for the next error. Returns `None` when the reloader has stopped.
    pub async fn recv(&mut self) -> Option<Arc<CycleError>> {
        loop {
            match self.inner.recv().await {
                Ok(error) => return Some(error),
                Err(RecvError::Lagged(skipped)) => self.record_missed(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next buffered error without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<CycleError>> {
        loop {
            match self.inner.try_recv() {
                Ok(error) => return Some(error),
                Err(TryRecvError::Lagged(skipped)) => self.record_missed(skipped),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Number of errors dropped because this consumer fell behind.
    pub const fn missed(&self) -> u64 {
        self.missed
    }

    /// Converts into a [`futures::Stream`] of errors.
    pub fn into_stream(self) -> BoxStream<'static, Arc<CycleError>> {
        stream::unfold(self, |mut errors| async move {
            errors.recv().await.map(|error| (error, errors))
        })
        .boxed()
    }

    fn record_missed(&mut self, skipped: u64) {
        self.missed += skipped;
        warn!(
            "Error stream consumer fell behind, dropped {} errors ({} total)",
            skipped, self.missed
        );
    }
}
