//! Reloader handle, builder and the background refresh task.

use crate::buffer::PendingBuffer;
use crate::cycle::{CycleReport, CycleRunner, Shared};
use crate::error::{CycleError, ReloaderError, ReloaderResult, SubmitError};
use crate::snapshot::SnapshotCell;
use crate::stream::ErrorStream;
use cowval_common::Value;
use cowval_config::{ReloaderConfig, MAX_ERROR_CAPACITY, MAX_REFRESH_INTERVAL_SECS};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// A value refreshed periodically by copy-on-write.
///
/// Dropping the last handle stops the background task after its current
/// cycle; use [`shutdown`](Self::shutdown) to wait for it.
pub struct Reloader<V: Value> {
    shared: Arc<Shared<V>>,
    errors: broadcast::Receiver<Arc<CycleError>>,
    reports: watch::Receiver<CycleReport>,
    batches: watch::Receiver<CycleReport>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown_timeout: Duration,
}

impl<V: Value> Reloader<V> {
    /// Starts a reloader for `initial`, refreshed every `period`.
    ///
    /// The first cycle runs one full period after this call.
    ///
    /// # Errors
    ///
    /// Fails outside a Tokio runtime or for a zero or over-long `period`.
    pub fn new(initial: V, period: Duration) -> ReloaderResult<Self> {
        Self::builder(initial).period(period).spawn()
    }

    /// Starts a reloader configured by `config`.
    ///
    /// # Errors
    ///
    /// Fails when `config` is invalid or outside a Tokio runtime.
    pub fn from_config(initial: V, config: &ReloaderConfig) -> ReloaderResult<Self> {
        config.validate()?;
        Self::builder(initial).with_config(config).spawn()
    }

    /// Returns a builder with default settings.
    pub fn builder(initial: V) -> ReloaderBuilder<V> {
        ReloaderBuilder::new(initial)
    }

    /// Returns the current snapshot.
    ///
    /// Never blocks. Operations accepted since the last cycle are not included.
    pub fn reload(&self) -> Arc<V> {
        self.shared.snapshot.load()
    }

    /// Queues `op` for the next cycle and returns immediately.
    ///
    /// Failures while applying `op` are reported on [`errors`](Self::errors),
    /// never here.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::BufferFull`] when `max_pending` is set and
    /// reached, and [`SubmitError::Stopped`] after shutdown.
    pub fn accept(&self, op: V::Op) -> Result<(), SubmitError> {
        self.shared.pending.add(op)
    }

    /// Subscribes to errors raised by cycles from now on.
    pub fn errors(&self) -> ErrorStream {
        ErrorStream::new(self.errors.resubscribe())
    }

    /// Watches the report of the most recent cycle.
    pub fn cycle_reports(&self) -> watch::Receiver<CycleReport> {
        self.reports.clone()
    }

    /// Report of the most recent cycle.
    pub fn last_report(&self) -> CycleReport {
        self.reports.borrow().clone()
    }

    /// Watches the report of the most recent cycle that drained operations.
    ///
    /// Idle and stalled cycles do not update it.
    pub fn batch_reports(&self) -> watch::Receiver<CycleReport> {
        self.batches.clone()
    }

    /// Report of the most recent cycle that drained operations.
    pub fn last_batch(&self) -> CycleReport {
        self.batches.borrow().clone()
    }

    /// Number of operations waiting for the next cycle.
    pub fn pending_len(&self) -> usize {
        self.shared.pending.len()
    }

    /// Whether the background task is still running.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Stops the background task gracefully.
    ///
    /// New submissions are rejected immediately. The task stops between
    /// cycles, runs a final cycle for pending operations when
    /// `drain_on_shutdown` is set, and is aborted if it does not finish
    /// within the shutdown timeout. Calling this again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ReloaderError::ShutdownTimeout`] if the task had to be
    /// aborted and [`ReloaderError::Join`] if it panicked.
    pub async fn shutdown(&self) -> ReloaderResult<()> {
        let shutdown_tx = self.shutdown_tx.lock().take();
        let Some(shutdown_tx) = shutdown_tx else {
            debug!("Reloader already shut down");
            return Ok(());
        };

        info!("Shutting down reloader");
        self.shared.pending.close();
        // Ignore if the task already exited
        let _ = shutdown_tx.send(());

        let worker = self.worker.lock().take();
        if let Some(mut worker) = worker {
            match time::timeout(self.shutdown_timeout, &mut worker).await {
                Ok(joined) => joined?,
                Err(_) => {
                    warn!(
                        "Reloader task did not stop within {:?}, aborting",
                        self.shutdown_timeout
                    );
                    worker.abort();
                    self.shared.running.store(false, Ordering::Release);
                    return Err(ReloaderError::ShutdownTimeout(self.shutdown_timeout));
                }
            }
        }

        info!("Reloader shut down");
        Ok(())
    }
}

/// Builder for [`Reloader`].
pub struct ReloaderBuilder<V: Value> {
    initial: V,
    period: Duration,
    error_capacity: usize,
    apply_timeout: Option<Duration>,
    max_pending: Option<usize>,
    drain_on_shutdown: bool,
    shutdown_timeout: Duration,
}

impl<V: Value> ReloaderBuilder<V> {
    /// Creates a builder with the defaults of [`ReloaderConfig`].
    pub fn new(initial: V) -> Self {
        let defaults = ReloaderConfig::default();
        Self {
            initial,
            period: defaults.refresh_interval(),
            error_capacity: defaults.error_capacity,
            apply_timeout: defaults.apply_timeout(),
            max_pending: defaults.max_pending,
            drain_on_shutdown: defaults.drain_on_shutdown,
            shutdown_timeout: defaults.shutdown_timeout(),
        }
    }

    /// Takes every setting from `config`.
    pub fn with_config(mut self, config: &ReloaderConfig) -> Self {
        self.period = config.refresh_interval();
        self.error_capacity = config.error_capacity;
        self.apply_timeout = config.apply_timeout();
        self.max_pending = config.max_pending;
        self.drain_on_shutdown = config.drain_on_shutdown;
        self.shutdown_timeout = config.shutdown_timeout();
        self
    }

    /// Sets the refresh period.
    pub fn period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Sets how many undelivered errors each error stream keeps.
    pub fn error_capacity(mut self, capacity: usize) -> Self {
        self.error_capacity = capacity;
        self
    }

    /// Bounds the time one cycle may spend in copy and apply.
    pub fn apply_timeout(mut self, timeout: Duration) -> Self {
        self.apply_timeout = Some(timeout);
        self
    }

    /// Limits how many operations may wait for the next cycle.
    pub fn max_pending(mut self, max: usize) -> Self {
        self.max_pending = Some(max);
        self
    }

    /// Whether shutdown runs one last cycle for pending operations.
    pub fn drain_on_shutdown(mut self, drain: bool) -> Self {
        self.drain_on_shutdown = drain;
        self
    }

    /// Sets how long shutdown waits for the background task.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    fn check(&self) -> ReloaderResult<()> {
        let problem = if self.period.is_zero() {
            Some("refresh period must be non-zero".to_string())
        } else if self.period > Duration::from_secs(MAX_REFRESH_INTERVAL_SECS) {
            Some(format!(
                "refresh period must not exceed {MAX_REFRESH_INTERVAL_SECS}s"
            ))
        } else if self.error_capacity == 0 || self.error_capacity > MAX_ERROR_CAPACITY {
            Some(format!(
                "error capacity must be between 1 and {MAX_ERROR_CAPACITY}"
            ))
        } else if self.apply_timeout.is_some_and(|t| t.is_zero()) {
            Some("apply timeout must be non-zero".to_string())
        } else if self.max_pending == Some(0) {
            Some("max pending must be at least 1".to_string())
        } else if self.shutdown_timeout.is_zero() {
            Some("shutdown timeout must be non-zero".to_string())
        } else {
            None
        };
        problem.map_or(Ok(()), |p| Err(ReloaderError::InvalidSettings(p)))
    }

    /// Starts the background task on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ReloaderError::InvalidSettings`] for out-of-range settings
    /// and [`ReloaderError::NoRuntime`] outside a Tokio runtime.
    pub fn spawn(self) -> ReloaderResult<Reloader<V>> {
        self.check()?;
        let runtime = Handle::try_current().map_err(|_| ReloaderError::NoRuntime)?;
        let first_tick = Instant::now().checked_add(self.period).ok_or_else(|| {
            ReloaderError::InvalidSettings("refresh period overflows the clock".to_string())
        })?;

        let shared = Arc::new(Shared {
            snapshot: SnapshotCell::new(self.initial),
            pending: PendingBuffer::with_capacity(self.max_pending),
            running: AtomicBool::new(true),
        });
        let (errors_tx, errors_rx) = broadcast::channel(self.error_capacity);
        let (reports_tx, reports_rx) = watch::channel(CycleReport::initial());
        let (batches_tx, batches_rx) = watch::channel(CycleReport::initial());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let runner = CycleRunner::new(
            Arc::clone(&shared),
            self.apply_timeout,
            errors_tx,
            reports_tx,
            batches_tx,
        );
        let running = RunningGuard {
            shared: Arc::clone(&shared),
        };
        let worker = runtime.spawn(run(
            runner,
            running,
            first_tick,
            self.period,
            shutdown_rx,
            self.drain_on_shutdown,
        ));

        info!(
            "Reloader started: period {:?}, apply timeout {:?}, max pending {:?}",
            self.period, self.apply_timeout, self.max_pending
        );

        Ok(Reloader {
            shared,
            errors: errors_rx,
            reports: reports_rx,
            batches: batches_rx,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            worker: Mutex::new(Some(worker)),
            shutdown_timeout: self.shutdown_timeout,
        })
    }
}

/// Marks the task stopped and rejects new submissions when dropped, also
/// when the task panics or is aborted.
struct RunningGuard<V: Value> {
    shared: Arc<Shared<V>>,
}

impl<V: Value> Drop for RunningGuard<V> {
    fn drop(&mut self) {
        self.shared.pending.close();
        self.shared.running.store(false, Ordering::Release);
    }
}

/// Background task: one cycle per tick until shutdown is signalled or the
/// handle is dropped.
///
/// `_running` lives inside the task future, so it is dropped even when the
/// task is aborted before its first poll.
async fn run<V: Value>(
    mut runner: CycleRunner<V>,
    _running: RunningGuard<V>,
    first_tick: Instant,
    period: Duration,
    mut shutdown: oneshot::Receiver<()>,
    drain_on_shutdown: bool,
) {
    let mut ticker = time::interval_at(first_tick, period);
    // A slow cycle swallows the ticks it overlaps instead of queueing them.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => runner.run_cycle().await,
        }
    }

    runner.shared.pending.close();
    if drain_on_shutdown && !runner.shared.pending.is_empty() {
        runner.settle().await;
        debug!("Draining {} pending ops", runner.shared.pending.len());
        runner.run_cycle().await;
    }
    debug!("Reloader task stopped after {} cycles", runner.cycle);
}
