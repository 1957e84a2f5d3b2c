//! One drain-copy-apply-publish refresh cycle.

use crate::buffer::PendingBuffer;
use crate::error::CycleError;
use crate::snapshot::SnapshotCell;
use chrono::{DateTime, Utc};
use cowval_common::Value;
use std::any::Any;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No cycle has run yet; the initial value is current.
    Initial,
    /// The buffer was empty; nothing was copied or published.
    Idle,
    /// The batch applied cleanly and the copy was published.
    Applied,
    /// `apply` failed; the partially applied copy was published.
    ApplyFailed,
    /// Copy and apply exceeded the timeout; nothing was published.
    TimedOut,
    /// Copy or apply panicked; nothing was published.
    Panicked,
    /// A timed-out apply was still running, so nothing was drained.
    Stalled,
}

/// Summary of the most recent cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Cycle number, starting at 1. Zero before the first cycle.
    pub cycle: u64,
    /// Number of operations drained.
    pub ops: usize,
    /// How the cycle ended.
    pub outcome: CycleOutcome,
    /// Whether a new snapshot was published.
    pub published: bool,
    /// Wall time spent in the cycle.
    pub elapsed: Duration,
    /// When the cycle finished.
    pub completed_at: DateTime<Utc>,
}

impl CycleReport {
    pub(crate) fn initial() -> Self {
        Self {
            cycle: 0,
            ops: 0,
            outcome: CycleOutcome::Initial,
            published: true,
            elapsed: Duration::ZERO,
            completed_at: Utc::now(),
        }
    }
}

/// State shared between the reloader handle and its background task.
pub(crate) struct Shared<V: Value> {
    pub(crate) snapshot: SnapshotCell<V>,
    pub(crate) pending: PendingBuffer<V::Op>,
    pub(crate) running: AtomicBool,
}

/// Result of one copy-and-apply on the blocking pool.
type Work<V> = (V, Result<(), <V as Value>::Error>);

/// Runs refresh cycles. Owned by the background task, so cycles never overlap.
pub(crate) struct CycleRunner<V: Value> {
    pub(crate) shared: Arc<Shared<V>>,
    pub(crate) apply_timeout: Option<Duration>,
    pub(crate) errors: broadcast::Sender<Arc<CycleError>>,
    pub(crate) reports: watch::Sender<CycleReport>,
    pub(crate) batches: watch::Sender<CycleReport>,
    pub(crate) cycle: u64,
    /// Worker of a timed-out cycle that has not returned yet.
    pub(crate) straggler: Option<JoinHandle<Work<V>>>,
}

impl<V: Value> CycleRunner<V> {
    pub(crate) fn new(
        shared: Arc<Shared<V>>,
        apply_timeout: Option<Duration>,
        errors: broadcast::Sender<Arc<CycleError>>,
        reports: watch::Sender<CycleReport>,
        batches: watch::Sender<CycleReport>,
    ) -> Self {
        Self {
            shared,
            apply_timeout,
            errors,
            reports,
            batches,
            cycle: 0,
            straggler: None,
        }
    }

    pub(crate) async fn run_cycle(&mut self) {
        self.cycle += 1;
        let cycle = self.cycle;
        let started = Instant::now();

        if self.straggler.as_ref().is_some_and(|w| !w.is_finished()) {
            // Pending ops stay buffered until the late worker returns.
            debug!("Cycle {} skipped: a timed-out apply is still running", cycle);
            self.report(cycle, 0, CycleOutcome::Stalled, false, started);
            return;
        }
        if self.straggler.take().is_some() {
            debug!("Discarded late result of a timed-out apply");
        }

        let batch = self.shared.pending.flush();
        let ops = batch.len();
        if ops == 0 {
            self.report(cycle, 0, CycleOutcome::Idle, false, started);
            return;
        }

        let current = self.shared.snapshot.load();
        let mut work = tokio::task::spawn_blocking(move || {
            let mut next = current.copy();
            let result = next.apply(batch);
            (next, result)
        });

        let joined = match self.apply_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut work).await {
                Ok(joined) => joined,
                Err(_) => {
                    self.straggler = Some(work);
                    self.raise(CycleError::ApplyTimeout {
                        cycle,
                        ops,
                        timeout: limit,
                    });
                    self.report(cycle, ops, CycleOutcome::TimedOut, false, started);
                    return;
                }
            },
            None => work.await,
        };

        let outcome = match joined {
            Ok((next, Ok(()))) => {
                self.shared.snapshot.publish(next);
                CycleOutcome::Applied
            }
            Ok((next, Err(source))) => {
                self.shared.snapshot.publish(next);
                self.raise(CycleError::Apply {
                    cycle,
                    ops,
                    source: Box::new(source),
                });
                CycleOutcome::ApplyFailed
            }
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    panic_message(join_error.into_panic())
                } else {
                    "worker cancelled".to_string()
                };
                self.raise(CycleError::Panicked {
                    cycle,
                    ops,
                    message,
                });
                CycleOutcome::Panicked
            }
        };

        let published = matches!(outcome, CycleOutcome::Applied | CycleOutcome::ApplyFailed);
        self.report(cycle, ops, outcome, published, started);
    }

    /// Waits for the worker of a timed-out cycle and drops its result.
    pub(crate) async fn settle(&mut self) {
        if let Some(straggler) = self.straggler.take() {
            debug!("Waiting for a timed-out apply to return");
            // Its result was already given up on.
            let _ = straggler.await;
        }
    }

    fn raise(&self, failure: CycleError) {
        match &failure {
            CycleError::Apply { .. } => warn!("{}", failure),
            CycleError::ApplyTimeout { .. } | CycleError::Panicked { .. } => {
                error!("{}", failure);
            }
        }
        // Fails only once the handle and every error stream are gone; the
        // error has been logged either way.
        let _ = self.errors.send(Arc::new(failure));
    }

    fn report(
        &self,
        cycle: u64,
        ops: usize,
        outcome: CycleOutcome,
        published: bool,
        started: Instant,
    ) {
        let elapsed = started.elapsed();
        let report = CycleReport {
            cycle,
            ops,
            outcome,
            published,
            elapsed,
            completed_at: Utc::now(),
        };
        if ops > 0 {
            debug!(
                "Cycle {} finished: {:?}, {} ops in {:?}",
                cycle, outcome, ops, elapsed
            );
            self.batches.send_replace(report.clone());
        }
        self.reports.send_replace(report);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cowval_common::test_utils::{push_ops, IntList, SlowList, BAD_KIND};
    use cowval_common::Op;

    fn runner_for<V: Value>(
        initial: V,
        apply_timeout: Option<Duration>,
    ) -> (
        CycleRunner<V>,
        broadcast::Receiver<Arc<CycleError>>,
        watch::Receiver<CycleReport>,
    ) {
        let (errors, errors_rx) = broadcast::channel(8);
        let (reports, reports_rx) = watch::channel(CycleReport::initial());
        let (batches, _) = watch::channel(CycleReport::initial());
        let shared = Arc::new(Shared {
            snapshot: SnapshotCell::new(initial),
            pending: PendingBuffer::unbounded(),
            running: AtomicBool::new(true),
        });
        let runner = CycleRunner::new(shared, apply_timeout, errors, reports, batches);
        (runner, errors_rx, reports_rx)
    }

    fn runner(
        initial: IntList,
    ) -> (
        CycleRunner<IntList>,
        broadcast::Receiver<Arc<CycleError>>,
        watch::Receiver<CycleReport>,
    ) {
        runner_for(initial, None)
    }

    #[tokio::test]
    async fn test_idle_cycle_publishes_nothing() {
        let (mut runner, _errors, reports) = runner(IntList::default());
        let before = runner.shared.snapshot.load();

        runner.run_cycle().await;

        assert!(Arc::ptr_eq(&before, &runner.shared.snapshot.load()));
        let report = reports.borrow().clone();
        assert_eq!(report.cycle, 1);
        assert_eq!(report.outcome, CycleOutcome::Idle);
        assert!(!report.published);
    }

    #[tokio::test]
    async fn test_cycle_applies_batch_to_copy() {
        let (mut runner, _errors, reports) = runner(IntList::new(vec![1]));
        let before = runner.shared.snapshot.load();
        for op in push_ops([2, 3]) {
            runner.shared.pending.add(op).unwrap();
        }

        runner.run_cycle().await;

        assert_eq!(before.items, vec![1]);
        assert_eq!(runner.shared.snapshot.load().items, vec![1, 2, 3]);
        assert!(runner.shared.pending.is_empty());
        assert_eq!(reports.borrow().outcome, CycleOutcome::Applied);
        assert_eq!(reports.borrow().ops, 2);
    }

    #[tokio::test]
    async fn test_failed_apply_still_publishes() {
        let (mut runner, mut errors, reports) = runner(IntList::default());
        runner.shared.pending.add(Op::new(BAD_KIND, 1)).unwrap();
        runner.shared.pending.add(Op::new("good", 2)).unwrap();

        runner.run_cycle().await;

        assert_eq!(runner.shared.snapshot.load().items, vec![2]);
        let failure = errors.try_recv().unwrap();
        assert!(matches!(*failure, CycleError::Apply { cycle: 1, ops: 2, .. }));
        assert!(errors.try_recv().is_err());
        assert_eq!(reports.borrow().outcome, CycleOutcome::ApplyFailed);
        assert!(reports.borrow().published);
    }

    #[tokio::test]
    async fn test_idle_cycle_keeps_last_batch_report() {
        let (mut runner, _errors, reports) = runner(IntList::default());
        let batches = runner.batches.subscribe();
        runner.shared.pending.add(Op::new("push", 1)).unwrap();

        runner.run_cycle().await;
        runner.run_cycle().await;

        assert_eq!(reports.borrow().outcome, CycleOutcome::Idle);
        assert_eq!(reports.borrow().cycle, 2);
        let batch = batches.borrow().clone();
        assert_eq!(batch.cycle, 1);
        assert_eq!(batch.outcome, CycleOutcome::Applied);
        assert_eq!(batch.ops, 1);
    }

    #[tokio::test]
    async fn test_timed_out_worker_blocks_next_apply() {
        let value = SlowList::new(Duration::from_millis(150));
        let tracker = value.tracker();
        let (mut runner, _errors, reports) =
            runner_for(value, Some(Duration::from_millis(20)));

        runner.shared.pending.add(Op::new("push", 1)).unwrap();
        runner.run_cycle().await;
        assert_eq!(reports.borrow().outcome, CycleOutcome::TimedOut);

        runner.shared.pending.add(Op::new("push", 2)).unwrap();
        runner.run_cycle().await;
        assert_eq!(reports.borrow().outcome, CycleOutcome::Stalled);
        assert_eq!(runner.shared.pending.len(), 1);
        assert_eq!(tracker.calls(), 1);

        runner.settle().await;
        assert!(runner.straggler.is_none());
        assert_eq!(tracker.max_active(), 1);
        assert!(runner.shared.snapshot.load().items.is_empty());
    }

    #[tokio::test]
    async fn test_errors_without_receivers_do_not_stop_cycles() {
        let (mut runner, errors, reports) = runner(IntList::default());
        drop(errors);
        runner.shared.pending.add(Op::new(BAD_KIND, 1)).unwrap();
        runner.shared.pending.add(Op::new("good", 2)).unwrap();

        runner.run_cycle().await;

        assert_eq!(reports.borrow().outcome, CycleOutcome::ApplyFailed);
        assert_eq!(runner.shared.snapshot.load().items, vec![2]);
    }

    #[test]
    fn test_panic_message_extraction() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(5_u8)), "non-string panic payload");
    }
}
