//! Test utilities and shared fixtures for the cowval workspace.
//!
//! The fixture values here implement [`Value`] over a plain integer list so
//! reloader behavior can be asserted on simple, ordered data.

use crate::{Op, Operation, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

#[cfg(feature = "tracing-subscriber")]
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize test logging once per test run.
static INIT: Once = Once::new();

/// Initialize logging for tests with a sensible default configuration.
/// This function is safe to call multiple times and will only initialize once.
#[cfg(feature = "tracing-subscriber")]
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

        fmt().with_test_writer().with_env_filter(filter).init();
    });
}

/// No-op version when tracing-subscriber is not available
#[cfg(not(feature = "tracing-subscriber"))]
pub fn init_test_logging() {
    INIT.call_once(|| {});
}

/// Operation kind rejected by every fixture value.
pub const BAD_KIND: &str = "bad";

/// Operation kind that makes [`PanickyList`] panic inside `apply`.
pub const PANIC_KIND: &str = "panic";

/// Error raised by fixture values.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FixtureError {
    /// Some operations in the batch were rejected.
    #[error("rejected {count} of {total} operations")]
    Rejected {
        /// Number of rejected operations.
        count: usize,
        /// Size of the batch.
        total: usize,
    },
}

/// Pushes every accepted op onto `items` and returns an error for the rejected ones.
///
/// Rejected ops are skipped, the rest of the batch is still applied.
fn push_all(items: &mut Vec<i64>, ops: Vec<Op<i64>>) -> Result<(), FixtureError> {
    let total = ops.len();
    let mut count = 0;
    for op in ops {
        if op.kind() == BAD_KIND {
            count += 1;
            continue;
        }
        items.push(op.into_context());
    }
    if count == 0 {
        Ok(())
    } else {
        Err(FixtureError::Rejected { count, total })
    }
}

/// An integer list value. Ops of kind [`BAD_KIND`] are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntList {
    /// Current items, in application order.
    pub items: Vec<i64>,
}

impl IntList {
    /// Creates a list holding `items`.
    pub fn new(items: Vec<i64>) -> Self {
        Self { items }
    }

    /// Items sorted ascending, for order-insensitive assertions.
    pub fn sorted(&self) -> Vec<i64> {
        sorted(&self.items)
    }
}

fn sorted(items: &[i64]) -> Vec<i64> {
    let mut items = items.to_vec();
    items.sort_unstable();
    items
}

impl Value for IntList {
    type Op = Op<i64>;
    type Error = FixtureError;

    fn copy(&self) -> Self {
        self.clone()
    }

    fn apply(&mut self, ops: Vec<Op<i64>>) -> Result<(), FixtureError> {
        push_all(&mut self.items, ops)
    }
}

/// Shared counters recording how many `apply` calls run at the same time.
#[derive(Debug, Clone, Default)]
pub struct ApplyTracker {
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl ApplyTracker {
    /// Highest number of concurrent `apply` calls observed.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Total number of `apply` calls started.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An integer list whose `apply` sleeps for a fixed delay.
///
/// The tracker is shared between copies on purpose: it observes the
/// reloader, it is not part of the value's data.
#[derive(Debug, Clone)]
pub struct SlowList {
    /// Current items.
    pub items: Vec<i64>,
    delay: Duration,
    tracker: ApplyTracker,
}

impl SlowList {
    /// Creates an empty list whose `apply` takes `delay`.
    pub fn new(delay: Duration) -> Self {
        Self {
            items: Vec::new(),
            delay,
            tracker: ApplyTracker::default(),
        }
    }

    /// Tracker shared by this list and all its copies.
    pub fn tracker(&self) -> ApplyTracker {
        self.tracker.clone()
    }

    /// Items sorted ascending.
    pub fn sorted(&self) -> Vec<i64> {
        sorted(&self.items)
    }
}

impl Value for SlowList {
    type Op = Op<i64>;
    type Error = FixtureError;

    fn copy(&self) -> Self {
        self.clone()
    }

    fn apply(&mut self, ops: Vec<Op<i64>>) -> Result<(), FixtureError> {
        self.tracker.enter();
        std::thread::sleep(self.delay);
        let result = push_all(&mut self.items, ops);
        self.tracker.exit();
        result
    }
}

/// An integer list that panics when it sees an op of kind [`PANIC_KIND`].
#[derive(Debug, Clone, Default)]
pub struct PanickyList {
    /// Current items.
    pub items: Vec<i64>,
}

impl Value for PanickyList {
    type Op = Op<i64>;
    type Error = FixtureError;

    fn copy(&self) -> Self {
        self.clone()
    }

    fn apply(&mut self, ops: Vec<Op<i64>>) -> Result<(), FixtureError> {
        assert!(
            ops.iter().all(|op| op.kind() != PANIC_KIND),
            "fixture asked to panic"
        );
        push_all(&mut self.items, ops)
    }
}

/// Builds `push` ops for each value.
pub fn push_ops(values: impl IntoIterator<Item = i64>) -> Vec<Op<i64>> {
    values.into_iter().map(|v| Op::new("push", v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_multiple_calls() {
        // Should not panic when called multiple times
        init_test_logging();
        init_test_logging();
        init_test_logging();
    }

    #[test]
    fn test_int_list_applies_good_ops_and_rejects_bad() {
        let mut list = IntList::default();
        let result = list.apply(vec![Op::new(BAD_KIND, 9), Op::new("good", 1)]);
        assert_eq!(result, Err(FixtureError::Rejected { count: 1, total: 2 }));
        assert_eq!(list.items, vec![1]);
    }

    #[test]
    fn test_int_list_copy_is_independent() {
        let original = IntList::new(vec![1, 2]);
        let mut copy = original.copy();
        copy.apply(push_ops([3])).unwrap();
        assert_eq!(original.items, vec![1, 2]);
        assert_eq!(copy.items, vec![1, 2, 3]);
    }

    #[test]
    fn test_slow_list_tracks_calls() {
        let mut list = SlowList::new(Duration::from_millis(1));
        let tracker = list.tracker();
        list.apply(push_ops([2, 1])).unwrap();
        assert_eq!(list.sorted(), vec![1, 2]);
        assert_eq!(tracker.calls(), 1);
        assert_eq!(tracker.max_active(), 1);
    }

    #[test]
    #[should_panic(expected = "fixture asked to panic")]
    fn test_panicky_list_panics() {
        let mut list = PanickyList::default();
        let _ = list.apply(vec![Op::new(PANIC_KIND, 0)]);
    }
}
