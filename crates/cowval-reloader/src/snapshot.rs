//! Lock-free publication of the current snapshot using arc-swap.

use arc_swap::ArcSwap;
use std::sync::Arc;

/// Single-writer, many-reader cell holding the current snapshot.
pub struct SnapshotCell<V> {
    current: ArcSwap<V>,
}

impl<V> SnapshotCell<V> {
    /// Creates a cell publishing `value`.
    pub fn new(value: V) -> Self {
        Self {
            current: ArcSwap::from_pointee(value),
        }
    }

    /// Gets the current snapshot.
    pub fn load(&self) -> Arc<V> {
        self.current.load_full()
    }

    /// Publishes `value` atomically, replacing the current snapshot.
    pub fn publish(&self, value: V) {
        self.current.store(Arc::new(value));
    }
}

impl<V: Default> Default for SnapshotCell<V> {
    fn default() -> Self {
        Self::new(V::default())
    }
}
