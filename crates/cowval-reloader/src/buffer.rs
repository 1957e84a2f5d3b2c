//! Pending-modification buffer shared by submitters and the refresh cycle.

use crate::error::SubmitError;
use parking_lot::Mutex;

struct Inner<T> {
    ops: Vec<T>,
    closed: bool,
}

/// Operations waiting for the next refresh cycle.
///
/// A single mutex guards the queue. It is held only for one append or one
/// swap-to-empty, never while caller code runs.
pub struct PendingBuffer<T> {
    inner: Mutex<Inner<T>>,
    capacity: Option<usize>,
}

impl<T> PendingBuffer<T> {
    /// Creates a buffer with no size limit.
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// Creates a buffer holding at most `capacity` operations between flushes.
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity))
    }

    pub(crate) fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                ops: Vec::new(),
                closed: false,
            }),
            capacity,
        }
    }

    /// Queues `op` for the next flush.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::BufferFull`] when a capacity is set and reached,
    /// and [`SubmitError::Stopped`] once the buffer is closed. An unbounded
    /// open buffer always accepts.
    pub fn add(&self, op: T) -> Result<(), SubmitError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(SubmitError::Stopped);
        }
        if let Some(capacity) = self.capacity {
            if inner.ops.len() >= capacity {
                return Err(SubmitError::BufferFull { capacity });
            }
        }
        inner.ops.push(op);
        Ok(())
    }

    /// Removes and returns every queued operation in insertion order.
    pub fn flush(&self) -> Vec<T> {
        std::mem::take(&mut self.inner.lock().ops)
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.inner.lock().ops.len()
    }

    /// Whether no operations are queued.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().ops.is_empty()
    }

    /// Configured capacity, if any.
    pub const fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Rejects further additions. Queued operations stay until flushed.
    pub fn close(&self) {
        self.inner.lock().closed = true;
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl<T> Default for PendingBuffer<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_flush_empties_buffer() {
        let buffer = PendingBuffer::unbounded();
        buffer.add(1).unwrap();
        buffer.add(2).unwrap();

        assert_eq!(buffer.flush(), vec![1, 2]);
        assert!(buffer.is_empty());
        assert!(buffer.flush().is_empty());
    }

    #[test]
    fn test_bounded_buffer_rejects_when_full() {
        let buffer = PendingBuffer::bounded(2);
        buffer.add('a').unwrap();
        buffer.add('b').unwrap();

        assert_eq!(
            buffer.add('c'),
            Err(SubmitError::BufferFull { capacity: 2 })
        );

        buffer.flush();
        assert!(buffer.add('c').is_ok());
    }

    #[test]
    fn test_closed_buffer_keeps_queued_ops() {
        let buffer = PendingBuffer::unbounded();
        buffer.add(7).unwrap();
        buffer.close();

        assert!(buffer.is_closed());
        assert_eq!(buffer.add(8), Err(SubmitError::Stopped));
        assert_eq!(buffer.flush(), vec![7]);
    }

    #[test]
    fn test_concurrent_add_and_flush_lose_nothing() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 1_000;

        let buffer = Arc::new(PendingBuffer::unbounded());
        let writers: Vec<_> = (0..THREADS)
            .map(|t| {
                let buffer = Arc::clone(&buffer);
                thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        buffer.add(t * PER_THREAD + i).unwrap();
                    }
                })
            })
            .collect();

        let mut seen = Vec::new();
        while writers.iter().any(|w| !w.is_finished()) {
            seen.extend(buffer.flush());
            thread::yield_now();
        }
        for writer in writers {
            writer.join().unwrap();
        }
        seen.extend(buffer.flush());

        seen.sort_unstable();
        let expected: Vec<usize> = (0..THREADS * PER_THREAD).collect();
        assert_eq!(seen, expected);
    }

    proptest! {
        #[test]
        fn test_flushes_partition_additions(steps in prop::collection::vec(any::<Option<u16>>(), 0..200)) {
            // `Some(v)` adds v, `None` flushes.
            let buffer = PendingBuffer::unbounded();
            let mut added = Vec::new();
            let mut flushed = Vec::new();
            for step in steps {
                match step {
                    Some(v) => {
                        buffer.add(v).unwrap();
                        added.push(v);
                    }
                    None => flushed.extend(buffer.flush()),
                }
            }
            flushed.extend(buffer.flush());
            prop_assert_eq!(flushed, added);
        }
    }
}
