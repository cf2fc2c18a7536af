//! Bounded in-memory buffer with batched eviction
//!
//! All telemetry buffers share this container: fixed capacity, insertion
//! order, and halving eviction on overflow. Appending to a full buffer
//! evicts the oldest half in one step rather than a single item, trading
//! temporal resolution for amortized O(1) appends. A snapshot taken right
//! after an overflow therefore contains the newest half plus the new item.

use parking_lot::Mutex;
use std::collections::VecDeque;

/// Fixed-capacity, insertion-ordered buffer.
///
/// `append`, `snapshot`, and `clear` are serialized under an internal mutex
/// since the evaluator loop, the flush loop, and arbitrary callers all touch
/// the same buffers concurrently. The lock is held only for the duration of
/// the operation, never across I/O.
pub struct BoundedBuffer<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T: Clone> BoundedBuffer<T> {
    /// Create a buffer with the given capacity.
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "buffer capacity must be positive");
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append an item, evicting the oldest `capacity / 2` items first when
    /// the buffer is full. Survivors keep their relative order.
    pub fn append(&self, item: T) {
        let mut items = self.items.lock();
        if items.len() >= self.capacity {
            // Evict at least one so capacity 1 still makes progress.
            let evict = (self.capacity / 2).max(1);
            items.drain(..evict);
        }
        items.push_back(item);
    }

    /// Copy of the current contents, safe to read without holding the lock.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.items.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_snapshot() {
        let buffer = BoundedBuffer::new(4);
        buffer.append(1);
        buffer.append(2);
        buffer.append(3);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.snapshot(), vec![1, 2, 3]);
    }

    #[test]
    fn test_capacity_invariant() {
        let buffer = BoundedBuffer::new(10);
        for i in 0..1000 {
            buffer.append(i);
            assert!(buffer.len() <= 10);
        }
    }

    #[test]
    fn test_halving_eviction_exact() {
        let buffer = BoundedBuffer::new(10);
        for i in 1..=10 {
            buffer.append(i);
        }
        buffer.append(11);
        // Oldest half (1..=5) evicted in one step, survivors keep order.
        assert_eq!(buffer.snapshot(), vec![6, 7, 8, 9, 10, 11]);
        assert_eq!(buffer.len(), 6);
    }

    #[test]
    fn test_capacity_one() {
        let buffer = BoundedBuffer::new(1);
        buffer.append(1);
        buffer.append(2);
        assert_eq!(buffer.snapshot(), vec![2]);
    }

    #[test]
    fn test_odd_capacity_eviction() {
        let buffer = BoundedBuffer::new(5);
        for i in 1..=5 {
            buffer.append(i);
        }
        buffer.append(6);
        // 5 / 2 == 2 evicted
        assert_eq!(buffer.snapshot(), vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_clear() {
        let buffer = BoundedBuffer::new(4);
        buffer.append(1);
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.snapshot(), Vec::<i32>::new());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let buffer = BoundedBuffer::new(4);
        buffer.append(1);
        let snap = buffer.snapshot();
        buffer.append(2);
        assert_eq!(snap, vec![1]);
        assert_eq!(buffer.snapshot(), vec![1, 2]);
    }

    #[test]
    #[should_panic]
    fn test_zero_capacity_panics() {
        let _ = BoundedBuffer::<i32>::new(0);
    }

    #[test]
    fn test_concurrent_appends_stay_bounded() {
        use std::sync::Arc;
        let buffer = Arc::new(BoundedBuffer::new(100));
        let mut handles = Vec::new();
        for t in 0..4 {
            let buffer = Arc::clone(&buffer);
            handles.push(std::thread::spawn(move || {
                for i in 0..10_000 {
                    buffer.append(t * 10_000 + i);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(buffer.len() <= 100);
    }
}
