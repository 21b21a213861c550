use std::collections::VecDeque;

/// A bounded FIFO of owned values.
///
/// A capacity-checked [`VecDeque`] gives the same bounded-FIFO semantics a
/// pointer ring buffer would, without the pointer-width bookkeeping.
#[derive(Debug, Clone)]
pub struct BoundedQueue<T> {
    buf: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self { buf: VecDeque::with_capacity(capacity), capacity }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() >= self.capacity
    }

    pub fn has_space(&self) -> bool {
        !self.is_full()
    }

    /// Enqueues `item`. Returns `item` back to the caller if the queue is
    /// full rather than silently dropping it — callers on the hot path are
    /// expected to check [`BoundedQueue::has_space`] before calling this so
    /// that the `Err` branch is never actually taken.
    pub fn enqueue(&mut self, item: T) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }
        self.buf.push_back(item);
        Ok(())
    }

    pub fn dequeue(&mut self) -> Option<T> {
        self.buf.pop_front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buf.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.buf.iter_mut()
    }

    /// Moves entries from `src` into `self` while `self` still has room and
    /// `src` still has entries. Returns the number of entries moved.
    pub fn transfer(&mut self, src: &mut Self) -> usize {
        let mut moved = 0;
        while self.has_space() {
            let Some(item) = src.dequeue() else { break };
            // has_space() was just checked, so this cannot fail.
            let pushed = self.enqueue(item);
            debug_assert!(pushed.is_ok());
            moved += 1;
        }
        moved
    }
}
