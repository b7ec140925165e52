#![forbid(unsafe_code)]

use std::collections::VecDeque;

/// FIFO buffer of `(value, size)` pairs with a running total size.
///
/// Used internally by the stream controller as its chunk buffer. The
/// recorded size of each value is whatever the configured queuing
/// strategy reported at enqueue time; the queue itself does not
/// interpret sizes beyond summing them.
///
/// Invariant: `total_size()` equals the sum of the recorded sizes of
/// all buffered values.
#[derive(Debug)]
pub struct SizeQueue<T> {
    queue: VecDeque<(T, u64)>,
    total_size: u64,
}

impl<T> SizeQueue<T> {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            total_size: 0,
        }
    }

    /// Append a value with its recorded size.
    pub fn enqueue(&mut self, value: T, size: u64) {
        self.queue.push_back((value, size));
        self.total_size += size;
    }

    /// Remove and return the oldest value, or `None` if the queue is
    /// empty.
    pub fn dequeue(&mut self) -> Option<T> {
        let (value, size) = self.queue.pop_front()?;
        self.total_size -= size;
        Some(value)
    }

    /// Borrow the oldest value without removing it.
    pub fn peek(&self) -> Option<&T> {
        self.queue.front().map(|(value, _)| value)
    }

    /// Empty the queue, resetting length and total size to zero.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.total_size = 0;
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }
}

impl<T> Default for SizeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
