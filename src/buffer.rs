//! Fixed-capacity event ring
//!
//! Each buffer keeps the positions of one event kind in the order they were
//! produced. When full, a push silently overwrites the oldest entry: the poll
//! model favours keeping the newest events over completeness, and callers
//! that must not lose events should poll more often or use listeners.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use log::trace;

use crate::event::GridPosition;

pub struct EventBuffer {
    capacity: usize,
    entries: Mutex<VecDeque<GridPosition>>,
}

impl EventBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of unconsumed entries
    pub fn available(&self) -> usize {
        self.lock().len()
    }

    /// Oldest unconsumed entry, left in place
    pub fn peek(&self) -> Option<GridPosition> {
        self.lock().front().copied()
    }

    /// Discard the oldest entry. Returns `false` if there was none.
    pub fn pop(&self) -> bool {
        self.lock().pop_front().is_some()
    }

    /// Append an entry, returning the one it displaced when full
    pub fn push(&self, position: GridPosition) -> Option<GridPosition> {
        let mut entries = self.lock();
        let displaced = if entries.len() >= self.capacity {
            entries.pop_front()
        } else {
            None
        };
        entries.push_back(position);

        if let Some(old) = displaced {
            trace!("buffer full, {} overwritten", old);
        }
        displaced
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<GridPosition>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(buffer: &EventBuffer, count: u8) {
        for i in 0..count {
            buffer.push(GridPosition::new(i / 4, i % 4));
        }
    }

    fn drain(buffer: &EventBuffer) -> Vec<GridPosition> {
        let mut out = Vec::new();
        while let Some(p) = buffer.peek() {
            out.push(p);
            assert!(buffer.pop());
        }
        out
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = EventBuffer::new(4);
        assert_eq!(buffer.available(), 0);
        assert_eq!(buffer.peek(), None);
        assert!(!buffer.pop());
    }

    #[test]
    fn test_fifo_within_capacity() {
        let buffer = EventBuffer::new(16);
        fill(&buffer, 16);
        assert_eq!(buffer.available(), 16);

        let expected: Vec<_> = (0..16u8).map(|i| GridPosition::new(i / 4, i % 4)).collect();
        assert_eq!(drain(&buffer), expected);
        assert_eq!(buffer.available(), 0);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let buffer = EventBuffer::new(2);
        buffer.push(GridPosition::new(1, 2));
        assert_eq!(buffer.peek(), Some(GridPosition::new(1, 2)));
        assert_eq!(buffer.peek(), Some(GridPosition::new(1, 2)));
        assert_eq!(buffer.available(), 1);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let buffer = EventBuffer::new(16);
        fill(&buffer, 16);
        let displaced = buffer.push(GridPosition::new(3, 3));
        assert_eq!(displaced, Some(GridPosition::new(0, 0)));
        assert_eq!(buffer.available(), 16);

        let drained = drain(&buffer);
        assert_eq!(drained.len(), 16);
        assert_eq!(drained[0], GridPosition::new(0, 1));
        assert_eq!(drained[15], GridPosition::new(3, 3));
        assert!(!drained[..15].contains(&GridPosition::new(0, 0)));
    }
}
