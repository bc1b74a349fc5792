//! Bounded message history for Uniclip.
//!
//! Both the received-message log and the sent-message log keep only the
//! most recent entries. Pushing onto a full buffer evicts the oldest entry,
//! so memory use stays bounded no matter how long the app runs.

use std::collections::VecDeque;

/// Default number of entries kept per history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 5;

/// FIFO buffer that keeps the newest `capacity` entries.
#[derive(Debug, Clone)]
pub struct HistoryBuffer<T> {
    capacity: usize,
    entries: VecDeque<T>,
}

impl<T> HistoryBuffer<T> {
    /// Create an empty history holding at most `capacity` entries.
    ///
    /// A capacity of zero keeps nothing.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an entry, returning the evicted oldest entry if the buffer was full.
    pub fn push(&mut self, entry: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(entry);
        }
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    /// Up to `amount` most recent entries, oldest first.
    pub fn latest(&self, amount: usize) -> Vec<&T> {
        let skip = self.entries.len().saturating_sub(amount);
        self.entries.iter().skip(skip).collect()
    }

    /// The newest entry matching `predicate`.
    pub fn last_matching<F>(&self, predicate: F) -> Option<&T>
    where
        F: Fn(&T) -> bool,
    {
        self.entries.iter().rev().find(|entry| predicate(entry))
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.entries.iter()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T> Default for HistoryBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===== Basic Operations =====

    #[test]
    fn new_history_is_empty() {
        let history: HistoryBuffer<u32> = HistoryBuffer::new(5);
        assert!(history.is_empty());
        assert_eq!(history.len(), 0);
        assert_eq!(history.capacity(), 5);
    }

    #[test]
    fn push_preserves_order() {
        let mut history = HistoryBuffer::new(5);
        history.push(1);
        history.push(2);
        history.push(3);

        let all: Vec<_> = history.iter().copied().collect();
        assert_eq!(all, vec![1, 2, 3]);
    }

    // ===== Eviction =====

    #[test]
    fn push_beyond_capacity_evicts_oldest() {
        let mut history = HistoryBuffer::new(3);
        assert_eq!(history.push('a'), None);
        assert_eq!(history.push('b'), None);
        assert_eq!(history.push('c'), None);
        assert_eq!(history.push('d'), Some('a'));

        assert_eq!(history.len(), 3);
        let all: Vec<_> = history.iter().copied().collect();
        assert_eq!(all, vec!['b', 'c', 'd']);
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut history = HistoryBuffer::new(DEFAULT_HISTORY_CAPACITY);
        for i in 0..100 {
            history.push(i);
            assert!(history.len() <= DEFAULT_HISTORY_CAPACITY);
        }
        assert_eq!(history.latest(1), vec![&99]);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut history = HistoryBuffer::new(0);
        assert_eq!(history.push(7), Some(7));
        assert!(history.is_empty());
    }

    // ===== Queries =====

    #[test]
    fn latest_returns_tail_oldest_first() {
        let mut history = HistoryBuffer::new(5);
        for i in 1..=5 {
            history.push(i);
        }
        assert_eq!(history.latest(2), vec![&4, &5]);
        assert_eq!(history.latest(10).len(), 5);
        assert!(history.latest(0).is_empty());
    }

    #[test]
    fn last_matching_finds_newest() {
        let mut history = HistoryBuffer::new(5);
        history.push("text:a");
        history.push("image:b");
        history.push("text:c");

        assert_eq!(history.last_matching(|e| e.starts_with("text")), Some(&"text:c"));
        assert_eq!(history.last_matching(|e| e.starts_with("image")), Some(&"image:b"));
        assert_eq!(history.last_matching(|e| e.starts_with("file")), None);
    }

    #[test]
    fn clear_empties_history() {
        let mut history = HistoryBuffer::default();
        history.push(1);
        history.clear();
        assert!(history.is_empty());
    }
}
