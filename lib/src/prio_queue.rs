//! Min-ordered priority queue with FIFO tie-break among equal keys
use std::collections::BTreeMap;

/// Ordered container keyed by a priority. The smallest key is taken first and
/// items pushed with equal keys come out in insertion order.
#[derive(Debug, Clone)]
pub struct PriorityQueue<K: Ord, T> {
    entries: BTreeMap<(K, u64), T>,
    next_seq: u64,
}

impl<K: Ord, T> Default for PriorityQueue<K, T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_seq: 0,
        }
    }
}

impl<K: Ord, T> PriorityQueue<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: T, key: K) {
        // The sequence number keeps equal keys in arrival order.
        self.entries.insert((key, self.next_seq), item);
        self.next_seq += 1;
    }

    /// Minimum key and its item, without removing them.
    pub fn peek(&self) -> Option<(&K, &T)> {
        self.entries
            .first_key_value()
            .map(|((key, _), item)| (key, item))
    }

    pub fn pop(&mut self) -> Option<T> {
        self.entries.pop_first().map(|(_, item)| item)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
