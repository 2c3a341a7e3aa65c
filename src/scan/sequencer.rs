//! Reorder buffer for out-of-order results
//!
//! Stat results come back from the pool in completion order. Items are
//! pushed with their submission sequence number and released strictly in
//! sequence order.

use std::collections::BTreeMap;

#[derive(Debug)]
pub struct ReorderBuffer<T> {
    next: usize,
    pending: BTreeMap<usize, T>,
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReorderBuffer<T> {
    pub fn new() -> Self {
        Self {
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Hold `item` until everything before `seq` has been released
    pub fn push(&mut self, seq: usize, item: T) {
        if seq >= self.next {
            self.pending.insert(seq, item);
        }
    }

    /// Next item in sequence, if it has arrived
    pub fn pop_ready(&mut self) -> Option<T> {
        let item = self.pending.remove(&self.next)?;
        self.next += 1;
        Some(item)
    }

    /// Sequence number of the next item to be released
    pub fn next_seq(&self) -> usize {
        self.next
    }

    /// Nothing is waiting for an earlier item
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_releases_in_order() {
        let mut buf = ReorderBuffer::new();
        buf.push(2, 'c');
        buf.push(1, 'b');
        assert_eq!(buf.pop_ready(), None);

        buf.push(0, 'a');
        let mut out = Vec::new();
        while let Some(c) = buf.pop_ready() {
            out.push(c);
        }
        assert_eq!(out, vec!['a', 'b', 'c']);
        assert!(buf.is_empty());
        assert_eq!(buf.next_seq(), 3);
    }

    #[test]
    fn test_ignores_already_released() {
        let mut buf = ReorderBuffer::new();
        buf.push(0, 1);
        assert_eq!(buf.pop_ready(), Some(1));
        buf.push(0, 99);
        assert!(buf.is_empty());
    }
}
