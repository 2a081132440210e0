use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Ordered list with a fixed capacity; pushing onto a full list evicts the
/// oldest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundedList<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> BoundedList<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends `item`, returning the evicted oldest entry when full.
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(item);
        }
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Replaces the contents, keeping the newest `capacity` items.
    pub fn replace<I: IntoIterator<Item = T>>(&mut self, items: I) {
        self.items.clear();
        for item in items {
            self.push(item);
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_evicts_oldest_when_full() {
        let mut list = BoundedList::new(3);
        assert_eq!(list.push(1), None);
        assert_eq!(list.push(2), None);
        assert_eq!(list.push(3), None);
        assert_eq!(list.push(4), Some(1));
        assert_eq!(list.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn replace_keeps_newest_items() {
        let mut list = BoundedList::new(2);
        list.push("stale");
        list.replace(["a", "b", "c"]);
        assert_eq!(list.iter().copied().collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[test]
    fn zero_capacity_holds_nothing() {
        let mut list = BoundedList::new(0);
        assert_eq!(list.push(7), Some(7));
        assert!(list.is_empty());
    }
}
