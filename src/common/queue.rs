use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::hash::Hash;

#[derive(Debug)]
struct OpenEntry<K> {
    priority: usize,
    order: u64,
    key: K,
}

impl<K> PartialEq for OpenEntry<K> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.order == other.order
    }
}

impl<K> Eq for OpenEntry<K> {}

impl<K> PartialOrd for OpenEntry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for OpenEntry<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: lower priority value pops first,
        // then earlier insertion.
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// Min-priority open list with O(1) membership test.
///
/// Ties are popped in insertion order; search code must not rely on that.
#[derive(Debug)]
pub struct OpenList<K> {
    heap: BinaryHeap<OpenEntry<K>>,
    members: HashSet<K>,
    inserted: u64,
}

impl<K: Hash + Eq + Clone> Default for OpenList<K> {
    fn default() -> Self {
        OpenList {
            heap: BinaryHeap::new(),
            members: HashSet::new(),
            inserted: 0,
        }
    }
}

impl<K: Hash + Eq + Clone> OpenList<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false (and leaves the list unchanged) if `key` is already
    /// enqueued.
    pub fn enqueue(&mut self, key: K, priority: usize) -> bool {
        if !self.members.insert(key.clone()) {
            return false;
        }
        self.heap.push(OpenEntry {
            priority,
            order: self.inserted,
            key,
        });
        self.inserted += 1;
        true
    }

    pub fn dequeue(&mut self) -> Option<K> {
        let entry = self.heap.pop()?;
        self.members.remove(&entry.key);
        Some(entry.key)
    }

    pub fn peek_priority(&self) -> Option<usize> {
        self.heap.peek().map(|entry| entry.priority)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.members.contains(key)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Keeps the `capacity` highest-priority values seen so far.
///
/// Values are held sorted by descending priority; inserting past capacity
/// evicts the lowest-priority value.
#[derive(Debug)]
pub struct FixedMaxPriorityQueue<T, P: Ord> {
    capacity: usize,
    items: Vec<(P, T)>,
}

impl<T, P: Ord> FixedMaxPriorityQueue<T, P> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "bounded queue capacity must be positive");
        FixedMaxPriorityQueue {
            capacity,
            items: Vec::with_capacity(capacity + 1),
        }
    }

    pub fn enqueue(&mut self, value: T, priority: P) {
        // After existing items of equal priority, so earlier arrivals win ties.
        let index = self.items.partition_point(|(p, _)| *p >= priority);
        if index >= self.capacity {
            return;
        }
        self.items.insert(index, (priority, value));
        self.items.truncate(self.capacity);
    }

    /// Removes and returns the highest-priority value.
    pub fn dequeue(&mut self) -> T {
        assert!(!self.items.is_empty(), "dequeue on empty bounded queue");
        self.items.remove(0).1
    }

    pub fn peek_priority(&self) -> Option<&P> {
        self.items.first().map(|(priority, _)| priority)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drains all values, highest priority first.
    pub fn into_sorted_vec(self) -> Vec<T> {
        self.items.into_iter().map(|(_, value)| value).collect()
    }
}
