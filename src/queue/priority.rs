//! Max-heap of pending work items.

use crate::queue::item::WorkItem;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone)]
struct QueueEntry(WorkItem);

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    /// Higher priority is Greater. For equal priority the older item is Greater,
    /// then the earlier admission sequence.
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .priority
            .cmp(&other.0.priority)
            .then_with(|| other.0.created_at.cmp(&self.0.created_at))
            .then_with(|| other.0.sequence.cmp(&self.0.sequence))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Pending items, popped highest priority first, FIFO within a priority band.
#[derive(Debug, Clone, Default)]
pub struct PriorityQueue {
    heap: BinaryHeap<QueueEntry>,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: WorkItem) {
        self.heap.push(QueueEntry(item));
    }

    pub fn pop(&mut self) -> Option<WorkItem> {
        self.heap.pop().map(|entry| entry.0)
    }

    pub fn peek(&self) -> Option<&WorkItem> {
        self.heap.peek().map(|entry| &entry.0)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Copy of the contents in pop order.
    pub fn to_sorted_vec(&self) -> Vec<WorkItem> {
        let mut entries: Vec<QueueEntry> = self.heap.iter().cloned().collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries.into_iter().map(|entry| entry.0).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkItem> {
        self.heap.iter().map(|entry| &entry.0)
    }
}

impl Extend<WorkItem> for PriorityQueue {
    fn extend<I: IntoIterator<Item = WorkItem>>(&mut self, iter: I) {
        self.heap.extend(iter.into_iter().map(QueueEntry));
    }
}

impl FromIterator<WorkItem> for PriorityQueue {
    fn from_iter<I: IntoIterator<Item = WorkItem>>(iter: I) -> Self {
        let mut queue = PriorityQueue::new();
        queue.extend(iter);
        queue
    }
}
