use std::collections::BinaryHeap;

use crate::constants::Weight;
use crate::graph::NodeIndex;

/// Priority queue implementation using a binary heap.
/// The heap is a min heap, so the smallest element (with the lowest distance)
/// is always at the top. Items with equal distance leave the queue in the
/// order they were pushed.
#[derive(Default)]
pub struct PriorityQueue {
    heap: BinaryHeap<HeapItem>,
    pushed: u64,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn push(&mut self, distance: Weight, node: NodeIndex) {
        self.heap.push(HeapItem {
            distance,
            node,
            seq: self.pushed,
        });
        self.pushed += 1;
    }

    pub fn pop(&mut self) -> Option<HeapItem> {
        self.heap.pop()
    }
}

#[derive(Copy, Clone, Debug)]
pub struct HeapItem {
    pub distance: Weight,
    pub node: NodeIndex,
    seq: u64,
}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for HeapItem {}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed so that the smallest distance, then the oldest item, is at
        // the top of the heap
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
