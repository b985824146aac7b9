//! Pending store: time-ordered collection of not-yet-dispatched tasks.
//!
//! The scheduler talks to the store only through [`PendingStore`], so callers
//! can swap in their own ordering or backing structure with
//! `Scheduler::set_queue`. None of the operations synchronize; the scheduler
//! holds its lock around every call.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::scheduler::task::ScheduledTask;

/// Minimal capability the dispatch loop needs from a pending store.
pub trait PendingStore: Send {
    /// Add a task.
    fn insert(&mut self, task: ScheduledTask);

    /// Remove and return the task with the smallest due time.
    fn remove_min(&mut self) -> Option<ScheduledTask>;

    /// The task with the smallest due time, without removing it.
    fn peek_min(&self) -> Option<&ScheduledTask>;

    /// Number of stored tasks.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Heap entry ordered so that `BinaryHeap` (a max-heap) pops the earliest due time.
#[derive(Debug)]
struct HeapEntry(ScheduledTask);

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.due_at() == other.0.due_at()
    }
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earlier due time is "greater" in the heap
        other.0.due_at().cmp(&self.0.due_at())
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Default pending store backed by a binary min-heap on due time.
///
/// Tasks sharing a due time come out in unspecified order.
#[derive(Debug, Default)]
pub struct HeapStore {
    heap: BinaryHeap<HeapEntry>,
}

impl HeapStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with room for `capacity` tasks.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
        }
    }
}

impl PendingStore for HeapStore {
    fn insert(&mut self, task: ScheduledTask) {
        self.heap.push(HeapEntry(task));
    }

    fn remove_min(&mut self) -> Option<ScheduledTask> {
        self.heap.pop().map(|HeapEntry(task)| task)
    }

    fn peek_min(&self) -> Option<&ScheduledTask> {
        self.heap.peek().map(|entry| &entry.0)
    }

    fn len(&self) -> usize {
        self.heap.len()
    }
}

/// Move every task from `from` into `to`, leaving `from` empty.
pub fn transplant(from: &mut dyn PendingStore, to: &mut dyn PendingStore) -> usize {
    let mut moved = 0;
    while let Some(task) = from.remove_min() {
        to.insert(task);
        moved += 1;
    }
    moved
}
