//! Timer queue for delayed handlers
//!
//! Deadlines live in a min-heap; handlers live in a map keyed by work item so
//! cancellation is O(1). Cancelled entries stay in the heap and are skipped
//! when they surface.

use crate::scheduler::task::{Handler, WorkItem, WorkItemId, WorkKind};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

/// Entry in the timer heap
struct TimerEntry {
    /// When the handler becomes ready
    deadline: Instant,
    /// Work item to fire (submission order breaks deadline ties)
    id: WorkItemId,
}

// Reverse ordering for min-heap (earliest deadline, then lowest id, first)
impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.id == other.id
    }
}

impl Eq for TimerEntry {}

/// Pending timers, owned by the loop thread
#[derive(Default)]
pub(crate) struct TimerQueue {
    heap: BinaryHeap<TimerEntry>,
    handlers: FxHashMap<WorkItemId, Handler>,
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a handler to become ready at `deadline`
    pub(crate) fn insert(&mut self, id: WorkItemId, deadline: Instant, handler: Handler) {
        self.heap.push(TimerEntry { deadline, id });
        self.handlers.insert(id, handler);
    }

    /// Drop a pending timer. Returns false if it already fired or never existed.
    pub(crate) fn cancel(&mut self, id: WorkItemId) -> bool {
        self.handlers.remove(&id).is_some()
    }

    /// Pop every timer whose deadline is at or before `now`, earliest first
    pub(crate) fn pop_expired(&mut self, now: Instant) -> Vec<WorkItem> {
        let mut expired = Vec::new();
        while let Some(entry) = self.heap.peek() {
            if entry.deadline > now {
                break;
            }
            if let Some(entry) = self.heap.pop() {
                // Cancelled timers have no handler left
                if let Some(handler) = self.handlers.remove(&entry.id) {
                    expired.push(WorkItem::new(
                        entry.id,
                        WorkKind::Timer,
                        entry.deadline,
                        handler,
                    ));
                }
            }
        }
        expired
    }

    /// Earliest live deadline, discarding cancelled entries on the way
    pub(crate) fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(entry) = self.heap.peek() {
            if self.handlers.contains_key(&entry.id) {
                return Some(entry.deadline);
            }
            self.heap.pop();
        }
        None
    }

    /// Number of live timers
    pub(crate) fn len(&self) -> usize {
        self.handlers.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
