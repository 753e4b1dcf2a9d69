//! FIFO of work items whose triggering condition has been met

use crate::scheduler::task::WorkItem;
use std::collections::VecDeque;

/// Ready queue drained by the run loop
///
/// Insertion order is readiness order. Items are popped before their handler
/// runs, so a handler can never observe itself still queued.
#[derive(Debug, Default)]
pub(crate) struct ReadyQueue {
    items: VecDeque<WorkItem>,
}

impl ReadyQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append an item at the tail
    pub(crate) fn push(&mut self, item: WorkItem) {
        self.items.push_back(item);
    }

    /// Append a batch that became ready in the same pass.
    ///
    /// The batch is ordered by readiness instant; items that became ready at
    /// the same instant keep submission order.
    pub(crate) fn push_batch(&mut self, mut batch: Vec<WorkItem>) {
        batch.sort_by_key(|item| (item.ready_at, item.id));
        self.items.extend(batch);
    }

    /// Remove the head of the queue
    pub(crate) fn pop(&mut self) -> Option<WorkItem> {
        self.items.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::task::{WorkItemId, WorkKind};
    use std::time::{Duration, Instant};

    fn item(id: WorkItemId, ready_at: Instant) -> WorkItem {
        WorkItem::new(id, WorkKind::Timer, ready_at, Box::new(|_| {}))
    }

    #[test]
    fn test_fifo() {
        let mut queue = ReadyQueue::new();
        let now = Instant::now();
        let a = WorkItemId::next();
        let b = WorkItemId::next();

        // Pushed individually: insertion order wins, not id order
        queue.push(item(b, now));
        queue.push(item(a, now));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().map(|i| i.id), Some(b));
        assert_eq!(queue.pop().map(|i| i.id), Some(a));
        assert!(queue.pop().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_batch_orders_by_readiness_then_id() {
        let mut queue = ReadyQueue::new();
        let base = Instant::now();
        let first = WorkItemId::next();
        let second = WorkItemId::next();
        let third = WorkItemId::next();

        queue.push_batch(vec![
            item(third, base),
            item(first, base + Duration::from_millis(5)),
            item(second, base),
        ]);

        let order: Vec<_> = std::iter::from_fn(|| queue.pop().map(|i| i.id)).collect();
        assert_eq!(order, vec![second, third, first]);
    }

    #[test]
    fn test_batch_appends_behind_existing() {
        let mut queue = ReadyQueue::new();
        let now = Instant::now();
        let late = WorkItemId::next();
        let early = WorkItemId::next();

        queue.push(item(late, now + Duration::from_secs(1)));
        queue.push_batch(vec![item(early, now)]);

        assert_eq!(queue.pop().map(|i| i.id), Some(late));
        assert_eq!(queue.pop().map(|i| i.id), Some(early));
    }
}
