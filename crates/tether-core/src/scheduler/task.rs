//! Work items: deferred handlers owned by the scheduler

use crate::scheduler::Scheduler;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Handler run on the loop thread once its work item is ready
pub(crate) type Handler = Box<dyn FnOnce(&Scheduler)>;

/// Unique identifier for a WorkItem
///
/// Ids are handed out in submission order, so comparing two ids tells which
/// item was submitted first.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkItemId(u64);

static NEXT_WORK_ITEM_ID: AtomicU64 = AtomicU64::new(1);

impl WorkItemId {
    /// Generate a new unique WorkItemId
    pub(crate) fn next() -> Self {
        WorkItemId(NEXT_WORK_ITEM_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the numeric ID value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What makes a work item ready
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WorkKind {
    /// Ready once its delay has elapsed
    Timer,
    /// Ready once a pool worker reports the blocking operation finished
    Delegated,
}

/// A ready unit of work
///
/// Not `Clone`: moving the item into the ready queue and out again is what
/// keeps it in the queue at most once.
pub(crate) struct WorkItem {
    pub(crate) id: WorkItemId,
    pub(crate) kind: WorkKind,
    /// When the triggering condition was met
    pub(crate) ready_at: Instant,
    pub(crate) handler: Handler,
}

impl WorkItem {
    pub(crate) fn new(id: WorkItemId, kind: WorkKind, ready_at: Instant, handler: Handler) -> Self {
        Self {
            id,
            kind,
            ready_at,
            handler,
        }
    }

    /// Run the handler, consuming the item.
    pub(crate) fn run(self, scheduler: &Scheduler) {
        (self.handler)(scheduler)
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("ready_at", &self.ready_at)
            .finish_non_exhaustive()
    }
}
