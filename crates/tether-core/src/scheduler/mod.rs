//! Cooperative scheduler
//!
//! One loop thread runs every handler to completion. A worker pool runs
//! delegated blocking operations and reports back over a channel; timers and
//! worker completions feed a FIFO ready queue that the loop drains.

mod pool;
mod ready;
#[allow(clippy::module_inception)]
mod scheduler;
mod task;
mod timer;

pub use scheduler::{Scheduler, SchedulerStats};
pub use task::{WorkItemId, WorkKind};
