//! Tether - cooperative run loop with a blocking worker pool
//!
//! Handlers run one at a time, to completion, on the thread that calls
//! [`Scheduler::run`]. Blocking work is delegated to a pool of worker threads
//! whose results come back as ordinary ready handlers. On top of that,
//! [`join`] fans out N operations and hands their results back in submission
//! order, exactly once.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use tether_core::{join, ops, JoinMode, Scheduler};
//!
//! let scheduler = Scheduler::new();
//! let ops = vec![
//!     ops::delayed(Duration::from_millis(30), Ok(0)),
//!     ops::delayed(Duration::from_millis(10), Ok(1)),
//!     ops::delayed(Duration::from_millis(20), Ok(2)),
//! ];
//! join(&scheduler, ops, JoinMode::Collect, |_, result| {
//!     assert_eq!(result, Ok(vec![Ok(0), Ok(1), Ok(2)]));
//! });
//! scheduler.run()?;
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod join;
pub mod once;
pub mod ops;
pub mod scheduler;

pub use config::SchedulerConfig;
pub use error::{JoinFailure, OpResult, OperationFailure, SchedulerError};
pub use join::{join, join_all, join_settled, AsyncOp, Completion, JoinMode, JoinResult};
pub use once::{guard, OnceGuard};
pub use scheduler::{Scheduler, SchedulerStats, WorkItemId, WorkKind};
