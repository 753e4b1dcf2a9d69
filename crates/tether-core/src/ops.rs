//! Ready-made asynchronous operations
//!
//! Constructors for [`AsyncOp`] values backed by the scheduler's own
//! primitives: the worker pool, timers, and timer-based timeouts.

use crate::error::{OpResult, OperationFailure};
use crate::join::{AsyncOp, Completion};
use crate::scheduler::Scheduler;
use std::time::Duration;

/// Run blocking `work` on the worker pool.
pub fn delegated<T, F>(work: F) -> AsyncOp<T>
where
    T: Send + 'static,
    F: FnOnce() -> OpResult<T> + Send + 'static,
{
    Box::new(move |scheduler: &Scheduler, done: Completion<T>| {
        scheduler.delegate(work, move |scheduler, result| {
            done.complete(scheduler, result);
        });
    })
}

/// Complete with `result` once `delay` has elapsed.
pub fn delayed<T: 'static>(delay: Duration, result: OpResult<T>) -> AsyncOp<T> {
    Box::new(move |scheduler: &Scheduler, done: Completion<T>| {
        scheduler.schedule_after(delay, move |scheduler| {
            done.complete(scheduler, result);
        });
    })
}

/// Complete with `result` on the next pass of the loop.
pub fn ready<T: 'static>(result: OpResult<T>) -> AsyncOp<T> {
    delayed(Duration::ZERO, result)
}

/// Bound `operation` by `limit`.
///
/// If the timer fires first the operation completes with
/// [`OperationFailure::TimedOut`] and its eventual result is dropped.
/// If the operation wins, the timer is cancelled.
pub fn with_timeout<T: 'static>(operation: AsyncOp<T>, limit: Duration) -> AsyncOp<T> {
    Box::new(move |scheduler: &Scheduler, done: Completion<T>| {
        let on_timeout = done.clone();
        let timer = scheduler.schedule_after(limit, move |scheduler| {
            if on_timeout.complete(scheduler, Err(OperationFailure::TimedOut(limit))) {
                tracing::debug!(?limit, "operation timed out");
            }
        });

        operation(
            scheduler,
            Completion::new(move |scheduler, result| {
                scheduler.cancel(timer);
                done.complete(scheduler, result);
            }),
        );
    })
}
