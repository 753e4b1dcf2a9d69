//! Join combinator: fan out N operations, fan the results back in.
//!
//! `join(ops, mode, final_handler)`:
//! 1. Allocate one result slot per operation, addressed by submission index
//! 2. Launch every operation with a [`Completion`] bound to its slot
//! 3. Invoke `final_handler` exactly once, with results in submission order
//!
//! **Key property**: result `i` always belongs to operation `i`, whatever
//! order the operations actually finish in.
//!
//! # Modes
//!
//! - [`JoinMode::Collect`] waits for every operation and keeps each outcome,
//!   success or failure, in its slot.
//! - [`JoinMode::FailFast`] finalizes on the first failure; anything that
//!   arrives afterwards is discarded.
//!
//! An operation that never completes keeps the join from finalizing. Wrap it
//! with [`ops::with_timeout`](crate::ops::with_timeout) if that matters.

use crate::error::{JoinFailure, OpResult};
use crate::once::OnceGuard;
use crate::scheduler::Scheduler;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// An asynchronous operation: given a completion handle, it eventually
/// reports one `OpResult` through it.
pub type AsyncOp<T> = Box<dyn FnOnce(&Scheduler, Completion<T>)>;

/// What a join's final handler receives.
///
/// `Ok` holds one outcome per operation, in submission order. `Err` only
/// occurs in fail-fast mode and carries the first failure verbatim.
pub type JoinResult<T> = Result<Vec<OpResult<T>>, JoinFailure>;

type CompletionFn<T> = Box<dyn FnOnce(&Scheduler, OpResult<T>)>;
type FinalHandler<T> = Box<dyn FnOnce(&Scheduler, JoinResult<T>)>;

/// Failure policy of a join, fixed per call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinMode {
    /// Finalize with the first failure
    FailFast,
    /// Wait for all operations and keep every outcome
    #[default]
    Collect,
}

/// Completion handle given to an asynchronous operation.
///
/// Clones share one guard: only the first `complete` across all clones is
/// delivered, so a source that reports twice cannot double-count.
pub struct Completion<T> {
    inner: Rc<OnceGuard<CompletionFn<T>>>,
}

impl<T> Completion<T> {
    /// Wrap a completion handler
    pub fn new<F>(handler: F) -> Self
    where
        F: FnOnce(&Scheduler, OpResult<T>) + 'static,
    {
        Self {
            inner: Rc::new(OnceGuard::new(Box::new(handler))),
        }
    }

    /// Report the operation's outcome. Returns false if it was already reported.
    pub fn complete(&self, scheduler: &Scheduler, result: OpResult<T>) -> bool {
        match self.inner.take() {
            Some(handler) => {
                handler(scheduler, result);
                true
            }
            None => {
                tracing::trace!("duplicate completion dropped");
                false
            }
        }
    }

    /// Whether an outcome has been reported
    pub fn is_completed(&self) -> bool {
        self.inner.is_consumed()
    }
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("completed", &self.is_completed())
            .finish()
    }
}

/// Per-call join state, shared only by that call's completions
struct JoinState<T> {
    mode: JoinMode,
    /// Indexed by submission order
    slots: Vec<Option<OpResult<T>>>,
    completed: usize,
    finalized: bool,
    first_failure: Option<JoinFailure>,
    final_handler: OnceGuard<FinalHandler<T>>,
}

impl<T> JoinState<T> {
    fn new(mode: JoinMode, total: usize, final_handler: FinalHandler<T>) -> Self {
        Self {
            mode,
            slots: (0..total).map(|_| None).collect(),
            completed: 0,
            finalized: false,
            first_failure: None,
            final_handler: OnceGuard::new(final_handler),
        }
    }

    /// Store outcome `index`; returns the final result once the join is decided
    fn record(&mut self, index: usize, result: OpResult<T>) -> Option<JoinResult<T>> {
        if self.finalized {
            tracing::trace!(index, "late result discarded");
            return None;
        }
        self.completed += 1;

        if let (JoinMode::FailFast, Err(failure)) = (self.mode, &result) {
            self.finalized = true;
            self.first_failure = Some(failure.clone());
            tracing::debug!(index, failure = ?self.first_failure, "join failed fast");
            return Some(Err(failure.clone()));
        }

        self.slots[index] = Some(result);
        if self.completed < self.slots.len() {
            return None;
        }

        self.finalized = true;
        tracing::debug!(total = self.slots.len(), "join complete");
        // Every slot is filled: each completion reports at most once
        Some(Ok(self.slots.drain(..).flatten().collect()))
    }
}

/// Launch `operations` and deliver their ordered results to `final_handler`.
///
/// With no operations, `final_handler` runs before `join` returns.
pub fn join<T, H>(scheduler: &Scheduler, operations: Vec<AsyncOp<T>>, mode: JoinMode, final_handler: H)
where
    T: 'static,
    H: FnOnce(&Scheduler, JoinResult<T>) + 'static,
{
    let total = operations.len();
    if total == 0 {
        final_handler(scheduler, Ok(Vec::new()));
        return;
    }

    let state = Rc::new(RefCell::new(JoinState::new(mode, total, Box::new(final_handler))));

    // All slots and completions exist before the first operation starts
    let completions: Vec<Completion<T>> = (0..total)
        .map(|index| {
            let state = Rc::clone(&state);
            Completion::new(move |scheduler, result| {
                let decided = state.borrow_mut().record(index, result);
                if let Some(outcome) = decided {
                    let handler = state.borrow().final_handler.take();
                    if let Some(handler) = handler {
                        handler(scheduler, outcome);
                    }
                }
            })
        })
        .collect();

    tracing::debug!(total, ?mode, "join launched");
    for (operation, completion) in operations.into_iter().zip(completions) {
        operation(scheduler, completion);
    }
}

/// Fail-fast join delivering plain values.
pub fn join_all<T, H>(scheduler: &Scheduler, operations: Vec<AsyncOp<T>>, final_handler: H)
where
    T: 'static,
    H: FnOnce(&Scheduler, Result<Vec<T>, JoinFailure>) + 'static,
{
    join(scheduler, operations, JoinMode::FailFast, move |scheduler, result| {
        let values: Result<Vec<T>, JoinFailure> =
            result.and_then(|slots| slots.into_iter().collect());
        final_handler(scheduler, values);
    });
}

/// Collecting join delivering every outcome.
pub fn join_settled<T, H>(scheduler: &Scheduler, operations: Vec<AsyncOp<T>>, final_handler: H)
where
    T: 'static,
    H: FnOnce(&Scheduler, Vec<OpResult<T>>) + 'static,
{
    join(scheduler, operations, JoinMode::Collect, move |scheduler, result| {
        // Collect mode never finalizes with Err
        let slots = result.unwrap_or_else(|failure| vec![Err(failure)]);
        final_handler(scheduler, slots);
    });
}
