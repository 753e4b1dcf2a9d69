//! Cooperative run loop
//!
//! All handlers run on the thread that calls [`Scheduler::run`], one at a
//! time and to completion. Blocking work is delegated to the worker pool,
//! whose completions come back through a channel and are queued like any
//! other ready item.

use crate::config::SchedulerConfig;
use crate::error::{OpResult, OperationFailure, SchedulerError};
use crate::scheduler::pool::{Payload, WorkerPool};
use crate::scheduler::ready::ReadyQueue;
use crate::scheduler::task::{WorkItem, WorkItemId, WorkKind};
use crate::scheduler::timer::TimerQueue;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// Used when `now + delay` does not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// What the loop hands to a delegated completion handler
enum Delivery {
    /// The worker's type-erased `OpResult<T>`
    Payload(Payload),
    /// The operation never reached a worker
    Failed(OperationFailure),
}

type DelegateHandler = Box<dyn FnOnce(&Scheduler, Delivery)>;

/// Scheduler statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Handlers executed by the run loop
    pub handlers_run: u64,

    /// Timers moved to the ready queue
    pub timers_fired: u64,

    /// Delegated operations whose completion was queued
    pub delegations_completed: u64,

    /// Work items removed by `cancel`
    pub cancelled: u64,

    /// Worker completions dropped because their item had been cancelled
    pub late_completions_discarded: u64,
}

/// Loop-thread state. Never borrowed while a handler runs.
struct LoopState {
    ready: ReadyQueue,
    timers: TimerQueue,
    pool: WorkerPool,
    /// Completion handlers of in-flight delegated items
    delegates: FxHashMap<WorkItemId, DelegateHandler>,
}

/// Single-threaded cooperative scheduler
///
/// `Scheduler` is neither `Send` nor `Sync`: every handler runs on the
/// thread that owns it, so handler-visible state needs no locks.
pub struct Scheduler {
    state: RefCell<LoopState>,
    running: Cell<bool>,
    stats: Cell<SchedulerStats>,
}

/// Clears the running flag when `run` unwinds or returns
struct RunningFlag<'a>(&'a Cell<bool>);

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Scheduler {
    /// Create a scheduler with the default configuration
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Create a scheduler with `io_workers` pool threads (0 = number of CPU cores)
    pub fn with_io_workers(io_workers: usize) -> Self {
        Self::with_config(SchedulerConfig::default().with_io_workers(io_workers))
    }

    /// Create a scheduler from defaults overridden by `TETHER_*` variables
    pub fn from_env() -> Result<Self, SchedulerError> {
        Ok(Self::with_config(SchedulerConfig::default().apply_env()?))
    }

    /// Create a scheduler with an explicit configuration
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            state: RefCell::new(LoopState {
                ready: ReadyQueue::new(),
                timers: TimerQueue::new(),
                pool: WorkerPool::new(&config),
                delegates: FxHashMap::default(),
            }),
            running: Cell::new(false),
            stats: Cell::new(SchedulerStats::default()),
        }
    }

    /// Run `handler` once at least `delay` has elapsed.
    ///
    /// The handler never runs synchronously, even for a zero delay: it waits
    /// for the current handler and everything already queued.
    pub fn schedule_after<F>(&self, delay: Duration, handler: F) -> WorkItemId
    where
        F: FnOnce(&Scheduler) + 'static,
    {
        let id = WorkItemId::next();
        let now = Instant::now();
        let deadline = now
            .checked_add(delay)
            .unwrap_or_else(|| now + FAR_FUTURE);
        self.state
            .borrow_mut()
            .timers
            .insert(id, deadline, Box::new(handler));
        tracing::debug!(item = %id, ?delay, "timer scheduled");
        id
    }

    /// Run `operation` on the worker pool, then `handler` on the loop thread.
    ///
    /// A panic inside `operation` is delivered as
    /// [`OperationFailure::Panicked`].
    pub fn delegate<T, Op, H>(&self, operation: Op, handler: H) -> WorkItemId
    where
        T: Send + 'static,
        Op: FnOnce() -> OpResult<T> + Send + 'static,
        H: FnOnce(&Scheduler, OpResult<T>) + 'static,
    {
        let id = WorkItemId::next();

        let work = Box::new(move || {
            let result = match panic::catch_unwind(AssertUnwindSafe(operation)) {
                Ok(result) => result,
                Err(payload) => {
                    let message = panic_message(&*payload);
                    tracing::warn!(item = %id, %message, "delegated operation panicked");
                    Err(OperationFailure::Panicked(message))
                }
            };
            Box::new(result) as Payload
        });

        let deliver: DelegateHandler = Box::new(move |sched, delivery| {
            let result = match delivery {
                Delivery::Payload(payload) => match payload.downcast::<OpResult<T>>() {
                    Ok(result) => *result,
                    Err(_) => Err(OperationFailure::Misuse(
                        "completion payload has an unexpected type".to_string(),
                    )),
                },
                Delivery::Failed(failure) => Err(failure),
            };
            handler(sched, result);
        });

        let mut state = self.state.borrow_mut();
        match state.pool.submit(id, work) {
            Ok(_) => {
                state.delegates.insert(id, deliver);
                tracing::debug!(item = %id, "operation delegated");
            }
            Err(failure) => {
                tracing::warn!(item = %id, %failure, "delegation rejected");
                state.ready.push(WorkItem::new(
                    id,
                    WorkKind::Delegated,
                    Instant::now(),
                    Box::new(move |sched| deliver(sched, Delivery::Failed(failure))),
                ));
            }
        }
        id
    }

    /// Remove a work item that is not ready yet.
    ///
    /// Returns false (and does nothing) if the item is already queued, has
    /// run, or never existed. A cancelled delegated operation still runs to
    /// completion on its worker; only its completion is dropped.
    pub fn cancel(&self, id: WorkItemId) -> bool {
        let removed = {
            let mut state = self.state.borrow_mut();
            if state.timers.cancel(id) {
                true
            } else if state.delegates.remove(&id).is_some() {
                state.pool.forget(id);
                true
            } else {
                false
            }
        };
        if removed {
            self.bump(|s| s.cancelled += 1);
            tracing::debug!(item = %id, "work item cancelled");
        }
        removed
    }

    /// Drive every pending work item to completion.
    ///
    /// Each pass moves all newly ready items onto the ready queue, ordered by
    /// the instant they became ready, then runs queued handlers one at a
    /// time until the queue is empty. Returns once no timers or delegated
    /// operations remain.
    pub fn run(&self) -> Result<(), SchedulerError> {
        if self.running.replace(true) {
            return Err(SchedulerError::AlreadyRunning);
        }
        let _running = RunningFlag(&self.running);

        loop {
            self.collect_ready(Instant::now());
            if self.drain() > 0 {
                continue;
            }

            let wait = {
                let mut state = self.state.borrow_mut();
                if state.timers.is_empty() && state.delegates.is_empty() {
                    break;
                }
                state
                    .timers
                    .next_deadline()
                    .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            };
            self.state.borrow_mut().pool.wait(wait);
        }

        tracing::debug!(stats = ?self.stats(), "run loop idle");
        Ok(())
    }

    /// Move every item that is ready at `now` onto the ready queue
    fn collect_ready(&self, now: Instant) {
        let (timers, delegated) = {
            let mut state = self.state.borrow_mut();
            let mut batch = state.timers.pop_expired(now);
            let timers = batch.len();

            let completed = state.pool.drain_completed();
            let delegated = completed.len();
            for done in completed {
                if let Some(deliver) = state.delegates.remove(&done.item) {
                    let payload = done.payload;
                    batch.push(WorkItem::new(
                        done.item,
                        WorkKind::Delegated,
                        done.finished_at,
                        Box::new(move |sched| deliver(sched, Delivery::Payload(payload))),
                    ));
                }
            }

            if !batch.is_empty() {
                tracing::trace!(ready = batch.len(), "dispatch pass");
                state.ready.push_batch(batch);
            }
            (timers, delegated)
        };

        if timers + delegated > 0 {
            self.bump(|s| {
                s.timers_fired += timers as u64;
                s.delegations_completed += delegated as u64;
            });
        }
    }

    /// Run queued handlers until the ready queue is empty; returns how many ran
    fn drain(&self) -> usize {
        let mut ran = 0;
        loop {
            // The borrow ends before the handler runs
            let next = self.state.borrow_mut().ready.pop();
            let Some(item) = next else {
                break;
            };
            tracing::trace!(item = %item.id, kind = ?item.kind, "running handler");
            item.run(self);
            ran += 1;
        }
        if ran > 0 {
            self.bump(|s| s.handlers_run += ran as u64);
        }
        ran
    }

    fn bump(&self, update: impl FnOnce(&mut SchedulerStats)) {
        let mut stats = self.stats.get();
        update(&mut stats);
        self.stats.set(stats);
    }

    /// Work items that have not run yet (timers, in-flight delegations, queued)
    pub fn pending(&self) -> usize {
        let state = self.state.borrow();
        state.timers.len() + state.delegates.len() + state.ready.len()
    }

    /// Whether `run` would return immediately
    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Whether the run loop is currently executing
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Number of worker pool threads
    pub fn worker_count(&self) -> usize {
        self.state.borrow().pool.worker_count()
    }

    /// Get scheduler statistics
    pub fn stats(&self) -> SchedulerStats {
        let mut stats = self.stats.get();
        stats.late_completions_discarded = self.state.borrow().pool.discarded();
        stats
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending())
            .field("running", &self.running.get())
            .field("stats", &self.stats())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
