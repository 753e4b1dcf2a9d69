//! Worker pool for blocking operations
//!
//! Worker threads pull jobs from a shared channel, run them, and push a
//! completion onto the completion channel. They never touch scheduler state
//! and never run completion handlers; the loop thread collects completions
//! and turns them into ready work items.

use crate::config::SchedulerConfig;
use crate::error::OperationFailure;
use crate::scheduler::task::WorkItemId;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use rustc_hash::FxHashMap;
use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Type-erased result of a blocking operation
pub(crate) type Payload = Box<dyn Any + Send>;

/// Blocking work shipped to a worker
pub(crate) type Job = Box<dyn FnOnce() -> Payload + Send>;

/// Identifier of an operation handed to the pool
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) struct OperationId(u64);

/// Job sent from the loop thread to a worker
struct PoolJob {
    op: OperationId,
    work: Job,
}

/// Completion sent from a worker back to the loop thread
struct PoolCompletion {
    op: OperationId,
    finished_at: Instant,
    payload: Payload,
}

/// A collected completion whose originating work item is still live
pub(crate) struct Completed {
    pub(crate) item: WorkItemId,
    pub(crate) finished_at: Instant,
    pub(crate) payload: Payload,
}

/// Pool of blocking worker threads plus the in-flight bookkeeping
pub(crate) struct WorkerPool {
    /// Channel: loop → workers
    job_tx: Option<Sender<PoolJob>>,
    /// Channel: workers → loop (many producers, one consumer)
    completion_rx: Receiver<PoolCompletion>,
    /// Completions received by `wait` and not yet collected
    arrived: VecDeque<PoolCompletion>,

    /// In-flight operation → originating work item
    in_flight: FxHashMap<OperationId, WorkItemId>,
    next_op: u64,
    /// Completions dropped because their work item was cancelled
    discarded: u64,

    shutdown: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl WorkerPool {
    /// Spawn the worker threads described by `config`
    pub(crate) fn new(config: &SchedulerConfig) -> Self {
        let (job_tx, job_rx) = channel::unbounded::<PoolJob>();
        let (completion_tx, completion_rx) = channel::unbounded::<PoolCompletion>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let worker_count = config.resolved_io_workers();
        let mut handles = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            let rx = job_rx.clone();
            let tx = completion_tx.clone();
            let shutdown = shutdown.clone();

            let handle = thread::Builder::new()
                .name(format!("{}-{}", config.thread_name_prefix, i))
                .spawn(move || {
                    Self::worker_loop(rx, tx, shutdown);
                })
                .expect("Failed to spawn worker pool thread");
            handles.push(handle);
        }
        tracing::debug!(workers = worker_count, "worker pool started");

        Self {
            job_tx: Some(job_tx),
            completion_rx,
            arrived: VecDeque::new(),
            in_flight: FxHashMap::default(),
            next_op: 1,
            discarded: 0,
            shutdown,
            handles,
            shutdown_timeout: config.shutdown_timeout(),
        }
    }

    fn worker_loop(
        job_rx: Receiver<PoolJob>,
        completion_tx: Sender<PoolCompletion>,
        shutdown: Arc<AtomicBool>,
    ) {
        while !shutdown.load(AtomicOrdering::Acquire) {
            let job = match job_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(j) => j,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            let payload = (job.work)();
            let completion = PoolCompletion {
                op: job.op,
                finished_at: Instant::now(),
                payload,
            };
            if completion_tx.send(completion).is_err() {
                break;
            }
        }
    }

    /// Hand a job to the workers on behalf of `item`
    pub(crate) fn submit(&mut self, item: WorkItemId, work: Job) -> Result<OperationId, OperationFailure> {
        let tx = self.job_tx.as_ref().ok_or(OperationFailure::PoolClosed)?;
        if self.handles.is_empty() {
            return Err(OperationFailure::PoolClosed);
        }

        let op = OperationId(self.next_op);
        self.next_op += 1;
        tx.send(PoolJob { op, work })
            .map_err(|_| OperationFailure::PoolClosed)?;
        self.in_flight.insert(op, item);
        Ok(op)
    }

    /// Stop tracking the operation started for `item`; its completion will be discarded
    pub(crate) fn forget(&mut self, item: WorkItemId) {
        self.in_flight.retain(|_, owner| *owner != item);
    }

    /// Collect every completion that has arrived so far without blocking
    pub(crate) fn drain_completed(&mut self) -> Vec<Completed> {
        loop {
            match self.completion_rx.try_recv() {
                Ok(c) => self.arrived.push_back(c),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        let mut completed = Vec::with_capacity(self.arrived.len());
        while let Some(c) = self.arrived.pop_front() {
            match self.in_flight.remove(&c.op) {
                Some(item) => completed.push(Completed {
                    item,
                    finished_at: c.finished_at,
                    payload: c.payload,
                }),
                None => {
                    self.discarded += 1;
                    tracing::trace!(op = c.op.0, "discarding completion of cancelled operation");
                }
            }
        }
        completed
    }

    /// Block until a completion arrives or `timeout` elapses (`None` waits indefinitely)
    pub(crate) fn wait(&mut self, timeout: Option<Duration>) {
        let received = match timeout {
            Some(t) => match self.completion_rx.recv_timeout(t) {
                Ok(c) => Some(c),
                Err(RecvTimeoutError::Timeout) => None,
                // No workers left to wake us; fall back to sleeping out the timer
                Err(RecvTimeoutError::Disconnected) => {
                    thread::sleep(t);
                    None
                }
            },
            None => self.completion_rx.recv().ok(),
        };
        if let Some(c) = received {
            self.arrived.push_back(c);
        }
    }

    /// Number of operations whose completion is still awaited
    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Completions discarded because their work item was cancelled
    pub(crate) fn discarded(&self) -> u64 {
        self.discarded
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Stop the workers and join them, detaching any that outlive the timeout
    pub(crate) fn shutdown(&mut self) {
        if self.job_tx.is_none() {
            return;
        }
        self.shutdown.store(true, AtomicOrdering::Release);
        // Dropping the sender unblocks idle workers
        self.job_tx.take();

        for handle in self.handles.drain(..) {
            Self::join_with_timeout(handle, self.shutdown_timeout);
        }
        tracing::debug!(abandoned = self.in_flight.len(), "worker pool stopped");
        self.in_flight.clear();
    }

    /// Join a thread with timeout, detach if stuck.
    fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration) {
        let start = Instant::now();
        loop {
            if handle.is_finished() {
                let _ = handle.join();
                return;
            }
            if start.elapsed() > timeout {
                tracing::warn!(
                    thread = handle.thread().name().unwrap_or("<unnamed>"),
                    "worker did not stop in time; detaching"
                );
                drop(handle);
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
