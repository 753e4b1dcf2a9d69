//! Integration tests for the run loop and worker pool

use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};
use tether_core::{OpResult, OperationFailure, Scheduler, SchedulerConfig};

type Log = Rc<RefCell<Vec<String>>>;

fn push(log: &Log, entry: impl Into<String>) {
    log.borrow_mut().push(entry.into());
}

#[test]
fn test_zero_delay_runs_after_current_code() {
    let scheduler = Scheduler::with_io_workers(1);
    let log: Log = Rc::default();

    push(&log, "a");
    let l = log.clone();
    scheduler.schedule_after(Duration::ZERO, move |_| push(&l, "b"));
    push(&log, "c");

    scheduler.run().unwrap();
    assert_eq!(*log.borrow(), vec!["a", "c", "b"]);
}

#[test]
fn test_equal_delays_run_in_submission_order() {
    let scheduler = Scheduler::with_io_workers(1);
    let log: Log = Rc::default();

    for i in 0..10 {
        let l = log.clone();
        scheduler.schedule_after(Duration::from_millis(15), move |_| push(&l, format!("t{}", i)));
    }
    scheduler.run().unwrap();

    let expected: Vec<String> = (0..10).map(|i| format!("t{}", i)).collect();
    assert_eq!(*log.borrow(), expected);
}

#[test]
fn test_timers_run_in_readiness_order() {
    let scheduler = Scheduler::with_io_workers(1);
    let log: Log = Rc::default();

    for (name, ms) in [("slow", 40), ("fast", 5), ("mid", 20)] {
        let l = log.clone();
        scheduler.schedule_after(Duration::from_millis(ms), move |_| push(&l, name));
    }
    scheduler.run().unwrap();

    assert_eq!(*log.borrow(), vec!["fast", "mid", "slow"]);
}

#[test]
fn test_handlers_never_interleave() {
    let scheduler = Scheduler::with_io_workers(2);
    let log: Log = Rc::default();

    // A long handler; the worker finishes while it is still running
    let l = log.clone();
    scheduler.schedule_after(Duration::ZERO, move |_| {
        push(&l, "long:start");
        thread::sleep(Duration::from_millis(50));
        push(&l, "long:end");
    });
    let l = log.clone();
    scheduler.delegate(
        || Ok(()),
        move |_, _: OpResult<()>| push(&l, "worker"),
    );

    scheduler.run().unwrap();
    let log = log.borrow();
    let start = log.iter().position(|e| e == "long:start").unwrap();
    let end = log.iter().position(|e| e == "long:end").unwrap();
    assert_eq!(end, start + 1, "handler was interrupted: {:?}", *log);
    assert_eq!(log.len(), 3);
}

#[test]
fn test_delegations_complete_on_loop_thread() {
    let scheduler = Scheduler::with_io_workers(4);
    let loop_thread = thread::current().id();
    let results = Rc::new(RefCell::new(Vec::new()));

    for i in 0..20u64 {
        let r = results.clone();
        scheduler.delegate(
            move || {
                thread::sleep(Duration::from_millis(20 - i));
                Ok(i)
            },
            move |_, result| {
                assert_eq!(thread::current().id(), loop_thread);
                r.borrow_mut().push(result.unwrap());
            },
        );
    }
    scheduler.run().unwrap();

    let mut results = results.borrow().clone();
    assert_eq!(results.len(), 20);
    results.sort_unstable();
    assert_eq!(results, (0..20).collect::<Vec<_>>());
    assert_eq!(scheduler.stats().delegations_completed, 20);
}

#[test]
fn test_chained_work_keeps_loop_alive() {
    let scheduler = Scheduler::with_io_workers(1);
    let log: Log = Rc::default();

    let l = log.clone();
    scheduler.delegate(
        || Ok(1u32),
        move |sched, first| {
            push(&l, format!("first={}", first.unwrap()));
            let l = l.clone();
            sched.schedule_after(Duration::from_millis(5), move |sched| {
                push(&l, "timer");
                let l = l.clone();
                sched.delegate(
                    || Err::<u32, _>(OperationFailure::from("second failed")),
                    move |_, second| push(&l, format!("second={}", second.unwrap_err())),
                );
            });
        },
    );

    scheduler.run().unwrap();
    assert_eq!(
        *log.borrow(),
        vec!["first=1", "timer", "second=second failed"]
    );
    assert!(scheduler.is_idle());
}

#[test]
fn test_run_can_be_called_again() {
    let scheduler = Scheduler::with_io_workers(1);
    let log: Log = Rc::default();

    let l = log.clone();
    scheduler.schedule_after(Duration::ZERO, move |_| push(&l, "one"));
    scheduler.run().unwrap();

    let l = log.clone();
    scheduler.schedule_after(Duration::ZERO, move |_| push(&l, "two"));
    scheduler.run().unwrap();

    assert_eq!(*log.borrow(), vec!["one", "two"]);
}

#[test]
fn test_cancelled_timer_does_not_delay_run() {
    let scheduler = Scheduler::with_io_workers(1);
    let id = scheduler.schedule_after(Duration::from_secs(60), |_| panic!("must not run"));
    scheduler.schedule_after(Duration::from_millis(1), move |sched| {
        assert!(sched.cancel(id));
    });

    let start = Instant::now();
    scheduler.run().unwrap();
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_drop_with_pending_work() {
    let config = SchedulerConfig::default()
        .with_io_workers(1)
        .with_thread_name_prefix("drop-test")
        .with_shutdown_timeout(Duration::from_millis(500));
    let scheduler = Scheduler::with_config(config);
    scheduler.delegate(
        || {
            thread::sleep(Duration::from_millis(10));
            Ok(())
        },
        |_, _: OpResult<()>| panic!("never run"),
    );
    scheduler.schedule_after(Duration::from_secs(60), |_| panic!("never run"));
    assert_eq!(scheduler.pending(), 2);

    let start = Instant::now();
    drop(scheduler);
    assert!(start.elapsed() < Duration::from_secs(2));
}
