//! `tether fanout`: join over timer-delayed operations.

use super::Outcome;
use crate::output;
use std::time::{Duration, Instant};
use tether_core::{join, ops, AsyncOp, JoinMode, JoinResult, OperationFailure, Scheduler};

/// Build one operation per delay; each completes with its own index
pub(crate) fn operations(delays: &[u64], fail: Option<usize>) -> Vec<AsyncOp<usize>> {
    delays
        .iter()
        .enumerate()
        .map(|(i, &ms)| {
            let result = if fail == Some(i) {
                Err(OperationFailure::msg(format!("operation {} failed", i)))
            } else {
                Ok(i)
            };
            ops::delayed(Duration::from_millis(ms), result)
        })
        .collect()
}

pub(crate) fn run(
    scheduler: &Scheduler,
    delays: &[u64],
    mode: JoinMode,
    fail: Option<usize>,
) -> anyhow::Result<JoinResult<usize>> {
    let outcome = Outcome::new();
    join(scheduler, operations(delays, fail), mode, outcome.sink());
    outcome.wait(scheduler)
}

pub fn execute(
    scheduler: &Scheduler,
    delays: &[u64],
    mode: JoinMode,
    fail: Option<usize>,
) -> anyhow::Result<()> {
    println!("Fanning out {} operations ({:?}), delays {:?} ms", delays.len(), mode, delays);

    let start = Instant::now();
    let result = run(scheduler, delays, mode, fail)?;
    for line in output::join_lines(&result) {
        println!("{}", line);
    }
    println!("Done in {:.1?}", start.elapsed());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fanout_collect_ordered() {
        let scheduler = Scheduler::with_io_workers(1);
        let result = run(&scheduler, &[30, 10, 20], JoinMode::Collect, None).unwrap();
        assert_eq!(result, Ok(vec![Ok(0), Ok(1), Ok(2)]));
    }

    #[test]
    fn test_fanout_fail_fast() {
        let scheduler = Scheduler::with_io_workers(1);
        let result = run(&scheduler, &[5, 1, 3], JoinMode::FailFast, Some(2)).unwrap();
        assert_eq!(result, Err(OperationFailure::msg("operation 2 failed")));
    }

    #[test]
    fn test_fanout_empty() {
        let scheduler = Scheduler::with_io_workers(1);
        let result = run(&scheduler, &[], JoinMode::Collect, None).unwrap();
        assert_eq!(result, Ok(vec![]));
    }
}
