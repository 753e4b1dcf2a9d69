//! `tether read`: delegated file reads joined in argument order.

use super::Outcome;
use crate::output;
use std::path::PathBuf;
use tether_core::{join_settled, ops, AsyncOp, OpResult, Scheduler};

pub(crate) fn run(scheduler: &Scheduler, files: &[PathBuf]) -> anyhow::Result<Vec<OpResult<usize>>> {
    let ops: Vec<AsyncOp<usize>> = files
        .iter()
        .cloned()
        .map(|path| ops::delegated(move || Ok(std::fs::read(&path)?.len())))
        .collect();

    let outcome = Outcome::new();
    join_settled(scheduler, ops, outcome.sink());
    outcome.wait(scheduler)
}

pub fn execute(scheduler: &Scheduler, files: Vec<PathBuf>) -> anyhow::Result<()> {
    let sizes = run(scheduler, &files)?;
    let lines = output::slot_lines(&sizes, |i| format!("[{}]", i));
    for (path, line) in files.iter().zip(lines) {
        println!("{}  {}", line, path.display());
    }

    let failed = sizes.iter().filter(|s| s.is_err()).count();
    if failed > 0 {
        tracing::warn!(failed, total = files.len(), "some files could not be read");
    }
    Ok(())
}
