//! `tether order`: zero-delay work runs after the current handler.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tether_core::Scheduler;

/// Record `a`, schedule `b` with zero delay, record `c`, then drain the loop
pub(crate) fn run(scheduler: &Scheduler) -> anyhow::Result<Vec<&'static str>> {
    let seen = Rc::new(RefCell::new(Vec::new()));

    seen.borrow_mut().push("a");
    let later = seen.clone();
    scheduler.schedule_after(Duration::ZERO, move |_| later.borrow_mut().push("b"));
    seen.borrow_mut().push("c");

    scheduler.run()?;
    let seen = seen.borrow().clone();
    Ok(seen)
}

pub fn execute(scheduler: &Scheduler) -> anyhow::Result<()> {
    let seen = run(scheduler)?;
    println!("{}", seen.join(", "));
    Ok(())
}
