//! Subcommand implementations

pub mod fanout;
pub mod order;
pub mod read;

use anyhow::anyhow;
use std::cell::RefCell;
use std::rc::Rc;
use tether_core::Scheduler;

/// Slot a final handler writes into, read back once the loop has drained
pub(crate) struct Outcome<T>(Rc<RefCell<Option<T>>>);

impl<T: 'static> Outcome<T> {
    pub(crate) fn new() -> Self {
        Outcome(Rc::new(RefCell::new(None)))
    }

    /// Handler that stores its argument in this slot
    pub(crate) fn sink(&self) -> impl FnOnce(&Scheduler, T) + 'static {
        let slot = self.0.clone();
        move |_: &Scheduler, value: T| *slot.borrow_mut() = Some(value)
    }

    /// Run the loop to completion and take the stored value
    pub(crate) fn wait(self, scheduler: &Scheduler) -> anyhow::Result<T> {
        scheduler.run()?;
        let value = self.0.borrow_mut().take();
        value.ok_or_else(|| anyhow!("loop drained without delivering a result"))
    }
}
