//! At-most-once handler guard
//!
//! Wraps a handler given to a source that might call it zero, one or many
//! times. The first call runs the handler; later calls are silently ignored.

use std::cell::Cell;
use std::fmt;

/// A handler that can run at most once
///
/// The consumed check and the handler hand-off happen in one step, so a
/// re-entrant call from inside the handler itself is also ignored.
pub struct OnceGuard<F> {
    handler: Cell<Option<F>>,
    consumed: Cell<bool>,
}

impl<F> OnceGuard<F> {
    /// Wrap `handler`
    pub fn new(handler: F) -> Self {
        Self {
            handler: Cell::new(Some(handler)),
            consumed: Cell::new(false),
        }
    }

    /// Claim the handler. Only the first call returns it.
    pub fn take(&self) -> Option<F> {
        if self.consumed.replace(true) {
            return None;
        }
        self.handler.take()
    }

    /// Invoke the handler if it has not run yet; returns its output
    pub fn call<A, R>(&self, args: A) -> Option<R>
    where
        F: FnOnce(A) -> R,
    {
        self.take().map(|handler| handler(args))
    }

    /// Whether the handler has been claimed
    pub fn is_consumed(&self) -> bool {
        self.consumed.get()
    }
}

impl<F> fmt::Debug for OnceGuard<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnceGuard")
            .field("consumed", &self.consumed.get())
            .finish_non_exhaustive()
    }
}

/// Wrap `handler` so that any number of calls runs it at most once.
///
/// Extra calls discard their arguments.
pub fn guard<A, F>(handler: F) -> impl Fn(A)
where
    F: FnOnce(A),
{
    let guard = OnceGuard::new(handler);
    move |args| {
        guard.call(args);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_guard_runs_at_most_once() {
        for calls in 0..4 {
            let count = Rc::new(Cell::new(0));
            let c = count.clone();
            let wrapped = guard(move |n: u32| c.set(c.get() + n));

            for _ in 0..calls {
                wrapped(1);
            }
            assert_eq!(count.get(), calls.min(1), "after {} calls", calls);
        }
    }

    #[test]
    fn test_first_arguments_win() {
        let seen = Rc::new(Cell::new(0));
        let s = seen.clone();
        let wrapped = guard(move |n: i32| s.set(n));

        wrapped(7);
        wrapped(9);
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn test_call_returns_output_once() {
        let guard = OnceGuard::new(|x: i32| x * 2);
        assert!(!guard.is_consumed());
        assert_eq!(guard.call(21), Some(42));
        assert!(guard.is_consumed());
        assert_eq!(guard.call(21), None);
        assert!(guard.take().is_none());
    }

    #[test]
    fn test_reentrant_call_is_ignored() {
        let count = Rc::new(Cell::new(0));
        let slot: Rc<Cell<Option<Rc<OnceGuard<Box<dyn FnOnce(())>>>>>> = Rc::new(Cell::new(None));

        let c = count.clone();
        let s = slot.clone();
        let handler: Box<dyn FnOnce(())> = Box::new(move |()| {
            c.set(c.get() + 1);
            if let Some(me) = s.take() {
                // Calls back into itself while running
                assert!(me.call(()).is_none());
            }
        });
        let guard = Rc::new(OnceGuard::new(handler));
        slot.set(Some(guard.clone()));

        guard.call(());
        assert_eq!(count.get(), 1);
    }
}
