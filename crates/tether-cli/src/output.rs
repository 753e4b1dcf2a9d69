//! Plain-text rendering of join outcomes.

use std::fmt::Display;
use tether_core::{JoinResult, OpResult};

/// One line per slot, in submission order.
pub fn slot_lines<T: Display>(slots: &[OpResult<T>], label: impl Fn(usize) -> String) -> Vec<String> {
    slots
        .iter()
        .enumerate()
        .map(|(i, slot)| match slot {
            Ok(value) => format!("{:>4}  ok    {}", label(i), value),
            Err(e) => format!("{:>4}  error {}", label(i), e),
        })
        .collect()
}

/// Render a whole join outcome, including the fail-fast failure case.
pub fn join_lines<T: Display>(result: &JoinResult<T>) -> Vec<String> {
    match result {
        Ok(slots) => slot_lines(slots, |i| format!("[{}]", i)),
        Err(e) => vec![format!("join failed: {}", e)],
    }
}
