//! Deterministic event ordering.

use quorumsim_core::{Event, EventPriority};
use std::time::Duration;

/// Key for the global event queue.
///
/// Events are ordered by:
/// 1. Time (earlier first)
/// 2. Priority (timers before client input at the same instant)
/// 3. Sequence (insertion order, for determinism)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    pub time: Duration,
    pub priority: EventPriority,
    pub sequence: u64,
}

impl EventKey {
    pub fn new(time: Duration, event: &Event, sequence: u64) -> Self {
        Self {
            time,
            priority: event.priority(),
            sequence,
        }
    }
}
