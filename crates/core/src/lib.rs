//! Core types for the quorumsim consensus architecture.
//!
//! This crate provides the seam between the consensus engine and the runners
//! that drive it:
//!
//! - [`Event`]: All possible inputs to the state machine
//! - [`Action`]: All possible outputs from the state machine
//! - [`EventPriority`]: Ordering priority for events at the same timestamp
//! - [`StateMachine`]: The trait the consensus engine implements
//!
//! # Architecture
//!
//! ```text
//! Events → StateMachine::handle() → Actions
//! ```
//!
//! The state machine is:
//! - **Synchronous**: No async, no .await
//! - **Deterministic**: Same state + event = same actions
//! - **Pure-ish**: Mutates self, but performs no I/O
//!
//! Timers are the only deferred work. The runner (simulated time or tokio)
//! schedules them on `Action::SetTimer` and feeds the matching event back.

mod action;
mod event;
mod traits;

pub use action::Action;
pub use event::{Event, EventPriority};
pub use traits::StateMachine;

/// Identifies a scheduled timer.
///
/// The view-change resumption carries the generation it was scheduled under,
/// so a runner can cancel exactly that timer and the state machine can reject
/// one that fires after being superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerId {
    /// Resume PROPOSE after a view change.
    ViewChangeResume { generation: u64 },
}

impl TimerId {
    /// The event delivered when this timer fires.
    pub fn into_event(self) -> Event {
        match self {
            TimerId::ViewChangeResume { generation } => Event::ViewChangeTimer { generation },
        }
    }
}
