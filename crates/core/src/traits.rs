//! State machine trait.

use crate::{Action, Event};
use std::time::Duration;

/// A synchronous, deterministic state machine driven by a runner.
pub trait StateMachine {
    /// Process one event and return the actions the runner must perform.
    fn handle(&mut self, event: Event) -> Vec<Action>;

    /// Inform the state machine of the current time.
    fn set_time(&mut self, now: Duration);

    /// The last time passed to [`StateMachine::set_time`].
    fn now(&self) -> Duration;
}
