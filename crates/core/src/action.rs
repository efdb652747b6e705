//! Action types for the deterministic state machine.

use crate::TimerId;
use quorumsim_types::{Block, Message};
use std::time::Duration;

/// Actions the state machine wants to perform.
///
/// Actions are **commands** - they describe something to do.
/// The runner executes actions and may convert results back into events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    // ═══════════════════════════════════════════════════════════════════════
    // Timers
    // ═══════════════════════════════════════════════════════════════════════
    /// Set a timer to fire after a duration.
    SetTimer { id: TimerId, duration: Duration },

    /// Cancel a previously set timer.
    CancelTimer { id: TimerId },

    // ═══════════════════════════════════════════════════════════════════════
    // External Notifications
    // ═══════════════════════════════════════════════════════════════════════
    /// A block was appended to the decision log.
    EmitCommittedBlock { block: Block },

    /// A round attempt failed to reach quorum.
    EmitQuorumFailure { view: u64, failure_count: u32 },

    /// A view change was triggered.
    EmitViewChange { view: u64, notice: Message },
}

impl Action {
    /// Get the action type name for telemetry.
    pub fn type_name(&self) -> &'static str {
        match self {
            // Timers
            Action::SetTimer { .. } => "SetTimer",
            Action::CancelTimer { .. } => "CancelTimer",

            // External Notifications
            Action::EmitCommittedBlock { .. } => "EmitCommittedBlock",
            Action::EmitQuorumFailure { .. } => "EmitQuorumFailure",
            Action::EmitViewChange { .. } => "EmitViewChange",
        }
    }
}
