//! Event types for the deterministic state machine.

use quorumsim_types::Value;

/// Priority levels for event ordering within the same timestamp.
///
/// Events at the same simulation time are processed in priority order.
/// Lower values = higher priority (processed first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EventPriority {
    /// Timer events: scheduled by the state machine itself.
    Timer = 0,

    /// Client events: external inputs from the operator.
    Client = 1,
}

/// All possible events the coordinator can receive.
///
/// Events are **passive data** - they describe something that happened.
/// The state machine processes events and returns actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // ═══════════════════════════════════════════════════════════════════════
    // Timers (priority: Timer)
    // ═══════════════════════════════════════════════════════════════════════
    /// The view-change delay elapsed.
    ///
    /// Ignored unless `generation` matches the pending resumption.
    ViewChangeTimer { generation: u64 },

    // ═══════════════════════════════════════════════════════════════════════
    // Client Requests (priority: Client)
    // ═══════════════════════════════════════════════════════════════════════
    /// Begin a new round: reset replicas and rotate the leader.
    StartRound,

    /// The client submits the value to agree on. Only accepted in PROPOSE.
    SubmitValue { value: Value },

    /// Run the next phase when the coordinator is in step mode.
    Advance,
}

impl Event {
    /// Get the priority for this event type.
    pub fn priority(&self) -> EventPriority {
        match self {
            Event::ViewChangeTimer { .. } => EventPriority::Timer,
            Event::StartRound | Event::SubmitValue { .. } | Event::Advance => {
                EventPriority::Client
            }
        }
    }

    /// Check if this is a client event (from the operator).
    pub fn is_client(&self) -> bool {
        self.priority() == EventPriority::Client
    }

    /// Get the event type name for telemetry.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::ViewChangeTimer { .. } => "ViewChangeTimer",
            Event::StartRound => "StartRound",
            Event::SubmitValue { .. } => "SubmitValue",
            Event::Advance => "Advance",
        }
    }
}
