//! Round-level and replica-local phase tags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Round-level phase of the coordinator.
///
/// Governs which external input is accepted: only [`Phase::Propose`] accepts
/// a submitted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// No round in flight.
    #[default]
    Idle,
    /// Waiting for the client value.
    Propose,
    /// Leader has fanned out its pre-prepare.
    PrePrepare,
    /// Replicas are exchanging prepare messages.
    Prepare,
    /// Replicas are exchanging commit messages.
    Commit,
    /// Waiting for the view-change resumption timer.
    ViewChange,
}

impl Phase {
    /// Name as shown to operators.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Propose => "propose",
            Phase::PrePrepare => "pre-prepare",
            Phase::Prepare => "prepare",
            Phase::Commit => "commit",
            Phase::ViewChange => "view-change",
        }
    }

    /// Whether a round is between PROPOSE and COMMIT.
    pub fn is_active(self) -> bool {
        !matches!(self, Phase::Idle | Phase::ViewChange)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replica-local phase.
///
/// Ordered: within a round a replica only ever moves to a greater variant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum NodePhase {
    #[default]
    Idle,
    Proposed,
    PrePrepared,
    Prepared,
    Committed,
}

impl NodePhase {
    /// Name as shown to operators.
    pub fn as_str(self) -> &'static str {
        match self {
            NodePhase::Idle => "idle",
            NodePhase::Proposed => "proposed",
            NodePhase::PrePrepared => "pre-prepared",
            NodePhase::Prepared => "prepared",
            NodePhase::Committed => "committed",
        }
    }
}

impl fmt::Display for NodePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_phase_ordering() {
        assert!(NodePhase::Idle < NodePhase::Proposed);
        assert!(NodePhase::Proposed < NodePhase::PrePrepared);
        assert!(NodePhase::PrePrepared < NodePhase::Prepared);
        assert!(NodePhase::Prepared < NodePhase::Committed);
    }

    #[test]
    fn test_phase_serde_names() {
        let json = serde_json::to_string(&Phase::PrePrepare).unwrap();
        assert_eq!(json, "\"pre-prepare\"");
        let json = serde_json::to_string(&NodePhase::PrePrepared).unwrap();
        assert_eq!(json, "\"pre-prepared\"");
    }

    #[test]
    fn test_active_phases() {
        assert!(!Phase::Idle.is_active());
        assert!(!Phase::ViewChange.is_active());
        assert!(Phase::Propose.is_active());
        assert!(Phase::Commit.is_active());
    }
}
