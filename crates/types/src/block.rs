//! Decision log entries.

use crate::{NodeId, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One committed decision.
///
/// Appended exactly once per successful round and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Sequence index; equals the decision log length at append time.
    pub number: u64,
    /// Quorum-agreed value.
    pub value: Value,
    /// True iff the agreed value differs from the value the client submitted.
    pub is_subverted: bool,
    /// View the decision was reached in.
    pub view: u64,
    /// Leader of the deciding round.
    pub leader: NodeId,
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block {}: {}", self.number, self.value)?;
        if self.is_subverted {
            f.write_str(" (subverted)")?;
        }
        Ok(())
    }
}
