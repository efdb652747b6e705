//! Identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a participant.
///
/// Assigned `0..N-1` when the node set is built and stable across rounds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Position of this node in an id-ordered node list.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node {}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        NodeId(id)
    }
}

/// Origin of a protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Sender {
    /// Emitted by a participant.
    Node(NodeId),
    /// Emitted by the coordinator itself (errors, view-change notices).
    System,
}

impl Sender {
    /// Raw numeric form, with `-1` as the system sentinel.
    pub fn as_raw(self) -> i64 {
        match self {
            Sender::Node(id) => i64::from(id.0),
            Sender::System => -1,
        }
    }

    /// The sending node, if this message came from a participant.
    pub fn node(self) -> Option<NodeId> {
        match self {
            Sender::Node(id) => Some(id),
            Sender::System => None,
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::Node(id) => id.fmt(f),
            Sender::System => f.write_str("system"),
        }
    }
}

/// Destination of a protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Recipient {
    /// A single participant.
    Node(NodeId),
    /// Every participant.
    Broadcast,
}

impl Recipient {
    /// Whether a message with this recipient is visible to `id`.
    pub fn includes(self, id: NodeId) -> bool {
        match self {
            Recipient::Node(to) => to == id,
            Recipient::Broadcast => true,
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::Node(id) => id.fmt(f),
            Recipient::Broadcast => f.write_str("all"),
        }
    }
}
