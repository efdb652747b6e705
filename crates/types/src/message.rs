//! Protocol messages recorded in the message log.

use crate::{NodeId, Recipient, Sender};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    PrePrepare,
    Prepare,
    Commit,
    /// Quorum failure notice.
    Error,
    /// View change notice.
    ViewChange,
}

impl MessageKind {
    /// Name as shown to operators.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::PrePrepare => "pre-prepare",
            MessageKind::Prepare => "prepare",
            MessageKind::Commit => "commit",
            MessageKind::Error => "error",
            MessageKind::ViewChange => "view-change",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One directed or broadcast protocol message.
///
/// Messages are immutable once appended to the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub from: Sender,
    pub to: Recipient,
    pub kind: MessageKind,
    /// Token carried, or diagnostic text for error / view-change messages.
    pub value: String,
    /// View the message was issued under.
    pub view: u64,
}

impl Message {
    /// A replica-to-replica message.
    pub fn directed(
        from: NodeId,
        to: NodeId,
        kind: MessageKind,
        value: impl Into<String>,
        view: u64,
    ) -> Self {
        Self {
            from: Sender::Node(from),
            to: Recipient::Node(to),
            kind,
            value: value.into(),
            view,
        }
    }

    /// A coordinator-originated message.
    pub fn system(to: Recipient, kind: MessageKind, text: impl Into<String>, view: u64) -> Self {
        Self {
            from: Sender::System,
            to,
            kind,
            value: text.into(),
            view,
        }
    }

    /// Whether `id` sent this message or is among its recipients.
    pub fn involves(&self, id: NodeId) -> bool {
        self.from == Sender::Node(id) || self.to.includes(id)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[view {}] {} -> {} {}: {}",
            self.view, self.from, self.to, self.kind, self.value
        )
    }
}
