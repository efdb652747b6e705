//! Append-only message and decision logs.

use quorumsim_types::{Block, Message, MessageKind, NodeId, Value};

/// Every protocol message emitted during the simulation, in emission order.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    entries: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.entries.push(message);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter()
    }

    /// Messages sent by, addressed to, or broadcast to `id`.
    pub fn for_node(&self, id: NodeId) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter(move |m| m.involves(id))
    }

    /// Number of messages of one kind.
    pub fn count_kind(&self, kind: MessageKind) -> usize {
        self.entries.iter().filter(|m| m.kind == kind).count()
    }

    /// Messages appended at or after position `mark`.
    pub fn since(&self, mark: usize) -> &[Message] {
        self.entries.get(mark..).unwrap_or(&[])
    }
}

impl Extend<Message> for MessageLog {
    fn extend<I: IntoIterator<Item = Message>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

/// Committed decisions ("the chain").
#[derive(Debug, Clone, Default)]
pub struct DecisionLog {
    blocks: Vec<Block>,
}

impl DecisionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a decision. Its number is the log length before the append.
    pub fn append(&mut self, value: Value, is_subverted: bool, view: u64, leader: NodeId) -> &Block {
        let number = self.blocks.len() as u64;
        self.blocks.push(Block {
            number,
            value,
            is_subverted,
            view,
            leader,
        });
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn last(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn as_slice(&self) -> &[Block] {
        &self.blocks
    }

    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    /// Number of decisions the Byzantine nodes steered away from the client value.
    pub fn subverted_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_subverted).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorumsim_types::Recipient;

    #[test]
    fn test_block_numbers_follow_length() {
        let mut log = DecisionLog::new();
        for i in 0..5u64 {
            let block = log.append(Value::from("A"), i % 2 == 1, 0, NodeId(0));
            assert_eq!(block.number, i);
        }
        let numbers: Vec<u64> = log.iter().map(|b| b.number).collect();
        assert_eq!(numbers, vec![0, 1, 2, 3, 4]);
        assert_eq!(log.subverted_count(), 2);
    }

    #[test]
    fn test_message_filter_by_node() {
        let mut log = MessageLog::new();
        log.push(Message::directed(NodeId(0), NodeId(1), MessageKind::PrePrepare, "A", 0));
        log.push(Message::directed(NodeId(2), NodeId(3), MessageKind::Prepare, "A", 0));
        log.push(Message::system(
            Recipient::Broadcast,
            MessageKind::ViewChange,
            "View changed to 1",
            1,
        ));

        assert_eq!(log.for_node(NodeId(0)).count(), 2);
        assert_eq!(log.for_node(NodeId(1)).count(), 2);
        assert_eq!(log.for_node(NodeId(3)).count(), 2);
        assert_eq!(log.count_kind(MessageKind::Prepare), 1);
        assert_eq!(log.since(2).len(), 1);
        assert!(log.since(10).is_empty());
    }
}
