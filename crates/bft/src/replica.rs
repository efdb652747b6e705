//! A single participant's round state.
//!
//! One [`Replica`] type serves both roles; the leader carries the
//! `is_leader` capability, which only changes the pre-prepare step (the
//! leader fans out, everyone else receives).

use crate::fault::Adversary;
use quorumsim_types::{Message, MessageKind, NodeId, NodePhase, Value};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{trace, warn};

/// One participant.
#[derive(Debug, Clone)]
pub struct Replica {
    id: NodeId,
    phase: NodePhase,
    value: Option<Value>,
    is_byzantine: bool,
    is_leader: bool,
    view: u64,
    adversary: Arc<dyn Adversary>,
}

/// Read-only copy of a replica's state for observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaView {
    pub id: NodeId,
    pub phase: NodePhase,
    pub value: Option<Value>,
    pub is_byzantine: bool,
    pub is_leader: bool,
    pub view: u64,
}

impl Replica {
    pub fn new(id: NodeId, is_byzantine: bool, view: u64, adversary: Arc<dyn Adversary>) -> Self {
        Self {
            id,
            phase: NodePhase::Idle,
            value: None,
            is_byzantine,
            is_leader: false,
            view,
            adversary,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn phase(&self) -> NodePhase {
        self.phase
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn is_byzantine(&self) -> bool {
        self.is_byzantine
    }

    pub fn is_leader(&self) -> bool {
        self.is_leader
    }

    pub fn view(&self) -> u64 {
        self.view
    }

    pub(crate) fn set_byzantine(&mut self, is_byzantine: bool) {
        self.is_byzantine = is_byzantine;
    }

    pub(crate) fn set_leader(&mut self, is_leader: bool) {
        self.is_leader = is_leader;
    }

    pub(crate) fn set_view(&mut self, view: u64) {
        self.view = view;
    }

    /// Snapshot of this replica.
    pub fn to_view(&self) -> ReplicaView {
        ReplicaView {
            id: self.id,
            phase: self.phase,
            value: self.value.clone(),
            is_byzantine: self.is_byzantine,
            is_leader: self.is_leader,
            view: self.view,
        }
    }

    /// Clear round-local state. Byzantine flag and view persist.
    pub fn reset(&mut self) {
        self.phase = NodePhase::Idle;
        self.value = None;
    }

    /// Leader accepts the client value.
    ///
    /// A Byzantine leader corrupts it here, so the very first broadcast
    /// already carries the corrupted value.
    pub fn propose(&mut self, value: &Value) {
        if !self.is_leader {
            warn!(node = self.id.0, "propose called on a non-leader replica");
            return;
        }
        if !self.enter(NodePhase::Proposed) {
            return;
        }
        self.value = Some(self.report(value));
        trace!(node = self.id.0, value = ?self.value, "Proposed");
    }

    /// Pre-prepare step.
    ///
    /// The leader fans out its stored value to every other replica; others
    /// store the received value and emit nothing.
    pub fn pre_prepare(&mut self, value: &Value, total_nodes: usize) -> Vec<Message> {
        if self.is_leader {
            let relayed = match &self.value {
                Some(stored) => stored.clone(),
                None => self.report(value),
            };
            if !self.enter(NodePhase::PrePrepared) {
                return vec![];
            }
            self.value = Some(relayed.clone());
            self.fan_out(MessageKind::PrePrepare, &relayed, total_nodes)
        } else {
            if self.enter(NodePhase::PrePrepared) {
                self.value = Some(value.clone());
            }
            vec![]
        }
    }

    /// Prepare step: report `value` (corrupted if Byzantine) to every other
    /// replica.
    pub fn prepare(&mut self, value: &Value, total_nodes: usize) -> Vec<Message> {
        self.vote(NodePhase::Prepared, MessageKind::Prepare, value, total_nodes)
    }

    /// Commit step: report `value` (corrupted if Byzantine) to every other
    /// replica.
    pub fn commit(&mut self, value: &Value, total_nodes: usize) -> Vec<Message> {
        self.vote(NodePhase::Committed, MessageKind::Commit, value, total_nodes)
    }

    fn vote(
        &mut self,
        next: NodePhase,
        kind: MessageKind,
        value: &Value,
        total_nodes: usize,
    ) -> Vec<Message> {
        if !self.enter(next) {
            return vec![];
        }
        let reported = self.report(value);
        let messages = self.fan_out(kind, &reported, total_nodes);
        self.value = Some(reported);
        messages
    }

    /// The value this replica reports when it honestly holds `honest`.
    fn report(&self, honest: &Value) -> Value {
        if self.is_byzantine {
            self.adversary.corrupt(honest)
        } else {
            honest.clone()
        }
    }

    /// Move forward to `next`. Refuses (and logs) any regression.
    fn enter(&mut self, next: NodePhase) -> bool {
        if next <= self.phase {
            warn!(
                node = self.id.0,
                current = %self.phase,
                requested = %next,
                "Ignoring phase regression"
            );
            return false;
        }
        self.phase = next;
        true
    }

    fn fan_out(&self, kind: MessageKind, value: &Value, total_nodes: usize) -> Vec<Message> {
        (0..total_nodes as u32)
            .map(NodeId)
            .filter(|to| *to != self.id)
            .map(|to| Message::directed(self.id, to, kind, value.as_str(), self.view))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::Inversion;
    use quorumsim_types::Recipient;

    fn replica(id: u32, is_byzantine: bool) -> Replica {
        Replica::new(NodeId(id), is_byzantine, 0, Arc::new(Inversion::default()))
    }

    fn a() -> Value {
        Value::from("A")
    }

    #[test]
    fn test_leader_fans_out_pre_prepare() {
        let mut leader = replica(0, false);
        leader.set_leader(true);
        leader.propose(&a());
        assert_eq!(leader.phase(), NodePhase::Proposed);

        let msgs = leader.pre_prepare(&a(), 4);
        assert_eq!(msgs.len(), 3);
        assert!(msgs.iter().all(|m| m.kind == MessageKind::PrePrepare));
        assert!(msgs.iter().all(|m| m.value == "A"));
        assert!(msgs.iter().all(|m| m.to != Recipient::Node(NodeId(0))));
        assert_eq!(leader.phase(), NodePhase::PrePrepared);
    }

    #[test]
    fn test_byzantine_leader_corrupts_at_propose() {
        let mut leader = replica(0, true);
        leader.set_leader(true);
        leader.propose(&a());
        assert_eq!(leader.value(), Some(&Value::from("B")));

        let msgs = leader.pre_prepare(&a(), 4);
        assert!(msgs.iter().all(|m| m.value == "B"));
    }

    #[test]
    fn test_follower_pre_prepare_is_silent() {
        let mut follower = replica(2, false);
        let msgs = follower.pre_prepare(&a(), 4);
        assert!(msgs.is_empty());
        assert_eq!(follower.phase(), NodePhase::PrePrepared);
        assert_eq!(follower.value(), Some(&a()));
    }

    #[test]
    fn test_prepare_and_commit_fan_out() {
        let mut follower = replica(1, false);
        follower.pre_prepare(&a(), 4);

        let prepares = follower.prepare(&a(), 4);
        assert_eq!(prepares.len(), 3);
        assert_eq!(follower.phase(), NodePhase::Prepared);
        let recipients: Vec<_> = prepares.iter().map(|m| m.to).collect();
        assert!(!recipients.contains(&Recipient::Node(NodeId(1))));

        let commits = follower.commit(&a(), 4);
        assert_eq!(commits.len(), 3);
        assert!(commits.iter().all(|m| m.kind == MessageKind::Commit));
        assert_eq!(follower.phase(), NodePhase::Committed);
    }

    #[test]
    fn test_byzantine_reports_inversion_every_time() {
        let mut follower = replica(1, true);
        follower.pre_prepare(&a(), 4);

        let prepares = follower.prepare(&a(), 4);
        assert!(prepares.iter().all(|m| m.value == "B"));
        let commits = follower.commit(&a(), 4);
        assert!(commits.iter().all(|m| m.value == "B"));
        assert_eq!(follower.value(), Some(&Value::from("B")));
    }

    #[test]
    fn test_phase_never_regresses() {
        let mut follower = replica(1, false);
        follower.pre_prepare(&a(), 4);
        follower.prepare(&a(), 4);
        follower.commit(&a(), 4);

        assert!(follower.prepare(&a(), 4).is_empty());
        assert!(follower.pre_prepare(&a(), 4).is_empty());
        assert_eq!(follower.phase(), NodePhase::Committed);

        follower.reset();
        assert_eq!(follower.phase(), NodePhase::Idle);
        assert_eq!(follower.value(), None);
    }

    #[test]
    fn test_non_leader_cannot_propose() {
        let mut follower = replica(1, false);
        follower.propose(&a());
        assert_eq!(follower.phase(), NodePhase::Idle);
        assert_eq!(follower.value(), None);
    }

    #[test]
    fn test_reset_keeps_flags() {
        let mut r = replica(3, true);
        r.set_view(5);
        r.pre_prepare(&a(), 4);
        r.reset();
        assert!(r.is_byzantine());
        assert_eq!(r.view(), 5);
    }

    #[test]
    fn test_single_node_fan_out_is_empty() {
        let mut solo = replica(0, false);
        solo.set_leader(true);
        solo.propose(&a());
        assert!(solo.pre_prepare(&a(), 1).is_empty());
        assert!(solo.commit(&a(), 1).is_empty());
        assert_eq!(solo.phase(), NodePhase::Committed);
    }
}
