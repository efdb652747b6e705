//! PBFT round coordinator.
//!
//! This module implements the round state machine as a synchronous,
//! event-driven model. The coordinator exclusively owns the replicas and both
//! logs; observers read them between transitions.

use crate::config::PbftConfig;
use crate::error::ConfigError;
use crate::fault::{Adversary, FaultModel, Inversion};
use crate::log::{DecisionLog, MessageLog};
use crate::quorum::{QuorumEvaluator, QuorumOutcome};
use crate::replica::{Replica, ReplicaView};
use crate::view_change::{FailureOutcome, ViewChangeState};
use quorumsim_core::{Action, Event, StateMachine};
use quorumsim_types::{
    is_byzantine_fault_tolerant, Block, Message, MessageKind, NodeId, Phase, Recipient, Value,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, trace, warn};

/// Diagnostic carried by per-node error messages on quorum failure.
pub const CONSENSUS_FAILED: &str = "Consensus failed";

/// Coordinator statistics for monitoring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PbftStats {
    /// Rounds started by the operator.
    pub rounds_started: u64,
    /// Values accepted in PROPOSE.
    pub attempts: u64,
    /// Blocks appended to the decision log.
    pub decisions: u64,
    /// Decisions whose value differs from the submitted one.
    pub subverted_decisions: u64,
    /// Attempts that failed to reach quorum.
    pub quorum_failures: u64,
    /// View changes triggered.
    pub view_changes: u64,
    /// Events dropped because the phase did not accept them.
    pub ignored_events: u64,
}

/// Consistent copy of everything an observer may display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PbftSnapshot {
    pub phase: Phase,
    pub view: u64,
    pub current_leader: NodeId,
    pub failure_count: u32,
    pub byzantine_count: usize,
    pub is_fault_tolerant: bool,
    pub replicas: Vec<ReplicaView>,
    pub messages: Vec<Message>,
    pub decisions: Vec<Block>,
    pub stats: PbftStats,
}

/// Summary of the coordinator whose size does not grow with the logs.
///
/// Published after every transition by long-running hosts; the full logs are
/// only copied into a [`PbftSnapshot`] on request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PbftStatus {
    pub phase: Phase,
    pub view: u64,
    pub current_leader: NodeId,
    pub failure_count: u32,
    pub byzantine_count: usize,
    pub is_fault_tolerant: bool,
    pub replicas: Vec<ReplicaView>,
    /// Length of the message log.
    pub message_count: usize,
    /// Length of the decision log.
    pub decision_count: usize,
    /// Most recently committed block.
    pub last_decision: Option<Block>,
    pub stats: PbftStats,
}

/// PBFT round coordinator.
///
/// # State Machine Flow
///
/// 1. **StartRound** → reset replicas, rotate leader, phase PROPOSE
/// 2. **SubmitValue** → leader proposes and fans out pre-prepare
/// 3. **PRE_PREPARE** → replicas already hold the relayed value
/// 4. **PREPARE** → every non-leader sends prepare to every other replica
/// 5. **COMMIT** → every replica sends commit; quorum is evaluated
///    - quorum: append block, back to IDLE
///    - no quorum: retry in PROPOSE, or view change after repeated failure
///
/// Steps 3-5 run inside the `SubmitValue` call unless auto-advance is off, in
/// which case each one waits for `Event::Advance`.
pub struct PbftState {
    config: PbftConfig,
    replicas: Vec<Replica>,
    fault_model: FaultModel,
    adversary: Arc<dyn Adversary>,
    quorum: QuorumEvaluator,
    phase: Phase,
    current_leader: NodeId,
    view_change: ViewChangeState,
    /// Value the client submitted for the attempt in flight.
    submitted: Option<Value>,
    /// Value the leader broadcast in pre-prepare for the attempt in flight.
    relayed: Option<Value>,
    messages: MessageLog,
    decisions: DecisionLog,
    stats: PbftStats,
    now: Duration,
}

impl std::fmt::Debug for PbftState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PbftState")
            .field("phase", &self.phase)
            .field("view", &self.view_change.view())
            .field("leader", &self.current_leader)
            .field("nodes", &self.replicas.len())
            .field("decisions", &self.decisions.len())
            .field("now", &self.now)
            .finish()
    }
}

impl PbftState {
    /// Create a coordinator with a freshly built node set.
    pub fn new(config: PbftConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let adversary: Arc<dyn Adversary> = Arc::new(Inversion::new(
            config.value_domain.0.clone(),
            config.value_domain.1.clone(),
        ));
        let mut state = Self {
            fault_model: FaultModel::new(config.seed),
            adversary,
            quorum: QuorumEvaluator::new(config.node_count),
            replicas: Vec::new(),
            phase: Phase::Idle,
            current_leader: NodeId(0),
            view_change: ViewChangeState::new(
                config.max_consecutive_failures,
                config.view_change_delay,
            ),
            submitted: None,
            relayed: None,
            messages: MessageLog::new(),
            decisions: DecisionLog::new(),
            stats: PbftStats::default(),
            now: Duration::ZERO,
            config,
        };
        state.rebuild_replicas();

        info!(
            nodes = state.replicas.len(),
            byzantine = state.byzantine_count(),
            tolerated = state.quorum.fault_tolerance(),
            threshold = state.quorum.threshold(),
            "Created PBFT coordinator"
        );
        Ok(state)
    }

    /// Replace the configuration and rebuild the node set.
    ///
    /// Aborts any round in flight: the phase returns to IDLE, the failure
    /// counter is cleared and a pending view-change resumption is cancelled.
    /// Message log, decision log and view survive.
    pub fn configure(&mut self, config: PbftConfig) -> Result<Vec<Action>, ConfigError> {
        config.validate()?;

        let actions = self.cancel_pending_resumption();

        if config.seed != self.config.seed {
            self.fault_model = FaultModel::new(config.seed);
        }
        if config.value_domain != self.config.value_domain {
            self.adversary = Arc::new(Inversion::new(
                config.value_domain.0.clone(),
                config.value_domain.1.clone(),
            ));
        }
        self.view_change
            .set_limits(config.max_consecutive_failures, config.view_change_delay);
        self.view_change.reset_failures();
        self.quorum = QuorumEvaluator::new(config.node_count);
        self.config = config;

        if self.phase != Phase::Idle {
            info!(phase = %self.phase, "Reconfiguration aborted round in flight");
        }
        self.phase = Phase::Idle;
        self.clear_attempt();
        self.rebuild_replicas();

        info!(
            nodes = self.replicas.len(),
            byzantine = self.byzantine_count(),
            tolerated = self.quorum.fault_tolerance(),
            threshold = self.quorum.threshold(),
            "Reconfigured PBFT coordinator"
        );

        Ok(actions)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Operator API
    // ═══════════════════════════════════════════════════════════════════════════

    /// Begin a round. Equivalent to handling `Event::StartRound`.
    pub fn start_round(&mut self) -> Vec<Action> {
        self.handle(Event::StartRound)
    }

    /// Submit the client value. Equivalent to handling `Event::SubmitValue`.
    pub fn submit_value(&mut self, value: impl Into<Value>) -> Vec<Action> {
        self.handle(Event::SubmitValue {
            value: value.into(),
        })
    }

    /// Run the next phase in step mode. Equivalent to handling `Event::Advance`.
    pub fn advance(&mut self) -> Vec<Action> {
        self.handle(Event::Advance)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn config(&self) -> &PbftConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn view(&self) -> u64 {
        self.view_change.view()
    }

    pub fn current_leader(&self) -> NodeId {
        self.current_leader
    }

    pub fn failure_count(&self) -> u32 {
        self.view_change.failure_count()
    }

    /// Replicas in ascending id order.
    pub fn replicas(&self) -> &[Replica] {
        &self.replicas
    }

    pub fn replica(&self, id: NodeId) -> Option<&Replica> {
        self.replicas.get(id.index())
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    pub fn decisions(&self) -> &DecisionLog {
        &self.decisions
    }

    /// Messages sent by, addressed to, or broadcast to `id`.
    pub fn messages_for(&self, id: NodeId) -> Vec<&Message> {
        self.messages.for_node(id).collect()
    }

    pub fn byzantine_count(&self) -> usize {
        self.replicas.iter().filter(|r| r.is_byzantine()).count()
    }

    /// Whether the Byzantine count is within `floor((N - 1) / 3)`.
    pub fn is_fault_tolerant(&self) -> bool {
        is_byzantine_fault_tolerant(self.byzantine_count(), self.replicas.len())
    }

    pub fn quorum(&self) -> &QuorumEvaluator {
        &self.quorum
    }

    pub fn stats(&self) -> PbftStats {
        self.stats
    }

    /// Whether a view-change resumption is scheduled.
    pub fn has_pending_resumption(&self) -> bool {
        self.view_change.has_pending()
    }

    pub fn status(&self) -> PbftStatus {
        PbftStatus {
            phase: self.phase,
            view: self.view(),
            current_leader: self.current_leader,
            failure_count: self.failure_count(),
            byzantine_count: self.byzantine_count(),
            is_fault_tolerant: self.is_fault_tolerant(),
            replicas: self.replicas.iter().map(Replica::to_view).collect(),
            message_count: self.messages.len(),
            decision_count: self.decisions.len(),
            last_decision: self.decisions.last().cloned(),
            stats: self.stats,
        }
    }

    /// Full copy including both logs.
    pub fn snapshot(&self) -> PbftSnapshot {
        PbftSnapshot {
            phase: self.phase,
            view: self.view(),
            current_leader: self.current_leader,
            failure_count: self.failure_count(),
            byzantine_count: self.byzantine_count(),
            is_fault_tolerant: self.is_fault_tolerant(),
            replicas: self.replicas.iter().map(Replica::to_view).collect(),
            messages: self.messages.as_slice().to_vec(),
            decisions: self.decisions.as_slice().to_vec(),
            stats: self.stats,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Event Handlers
    // ═══════════════════════════════════════════════════════════════════════════

    #[instrument(level = "debug", skip(self), fields(view = self.view_change.view()))]
    fn on_start_round(&mut self) -> Vec<Action> {
        let actions = self.cancel_pending_resumption();

        for replica in &mut self.replicas {
            replica.reset();
        }
        if self.config.redraw_each_round {
            self.redraw_byzantine();
        }

        let n = self.replicas.len() as u32;
        self.current_leader = NodeId((self.current_leader.0 + 1) % n);
        self.assign_leader();

        self.clear_attempt();
        self.phase = Phase::Propose;
        self.stats.rounds_started += 1;

        info!(
            leader = self.current_leader.0,
            view = self.view(),
            byzantine = self.byzantine_count(),
            "Round started"
        );
        actions
    }

    #[instrument(level = "debug", skip(self), fields(view = self.view_change.view()))]
    fn on_submit_value(&mut self, value: Value) -> Vec<Action> {
        if self.phase != Phase::Propose {
            debug!(phase = %self.phase, %value, "Ignoring value outside PROPOSE");
            self.stats.ignored_events += 1;
            return vec![];
        }

        let n = self.replicas.len();
        let leader = self.current_leader.index();

        self.replicas[leader].propose(&value);
        let fan_out = self.replicas[leader].pre_prepare(&value, n);
        let relayed = match self.replicas[leader].value() {
            Some(v) => v.clone(),
            None => value.clone(),
        };

        // Delivery is synchronous: followers hold the relayed value right away.
        for replica in self.replicas.iter_mut().filter(|r| !r.is_leader()) {
            replica.pre_prepare(&relayed, n);
        }
        self.messages.extend(fan_out);

        info!(
            leader = self.current_leader.0,
            submitted = %value,
            relayed = %relayed,
            "Leader broadcast pre-prepare"
        );

        self.submitted = Some(value);
        self.relayed = Some(relayed);
        self.phase = Phase::PrePrepare;
        self.stats.attempts += 1;

        if !self.config.auto_advance {
            return vec![];
        }

        let mut actions = Vec::new();
        while matches!(
            self.phase,
            Phase::PrePrepare | Phase::Prepare | Phase::Commit
        ) {
            actions.extend(self.step_phase());
        }
        actions
    }

    fn on_advance(&mut self) -> Vec<Action> {
        match self.phase {
            Phase::PrePrepare | Phase::Prepare | Phase::Commit => self.step_phase(),
            _ => {
                debug!(phase = %self.phase, "Ignoring advance outside an intermediate phase");
                self.stats.ignored_events += 1;
                vec![]
            }
        }
    }

    fn on_view_change_timer(&mut self, generation: u64) -> Vec<Action> {
        if self.phase != Phase::ViewChange {
            // Consume the pending marker anyway so it cannot fire later.
            self.view_change.on_resume_timer(generation);
            debug!(phase = %self.phase, generation, "View change timer fired outside VIEW_CHANGE");
            self.stats.ignored_events += 1;
            return vec![];
        }
        if !self.view_change.on_resume_timer(generation) {
            self.stats.ignored_events += 1;
            return vec![];
        }

        self.phase = Phase::Propose;
        info!(
            view = self.view(),
            leader = self.current_leader.0,
            "View change complete, resuming PROPOSE"
        );
        vec![]
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Phases
    // ═══════════════════════════════════════════════════════════════════════════

    /// Execute exactly one intermediate phase.
    fn step_phase(&mut self) -> Vec<Action> {
        match self.phase {
            Phase::PrePrepare => {
                // Followers were updated by the leader's fan-out.
                self.phase = Phase::Prepare;
                trace!("PRE_PREPARE complete");
                vec![]
            }
            Phase::Prepare => {
                self.run_prepare();
                vec![]
            }
            Phase::Commit => self.run_commit(),
            _ => vec![],
        }
    }

    fn run_prepare(&mut self) {
        let Some(relayed) = self.relayed.clone() else {
            warn!("PREPARE without a relayed value");
            self.phase = Phase::Idle;
            return;
        };
        let n = self.replicas.len();
        let before = self.messages.len();

        for replica in self.replicas.iter_mut().filter(|r| !r.is_leader()) {
            let sent = replica.prepare(&relayed, n);
            self.messages.extend(sent);
        }

        debug!(messages = self.messages.len() - before, "PREPARE complete");
        self.phase = Phase::Commit;
    }

    fn run_commit(&mut self) -> Vec<Action> {
        let (Some(submitted), Some(relayed)) = (self.submitted.clone(), self.relayed.clone())
        else {
            warn!("COMMIT without a submitted value");
            self.phase = Phase::Idle;
            return vec![];
        };
        let n = self.replicas.len();
        let before = self.messages.len();

        // The leader honestly holds the client value; followers hold what the
        // leader relayed.
        for replica in self.replicas.iter_mut() {
            let held = if replica.is_leader() {
                &submitted
            } else {
                &relayed
            };
            let sent = replica.commit(held, n);
            self.messages.extend(sent);
        }

        debug!(messages = self.messages.len() - before, "COMMIT complete");

        let outcome = self.quorum.evaluate(self.replicas.iter().map(Replica::value));
        match outcome {
            QuorumOutcome::Reached { value, votes } => {
                self.on_quorum_reached(value, votes, submitted)
            }
            QuorumOutcome::NoQuorum { leading } => self.on_quorum_failed(leading),
        }
    }

    fn on_quorum_reached(&mut self, value: Value, votes: usize, submitted: Value) -> Vec<Action> {
        let is_subverted = value != submitted;
        let view = self.view();
        let block = self
            .decisions
            .append(value, is_subverted, view, self.current_leader)
            .clone();

        self.view_change.record_success();
        self.clear_attempt();
        self.phase = Phase::Idle;
        self.stats.decisions += 1;
        if is_subverted {
            self.stats.subverted_decisions += 1;
            warn!(
                number = block.number,
                value = %block.value,
                %submitted,
                votes,
                "Byzantine nodes forced a different decision"
            );
        } else {
            info!(
                number = block.number,
                value = %block.value,
                votes,
                threshold = self.quorum.threshold(),
                "Quorum reached, block committed"
            );
        }

        vec![Action::EmitCommittedBlock { block }]
    }

    fn on_quorum_failed(&mut self, leading: Option<(Value, usize)>) -> Vec<Action> {
        let view = self.view();
        for id in self.replicas.iter().map(Replica::id) {
            self.messages.push(Message::system(
                Recipient::Node(id),
                MessageKind::Error,
                CONSENSUS_FAILED,
                view,
            ));
        }
        self.stats.quorum_failures += 1;

        warn!(
            view,
            leading = ?leading,
            threshold = self.quorum.threshold(),
            "Consensus failed"
        );

        match self.view_change.record_failure() {
            FailureOutcome::Retry { failure_count } => {
                self.reset_replicas();
                self.clear_attempt();
                self.phase = Phase::Propose;
                vec![Action::EmitQuorumFailure {
                    view,
                    failure_count,
                }]
            }
            FailureOutcome::ViewChange {
                new_view,
                failure_count,
                timer,
                delay,
            } => {
                let notice = Message::system(
                    Recipient::Broadcast,
                    MessageKind::ViewChange,
                    format!("View changed to {new_view}"),
                    new_view,
                );
                self.messages.push(notice.clone());

                for replica in &mut self.replicas {
                    replica.reset();
                    replica.set_view(new_view);
                }
                if self.config.rotate_leader_on_view_change {
                    let n = self.replicas.len() as u64;
                    self.current_leader = NodeId((new_view % n) as u32);
                    self.assign_leader();
                }
                self.clear_attempt();
                self.phase = Phase::ViewChange;
                self.stats.view_changes += 1;

                vec![
                    Action::EmitQuorumFailure {
                        view,
                        failure_count,
                    },
                    Action::EmitViewChange {
                        view: new_view,
                        notice,
                    },
                    Action::SetTimer {
                        id: timer,
                        duration: delay,
                    },
                ]
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Helpers
    // ═══════════════════════════════════════════════════════════════════════════

    /// `PbftConfig::validate` caps the node count at `MAX_NODE_COUNT`, so every
    /// index below fits in a `NodeId`.
    fn rebuild_replicas(&mut self) {
        let flags = self.fault_model.assign(&self.config);
        let view = self.view();
        self.replicas = flags
            .into_iter()
            .enumerate()
            .map(|(i, is_byzantine)| {
                Replica::new(NodeId(i as u32), is_byzantine, view, self.adversary.clone())
            })
            .collect();

        // The first round rotates leadership onto node 0.
        self.current_leader = NodeId(self.replicas.len() as u32 - 1);
        self.assign_leader();
    }

    fn redraw_byzantine(&mut self) {
        let flags = self.fault_model.assign(&self.config);
        for (replica, is_byzantine) in self.replicas.iter_mut().zip(flags) {
            replica.set_byzantine(is_byzantine);
        }
    }

    fn assign_leader(&mut self) {
        let leader = self.current_leader;
        for replica in &mut self.replicas {
            replica.set_leader(replica.id() == leader);
        }
    }

    fn reset_replicas(&mut self) {
        for replica in &mut self.replicas {
            replica.reset();
        }
    }

    fn clear_attempt(&mut self) {
        self.submitted = None;
        self.relayed = None;
    }

    fn cancel_pending_resumption(&mut self) -> Vec<Action> {
        self.view_change
            .cancel_pending()
            .map(|id| Action::CancelTimer { id })
            .into_iter()
            .collect()
    }
}

impl StateMachine for PbftState {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        trace!(event = event.type_name(), phase = %self.phase, "Handling event");
        match event {
            Event::StartRound => self.on_start_round(),
            Event::SubmitValue { value } => self.on_submit_value(value),
            Event::Advance => self.on_advance(),
            Event::ViewChangeTimer { generation } => self.on_view_change_timer(generation),
        }
    }

    fn set_time(&mut self, now: Duration) {
        self.now = now;
    }

    fn now(&self) -> Duration {
        self.now
    }
}
