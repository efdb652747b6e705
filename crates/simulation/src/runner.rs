//! Deterministic simulation runner.
//!
//! Operator inputs are scheduled on the same queue as timers, and the
//! coordinator's actions are applied inline. Timers fire only when simulated
//! time is advanced past them.

use crate::event_queue::EventKey;
use quorumsim_bft::{ConfigError, PbftConfig, PbftState};
use quorumsim_core::{Action, Event, StateMachine, TimerId};
use quorumsim_types::{Block, Phase, Value};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Deterministic simulation runner.
///
/// Processes events in deterministic order and executes actions.
/// Given the same configuration, produces identical results every run.
pub struct SimulationRunner {
    /// The coordinator under simulation.
    state: PbftState,

    /// Global event queue, ordered deterministically.
    event_queue: BTreeMap<EventKey, Event>,

    /// Sequence counter for deterministic ordering.
    sequence: u64,

    /// Current simulation time.
    now: Duration,

    /// Timer registry for cancellation support.
    timers: HashMap<TimerId, EventKey>,

    /// Blocks reported through `Action::EmitCommittedBlock`, in order.
    committed: Vec<Block>,

    /// Statistics.
    stats: SimulationStats,
}

/// Statistics collected during simulation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SimulationStats {
    /// Total events processed.
    pub events_processed: u64,
    /// Events processed by priority.
    pub events_by_priority: [u64; 2],
    /// Total actions generated.
    pub actions_generated: u64,
    /// Timers set.
    pub timers_set: u64,
    /// Timers cancelled before firing.
    pub timers_cancelled: u64,
    /// Blocks committed.
    pub blocks_committed: u64,
    /// Attempts that ended without quorum.
    pub quorum_failures: u64,
    /// View changes observed.
    pub view_changes: u64,
}

/// Result of one automatic round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    /// The committed block, or `None` if every attempt failed.
    pub block: Option<Block>,
    /// Values submitted during the round.
    pub attempts: u32,
    /// View changes triggered during the round.
    pub view_changes: u64,
}

impl SimulationRunner {
    /// Create a new simulation runner for the given configuration.
    pub fn new(config: PbftConfig) -> Result<Self, ConfigError> {
        let seed = config.seed;
        let state = PbftState::new(config)?;

        info!(
            nodes = state.replicas().len(),
            byzantine = state.byzantine_count(),
            seed,
            "Created simulation runner"
        );

        Ok(Self {
            state,
            event_queue: BTreeMap::new(),
            sequence: 0,
            now: Duration::ZERO,
            timers: HashMap::new(),
            committed: Vec::new(),
            stats: SimulationStats::default(),
        })
    }

    /// Get simulation statistics.
    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    /// Get current simulation time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// The coordinator under simulation.
    pub fn state(&self) -> &PbftState {
        &self.state
    }

    /// Blocks observed through committed-block notifications.
    pub fn committed_blocks(&self) -> &[Block] {
        &self.committed
    }

    /// Number of events waiting in the queue.
    pub fn pending_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Time of the next queued event, if any.
    pub fn next_event_time(&self) -> Option<Duration> {
        self.event_queue.first_key_value().map(|(key, _)| key.time)
    }

    /// Schedule an event `delay` after the current time.
    pub fn schedule_event(&mut self, delay: Duration, event: Event) -> EventKey {
        let time = self.now + delay;
        self.sequence += 1;
        let key = EventKey::new(time, &event, self.sequence);
        self.event_queue.insert(key, event);
        key
    }

    /// Replace the coordinator configuration.
    ///
    /// Runs at the current instant, outside the queue.
    pub fn configure(&mut self, config: PbftConfig) -> Result<(), ConfigError> {
        let actions = self.state.configure(config)?;
        self.stats.actions_generated += actions.len() as u64;
        for action in actions {
            self.process_action(action);
        }
        Ok(())
    }

    /// Start a round now.
    pub fn start_round(&mut self) {
        self.input(Event::StartRound);
    }

    /// Submit a value now.
    pub fn submit_value(&mut self, value: impl Into<Value>) {
        self.input(Event::SubmitValue {
            value: value.into(),
        });
    }

    /// Run one phase now (step mode).
    pub fn advance(&mut self) {
        self.input(Event::Advance);
    }

    /// Process all events up to and including `end_time`, then move the clock
    /// to `end_time`.
    pub fn run_until(&mut self, end_time: Duration) {
        trace!(
            end_time_secs = end_time.as_secs_f64(),
            "Running simulation step"
        );

        while let Some((&key, _)) = self.event_queue.first_key_value() {
            if key.time > end_time {
                debug!(
                    remaining_events = self.event_queue.len(),
                    "Time limit reached"
                );
                break;
            }
            self.step();
        }
        if end_time > self.now {
            self.now = end_time;
        }

        trace!(
            events_processed = self.stats.events_processed,
            actions_generated = self.stats.actions_generated,
            final_time = ?self.now,
            "Simulation step complete"
        );
    }

    /// Process queued events until the queue is empty.
    pub fn run_until_idle(&mut self) {
        while self.step() {}
    }

    /// Process the next queued event. Returns false if the queue was empty.
    pub fn step(&mut self) -> bool {
        let Some((key, event)) = self.event_queue.pop_first() else {
            return false;
        };
        self.now = key.time;
        if let Event::ViewChangeTimer { generation } = event {
            self.timers
                .remove(&TimerId::ViewChangeResume { generation });
        }

        trace!(time = ?self.now, event = event.type_name(), "Processing event");

        self.stats.events_processed += 1;
        self.stats.events_by_priority[event.priority() as usize] += 1;

        self.state.set_time(self.now);
        let actions = self.state.handle(event);
        self.stats.actions_generated += actions.len() as u64;

        for action in actions {
            self.process_action(action);
        }
        true
    }

    /// Drive one round to completion: start it, submit `value`, and keep
    /// resubmitting after failures until a block is committed or
    /// `max_attempts` values have been submitted.
    ///
    /// View-change delays elapse in simulated time. In step mode every
    /// intermediate phase is advanced automatically.
    pub fn run_round(&mut self, value: impl Into<Value>, max_attempts: u32) -> RoundOutcome {
        let value = value.into();
        let decided_before = self.state.decisions().len();
        let view_changes_before = self.stats.view_changes;
        let mut attempts = 0;

        self.start_round();

        while attempts < max_attempts {
            if self.state.phase() == Phase::ViewChange {
                match self.next_event_time() {
                    Some(time) => self.run_until(time),
                    None => {
                        warn!("View change without a scheduled resumption");
                        break;
                    }
                }
                continue;
            }

            attempts += 1;
            self.submit_value(value.clone());
            while matches!(
                self.state.phase(),
                Phase::PrePrepare | Phase::Prepare | Phase::Commit
            ) {
                self.advance();
            }

            if self.state.decisions().len() > decided_before {
                break;
            }
        }

        let block = self.state.decisions().as_slice().get(decided_before).cloned();
        let outcome = RoundOutcome {
            block,
            attempts,
            view_changes: self.stats.view_changes - view_changes_before,
        };

        info!(
            attempts = outcome.attempts,
            view_changes = outcome.view_changes,
            decided = outcome.block.is_some(),
            "Round finished"
        );
        outcome
    }

    fn input(&mut self, event: Event) {
        self.schedule_event(Duration::ZERO, event);
        self.run_until(self.now);
    }

    /// Process an action emitted by the coordinator.
    fn process_action(&mut self, action: Action) {
        match action {
            Action::SetTimer { id, duration } => {
                let event = id.into_event();
                let key = self.schedule_event(duration, event);
                self.timers.insert(id, key);
                self.stats.timers_set += 1;
            }

            Action::CancelTimer { id } => {
                if let Some(key) = self.timers.remove(&id) {
                    self.event_queue.remove(&key);
                    self.stats.timers_cancelled += 1;
                }
            }

            Action::EmitCommittedBlock { block } => {
                debug!(number = block.number, value = %block.value, "Block committed");
                self.stats.blocks_committed += 1;
                self.committed.push(block);
            }

            Action::EmitQuorumFailure {
                view,
                failure_count,
            } => {
                debug!(view, failure_count, "Quorum failure");
                self.stats.quorum_failures += 1;
            }

            Action::EmitViewChange { view, .. } => {
                debug!(view, "View change");
                self.stats.view_changes += 1;
            }
        }
    }
}
