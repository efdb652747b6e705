//! Coordinator configuration.

use crate::error::ConfigError;
use quorumsim_types::{NodeId, Value};
use std::time::Duration;

/// Node count used by the reference simulation.
pub const DEFAULT_NODE_COUNT: usize = 12;

/// Largest node set whose ids fit in a `NodeId`.
pub const MAX_NODE_COUNT: usize = u32::MAX as usize;

/// Default per-node probability of being Byzantine.
pub const DEFAULT_BYZANTINE_PROBABILITY: f64 = 0.2;

/// Delay between a view change and the automatic return to PROPOSE.
pub const DEFAULT_VIEW_CHANGE_DELAY: Duration = Duration::from_secs(2);

/// Consecutive quorum failures that trigger a view change.
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// How Byzantine flags are assigned when the node set is built.
#[derive(Debug, Clone, PartialEq)]
pub enum ByzantineAssignment {
    /// Every node is honest.
    AllHonest,
    /// Exactly these nodes are Byzantine.
    Fixed(Vec<NodeId>),
    /// Each node is Byzantine with this probability.
    Random { probability: f64 },
}

/// Configuration for the PBFT round coordinator.
///
/// Changing any structural field (node count, Byzantine policy) through
/// `PbftState::configure` rebuilds the node set and aborts the round in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct PbftConfig {
    /// Number of participants.
    pub node_count: usize,
    /// Per-node probability of being Byzantine.
    pub byzantine_probability: f64,
    /// Force every node honest regardless of probability.
    pub all_honest: bool,
    /// Pin exactly these nodes Byzantine (overrides the probability).
    pub fixed_byzantine: Option<Vec<NodeId>>,
    /// Redraw random Byzantine flags at every round start instead of only on
    /// reconfiguration.
    pub redraw_each_round: bool,
    /// Seed for the fault model RNG.
    pub seed: u64,
    /// Delay before PROPOSE resumes after a view change.
    pub view_change_delay: Duration,
    /// Consecutive quorum failures that trigger a view change.
    pub max_consecutive_failures: u32,
    /// Run PRE_PREPARE → PREPARE → COMMIT immediately after a value is
    /// submitted. When false, each phase waits for `Event::Advance`.
    pub auto_advance: bool,
    /// Move leadership to `view mod N` when a view change fires.
    pub rotate_leader_on_view_change: bool,
    /// Two-valued token domain used by the default inversion adversary.
    pub value_domain: (Value, Value),
}

impl Default for PbftConfig {
    fn default() -> Self {
        Self {
            node_count: DEFAULT_NODE_COUNT,
            byzantine_probability: DEFAULT_BYZANTINE_PROBABILITY,
            all_honest: false,
            fixed_byzantine: None,
            redraw_each_round: false,
            seed: 42,
            view_change_delay: DEFAULT_VIEW_CHANGE_DELAY,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            auto_advance: true,
            rotate_leader_on_view_change: false,
            value_domain: (Value::from("A"), Value::from("B")),
        }
    }
}

impl PbftConfig {
    /// Create a configuration from the operator-facing knobs.
    pub fn new(node_count: usize, byzantine_probability: f64, all_honest: bool) -> Self {
        Self {
            node_count,
            byzantine_probability,
            all_honest,
            ..Self::default()
        }
    }

    /// Set the number of participants.
    pub fn with_node_count(mut self, node_count: usize) -> Self {
        self.node_count = node_count;
        self
    }

    /// Set the per-node Byzantine probability.
    pub fn with_byzantine_probability(mut self, probability: f64) -> Self {
        self.byzantine_probability = probability;
        self
    }

    /// Force every node honest.
    pub fn with_all_honest(mut self, all_honest: bool) -> Self {
        self.all_honest = all_honest;
        self
    }

    /// Pin exactly these nodes Byzantine.
    pub fn with_fixed_byzantine(mut self, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        self.fixed_byzantine = Some(nodes.into_iter().collect());
        self
    }

    /// Redraw random Byzantine flags at every round start.
    pub fn with_redraw_each_round(mut self, redraw: bool) -> Self {
        self.redraw_each_round = redraw;
        self
    }

    /// Set the fault model seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the view-change resumption delay.
    pub fn with_view_change_delay(mut self, delay: Duration) -> Self {
        self.view_change_delay = delay;
        self
    }

    /// Set the number of consecutive failures that trigger a view change.
    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max;
        self
    }

    /// Enable or disable automatic phase advance after a submitted value.
    pub fn with_auto_advance(mut self, auto_advance: bool) -> Self {
        self.auto_advance = auto_advance;
        self
    }

    /// Rotate leadership by view number on view change.
    pub fn with_rotate_leader_on_view_change(mut self, rotate: bool) -> Self {
        self.rotate_leader_on_view_change = rotate;
        self
    }

    /// Set the two-valued token domain.
    pub fn with_value_domain(mut self, a: impl Into<Value>, b: impl Into<Value>) -> Self {
        self.value_domain = (a.into(), b.into());
        self
    }

    /// The effective Byzantine assignment policy.
    ///
    /// `all_honest` wins over a fixed set, which wins over the probability.
    pub fn assignment(&self) -> ByzantineAssignment {
        if self.all_honest {
            ByzantineAssignment::AllHonest
        } else if let Some(nodes) = &self.fixed_byzantine {
            ByzantineAssignment::Fixed(nodes.clone())
        } else {
            ByzantineAssignment::Random {
                probability: self.byzantine_probability,
            }
        }
    }

    /// Check the configuration for values the coordinator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_count == 0 {
            return Err(ConfigError::NoNodes);
        }
        if self.node_count > MAX_NODE_COUNT {
            return Err(ConfigError::TooManyNodes(self.node_count));
        }
        if !(0.0..=1.0).contains(&self.byzantine_probability) {
            return Err(ConfigError::InvalidProbability(self.byzantine_probability));
        }
        if let Some(nodes) = &self.fixed_byzantine {
            if let Some(&id) = nodes.iter().find(|id| id.index() >= self.node_count) {
                return Err(ConfigError::UnknownNode {
                    id,
                    node_count: self.node_count,
                });
            }
        }
        if self.max_consecutive_failures == 0 {
            return Err(ConfigError::InvalidFailureLimit);
        }
        if self.value_domain.0 == self.value_domain.1 {
            return Err(ConfigError::DegenerateDomain(self.value_domain.0.clone()));
        }
        Ok(())
    }
}
