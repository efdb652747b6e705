//! Simulator configuration.

use quorumsim_bft::PbftConfig;
use quorumsim_types::Value;

/// Default number of rounds in a workload.
pub const DEFAULT_ROUNDS: usize = 20;

/// Default cap on values submitted within one round.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Where the submitted value of each round comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// The same value every round.
    Fixed(Value),
    /// Alternate between the two domain values, starting with the first.
    Alternating,
    /// Draw uniformly from the two domain values using the seeded RNG.
    Random,
}

/// Workload: how many rounds to drive and what to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadConfig {
    pub rounds: usize,
    pub max_attempts_per_round: u32,
    pub values: ValueSource,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            rounds: DEFAULT_ROUNDS,
            max_attempts_per_round: DEFAULT_MAX_ATTEMPTS,
            values: ValueSource::Random,
        }
    }
}

impl WorkloadConfig {
    /// Submit `value` every round.
    pub fn fixed(value: impl Into<Value>) -> Self {
        Self {
            values: ValueSource::Fixed(value.into()),
            ..Self::default()
        }
    }

    /// Alternate between the two domain values.
    pub fn alternating() -> Self {
        Self {
            values: ValueSource::Alternating,
            ..Self::default()
        }
    }

    /// Random values drawn from the domain.
    pub fn random() -> Self {
        Self::default()
    }

    /// Set the number of rounds.
    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    /// Set the per-round attempt cap.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts_per_round = max_attempts;
        self
    }
}

/// Configuration for a simulation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulatorConfig {
    /// Coordinator configuration. Its seed drives every random draw.
    pub pbft: PbftConfig,
    pub workload: WorkloadConfig,
}

impl SimulatorConfig {
    /// Create a configuration for `node_count` nodes that are each Byzantine
    /// with the given probability.
    pub fn new(node_count: usize, byzantine_probability: f64) -> Self {
        Self {
            pbft: PbftConfig::new(node_count, byzantine_probability, false),
            workload: WorkloadConfig::default(),
        }
    }

    /// Replace the coordinator configuration.
    pub fn with_pbft(mut self, pbft: PbftConfig) -> Self {
        self.pbft = pbft;
        self
    }

    /// Set the seed for Byzantine draws and workload values.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.pbft.seed = seed;
        self
    }

    /// Set the workload.
    pub fn with_workload(mut self, workload: WorkloadConfig) -> Self {
        self.workload = workload;
        self
    }

    pub fn seed(&self) -> u64 {
        self.pbft.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let config = SimulatorConfig::new(7, 0.1)
            .with_seed(9)
            .with_workload(WorkloadConfig::fixed("B").with_rounds(3).with_max_attempts(2));

        assert_eq!(config.pbft.node_count, 7);
        assert_eq!(config.seed(), 9);
        assert_eq!(config.workload.rounds, 3);
        assert_eq!(config.workload.max_attempts_per_round, 2);
        assert_eq!(config.workload.values, ValueSource::Fixed(Value::from("B")));
    }

    #[test]
    fn test_default_workload_is_random() {
        assert_eq!(WorkloadConfig::default().values, ValueSource::Random);
        assert_eq!(WorkloadConfig::random(), WorkloadConfig::default());
    }
}
