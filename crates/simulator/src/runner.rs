//! Main simulator runner.
//!
//! Drives a sequence of automatic rounds on the deterministic simulation
//! runner and collects per-round metrics into a report.

use crate::config::{SimulatorConfig, ValueSource};
use crate::metrics::{MetricsCollector, RoundRecord, RunTotals, SimulationReport};
use quorumsim_bft::{ConfigError, PbftSnapshot};
use quorumsim_simulation::SimulationRunner;
use quorumsim_types::Value;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::Duration;
use tracing::{debug, info};

/// Main simulator that orchestrates the workload and metrics collection.
pub struct Simulator {
    /// Underlying deterministic simulation runner.
    runner: SimulationRunner,

    /// Metrics collector.
    metrics: MetricsCollector,

    /// Configuration.
    config: SimulatorConfig,

    /// RNG for workload values.
    rng: ChaCha8Rng,

    /// Rounds driven so far.
    rounds_run: usize,
}

impl Simulator {
    /// Create a new simulator with the given configuration.
    pub fn new(config: SimulatorConfig) -> Result<Self, SimulatorError> {
        if config.workload.rounds == 0 {
            return Err(SimulatorError::NoRounds);
        }
        if config.workload.max_attempts_per_round == 0 {
            return Err(SimulatorError::NoAttempts);
        }

        let runner = SimulationRunner::new(config.pbft.clone())?;

        // RNG for workload (separate from the fault model RNG for independence)
        let rng = ChaCha8Rng::seed_from_u64(config.seed().wrapping_add(1));

        info!(
            nodes = config.pbft.node_count,
            byzantine_probability = config.pbft.byzantine_probability,
            rounds = config.workload.rounds,
            seed = config.seed(),
            "Simulator created"
        );

        Ok(Self {
            runner,
            metrics: MetricsCollector::new(Duration::ZERO),
            config,
            rng,
            rounds_run: 0,
        })
    }

    /// Run every configured round and return the report.
    pub fn run(&mut self) -> SimulationReport {
        let start_time = self.runner.now();
        self.metrics = MetricsCollector::new(start_time);

        info!(
            rounds = self.config.workload.rounds,
            max_attempts = self.config.workload.max_attempts_per_round,
            "Starting simulation"
        );

        for _ in 0..self.config.workload.rounds {
            self.run_one_round();
        }

        let end_time = self.runner.now();
        let stats = self.runner.stats();
        let totals = RunTotals {
            quorum_failures: stats.quorum_failures,
            messages: self.runner.state().messages().len() as u64,
            final_view: self.runner.state().view(),
        };
        info!(
            simulated_secs = (end_time - start_time).as_secs_f64(),
            decisions = self.runner.state().decisions().len(),
            "Simulation complete"
        );

        std::mem::replace(&mut self.metrics, MetricsCollector::new(end_time))
            .finalize(end_time, totals)
    }

    fn run_one_round(&mut self) {
        let value = self.next_value();
        let max_attempts = self.config.workload.max_attempts_per_round;

        let outcome = self.runner.run_round(value, max_attempts);
        // Byzantine flags only change when a round starts.
        let fault_tolerant = self.runner.state().is_fault_tolerant();

        let record = RoundRecord {
            attempts: outcome.attempts,
            view_changes: outcome.view_changes,
            subverted: outcome.block.as_ref().map(|b| b.is_subverted),
            fault_tolerant,
        };
        self.metrics.record_round(&record);
        self.rounds_run += 1;

        let (rounds, decided, subverted) = self.metrics.current_stats();
        debug!(
            round = self.rounds_run,
            attempts = record.attempts,
            decided = record.subverted.is_some(),
            total_rounds = rounds,
            total_decided = decided,
            total_subverted = subverted,
            "Round recorded"
        );
    }

    fn next_value(&mut self) -> Value {
        let (a, b) = &self.config.pbft.value_domain;
        match &self.config.workload.values {
            ValueSource::Fixed(value) => value.clone(),
            ValueSource::Alternating => {
                if self.rounds_run % 2 == 0 {
                    a.clone()
                } else {
                    b.clone()
                }
            }
            ValueSource::Random => {
                if self.rng.gen_bool(0.5) {
                    a.clone()
                } else {
                    b.clone()
                }
            }
        }
    }

    /// Snapshot of the coordinator after the run.
    pub fn snapshot(&self) -> PbftSnapshot {
        self.runner.state().snapshot()
    }

    /// Get the underlying simulation runner (for advanced use).
    pub fn runner(&self) -> &SimulationRunner {
        &self.runner
    }

    /// Get mutable access to the simulation runner.
    pub fn runner_mut(&mut self) -> &mut SimulationRunner {
        &mut self.runner
    }
}

/// Errors that can occur during simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    #[error("Invalid coordinator configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Workload has no rounds")]
    NoRounds,
    #[error("Max attempts per round must be at least 1")]
    NoAttempts,
}
