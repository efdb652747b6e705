//! Multi-round PBFT simulations.
//!
//! Builds on [`quorumsim_simulation::SimulationRunner`] to drive many
//! automatic rounds with a configurable workload and summarize the outcome
//! in a [`SimulationReport`].
//!
//! # Example
//!
//! ```
//! use quorumsim_simulator::{Simulator, SimulatorConfig, WorkloadConfig};
//!
//! let config = SimulatorConfig::new(7, 0.2)
//!     .with_seed(42)
//!     .with_workload(WorkloadConfig::random().with_rounds(10));
//! let mut simulator = Simulator::new(config).unwrap();
//! let report = simulator.run();
//! assert_eq!(report.rounds, 10);
//! ```

mod config;
pub mod metrics;
mod runner;

pub use config::{
    SimulatorConfig, ValueSource, WorkloadConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_ROUNDS,
};
pub use metrics::{MetricsCollector, RoundRecord, RunTotals, SimulationReport};
pub use runner::{Simulator, SimulatorError};
