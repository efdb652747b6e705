//! Deterministic simulation for the quorumsim PBFT coordinator.
//!
//! The runner owns a single [`PbftState`](quorumsim_bft::PbftState) and a
//! global event queue keyed by simulated time. Operator inputs and the
//! view-change resumption flow through the same queue, so a run is fully
//! reproducible from its configuration and seed.
//!
//! # Example
//!
//! ```
//! use quorumsim_bft::PbftConfig;
//! use quorumsim_simulation::SimulationRunner;
//!
//! let mut runner = SimulationRunner::new(PbftConfig::new(4, 0.0, true)).unwrap();
//! let outcome = runner.run_round("A", 10);
//! assert!(outcome.block.is_some());
//! ```

mod event_queue;
mod runner;

pub use event_queue::EventKey;
pub use runner::{RoundOutcome, SimulationRunner, SimulationStats};
