//! PBFT consensus state machine.
//!
//! This crate provides a synchronous, single-process PBFT round simulator
//! that can be driven by both the simulated-time and the tokio runners.
//!
//! # Architecture
//!
//! The coordinator processes events synchronously:
//!
//! - `Event::StartRound` → Reset replicas, rotate the leader, enter PROPOSE
//! - `Event::SubmitValue` → Leader proposes and fans out pre-prepare
//! - `Event::Advance` → Run one intermediate phase (step mode only)
//! - `Event::ViewChangeTimer` → Resume PROPOSE after a view change
//!
//! All deferred work is returned as `Action`s for the runner.
//!
//! # Terminology
//!
//! - **Round**: One attempt sequence started by the operator. The leader
//!   rotates round-robin on every round.
//!
//! - **View**: Epoch counter incremented on view change. Every message is
//!   stamped with the sender's view.
//!
//! - **Quorum**: At least `2f + 1` replicas holding the same value at the end
//!   of COMMIT, where `f = floor((N - 1) / 3)`.
//!
//! - **Subverted decision**: A committed block whose value differs from the
//!   one the client submitted.
//!
//! # Fault Model
//!
//! A Byzantine replica follows the protocol's message pattern but reports a
//! corrupted value at every step. Corruption is a pure function of the honest
//! value (see [`Adversary`]), so runs are reproducible from the seed alone.
//!
//! # Liveness
//!
//! A failed quorum retries in the same view. After the configured number of
//! consecutive failures the view advances, replicas reset, and PROPOSE resumes
//! once the view-change timer fires.

mod config;
mod error;
mod fault;
mod log;
mod quorum;
mod replica;
mod state;
mod view_change;

pub use config::{
    ByzantineAssignment, PbftConfig, DEFAULT_BYZANTINE_PROBABILITY,
    DEFAULT_MAX_CONSECUTIVE_FAILURES, DEFAULT_NODE_COUNT, DEFAULT_VIEW_CHANGE_DELAY,
    MAX_NODE_COUNT,
};
pub use error::ConfigError;
pub use fault::{Adversary, FaultModel, Inversion};
pub use log::{DecisionLog, MessageLog};
pub use quorum::{QuorumEvaluator, QuorumOutcome, Tally};
pub use replica::{Replica, ReplicaView};
pub use state::{PbftSnapshot, PbftState, PbftStats, PbftStatus, CONSENSUS_FAILED};
pub use view_change::{FailureOutcome, ViewChangeState};
