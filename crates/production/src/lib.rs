//! Production runner with async I/O.
//!
//! This crate wraps the deterministic PBFT coordinator with wall-clock time:
//!
//! - Operator commands via a tokio mpsc channel
//! - View-change resumption via abortable tokio timer tasks
//! - A bounded status published to observers through a `watch` channel, with
//!   full snapshots on request
//!
//! # Architecture
//!
//! Uses the event aggregator pattern: a single task owns the state machine
//! and receives events via mpsc channels. This avoids mutex contention.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  PbftHandle (cloneable)       ResumptionTimer (tokio task)   │
//! │     │ commands + oneshot reply        │ timer events         │
//! │     ▼                                 ▼                      │
//! │  ProductionRunner                                            │
//! │    └─ loop { event = recv(); actions = state.handle(event); }│
//! │     │                                                        │
//! │     ▼                                                        │
//! │  watch::Sender<Arc<PbftStatus>>    → observers               │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod runner;
mod timers;

pub use runner::{
    Notification, PbftHandle, ProductionRunner, ProductionRunnerBuilder, RunnerError,
    ShutdownHandle, DEFAULT_CHANNEL_CAPACITY,
};
pub use timers::ResumptionTimer;
