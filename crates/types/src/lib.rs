//! Core types for the quorumsim PBFT simulation.
//!
//! This crate provides the data model shared by the consensus engine and the
//! runners that drive it:
//!
//! - **Identifiers**: [`NodeId`], [`Sender`], [`Recipient`]
//! - **Values**: the opaque comparable [`Value`] token a round agrees on
//! - **Phases**: round-level [`Phase`] and replica-local [`NodePhase`]
//! - **Records**: protocol [`Message`]s and committed [`Block`]s
//! - **Quorum arithmetic**: [`fault_tolerance`], [`quorum_threshold`]
//!
//! # Design Philosophy
//!
//! This crate is self-contained and does not depend on any other workspace
//! crate, making it the foundation layer.

mod block;
mod identifiers;
mod message;
mod phase;
mod quorum;
mod value;

pub use block::Block;
pub use identifiers::{NodeId, Recipient, Sender};
pub use message::{Message, MessageKind};
pub use phase::{NodePhase, Phase};
pub use quorum::{fault_tolerance, is_byzantine_fault_tolerant, quorum_threshold};
pub use value::Value;
