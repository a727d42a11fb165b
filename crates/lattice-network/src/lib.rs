//! # lattice-network
//!
//! Broker-facing protocol layer for the lattice node.
//!
//! This crate provides:
//! - Wire payload definitions (encoding itself lives a layer below)
//! - The broker session state machine: handshake, sync framing and
//!   ping/pong liveness
//! - Per-peer misbehavior tracking with penalty decay and bans
//!
//! The state machine is pure: it consumes events (payloads, timer ticks)
//! and emits actions (send, report, deliver, close), so every protocol
//! path is testable without sockets. A `tokio`-based session driver wires
//! it to channels and interval timers.

mod broker;
mod error;
mod message;
mod misbehavior;
mod penalties;
mod settings;

pub use broker::{BrokerAction, BrokerEvent, BrokerHandler, BrokerSession, BrokerState};
pub use error::{NetworkError, NetworkResult};
pub use message::Payload;
pub use misbehavior::{MisbehaviorStatus, MisbehaviorStorage};
pub use penalties::Offense;
pub use settings::NetworkSettings;
