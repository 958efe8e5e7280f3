//! StakeMesh Node
//!
//! Long-lived peer process around the chain engine.
//!
//! # Architecture
//!
//! - **Single Writer**: one actor task owns the ledger and registry; every
//!   mutation, including the post-accept mint check, is one message step
//! - **HTTP surface**: actix-web routes for registration, transaction and
//!   block ingestion, chain queries, and sync
//! - **Fire-and-forget gossip**: per-peer broadcast tasks with bounded
//!   timeouts; an unreachable peer never stalls the ledger
//! - **Replay-derived state**: no persistence; a restarted node re-joins
//!   through registration/sync

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod config;
pub mod error;
pub mod gossip;
pub mod metrics;
pub mod node;
pub mod rest;

// Re-exports
pub use actor::{spawn_node_actor, NodeHandle, RegistrationOutcome, TxOutcome};
pub use config::NodeConfig;
pub use error::{Error, Result};
pub use gossip::Broadcaster;
pub use metrics::Metrics;
