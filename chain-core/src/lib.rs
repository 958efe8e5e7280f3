//! StakeMesh Chain Engine
//!
//! Consensus and ledger core for a minimal proof-of-stake network.
//!
//! # Architecture
//!
//! - **Replay accounting**: balances and stakes are derived on demand from
//!   the chain and pool, never stored
//! - **Deterministic selection**: the next minter is a stake-weighted draw
//!   seeded by the previous block's content hash, identical on every node
//! - **Longest valid chain**: the only fork-resolution rule
//! - **Single owner**: all mutation goes through one `Ledger` value; the
//!   node layer serializes access behind a single-writer actor
//!
//! # Invariants
//!
//! - `chain[i].previous_hash == chain[i-1].current_hash` for all i > 0
//! - Every block's stored hash recomputes from its content
//! - Balances never go negative
//! - A transaction is sealed into at most one block

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod accounts;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod registry;
pub mod selection;
pub mod types;

// Re-exports
pub use crypto::KeyPair;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use registry::{Peer, Registry};
pub use types::{Block, Hash256, Party, PublicKey, Signature, Transaction, TxKind};
