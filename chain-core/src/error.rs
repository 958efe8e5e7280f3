//! Error types for the chain engine

use thiserror::Error;

/// Result type for chain operations
pub type Result<T> = std::result::Result<T, Error>;

/// Chain errors
#[derive(Error, Debug)]
pub enum Error {
    /// Hash chain discontinuity
    #[error("Block {index} does not link to the chain tip")]
    Link {
        /// Index of the offending block
        index: u64,
    },

    /// Stored vs. recomputed content hash differ
    #[error("Block {index} content hash does not recompute")]
    HashMismatch {
        /// Index of the offending block
        index: u64,
    },

    /// Signature missing or failed verification
    #[error("Signature verification failed: {0}")]
    Signature(String),

    /// Balance/stake check failure
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Malformed block exceeding the configured capacity
    #[error("Block holds {got} transactions, capacity is {capacity}")]
    Capacity {
        /// Number of transactions supplied
        got: usize,
        /// Configured per-block capacity
        capacity: usize,
    },

    /// Claimed validator does not match the recomputed stake-weighted draw
    #[error("Block validator does not match the stake-weighted draw")]
    SelectionMismatch,

    /// First block must be the genesis block
    #[error("Genesis error: {0}")]
    Genesis(String),

    /// Stale nonce (replay)
    #[error("Nonce replay: got {got}, expected at least {expected}")]
    NonceReplay {
        /// Nonce carried by the rejected transaction
        got: u64,
        /// Lowest nonce the sender may still use
        expected: u64,
    },

    /// Transaction already present in the chain or pool
    #[error("Transaction {0} is already known")]
    DuplicateTransaction(String),

    /// Peer already registered
    #[error("Peer already registered: {0}")]
    DuplicatePeer(String),

    /// Peer not known to the registry
    #[error("Unknown peer: {0}")]
    UnknownPeer(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),
}
