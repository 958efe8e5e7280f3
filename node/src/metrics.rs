//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `node_transactions_accepted_total` - Transactions validated and pooled
//! - `node_transactions_rejected_total` - Transactions failing validation
//! - `node_blocks_minted_total` - Blocks sealed by this node
//! - `node_blocks_received_total` - Peer blocks appended
//! - `node_broadcast_failures_total` - Unreachable-peer broadcast attempts
//! - `node_chain_height` - Current chain length

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Transactions validated and pooled
    pub transactions_accepted: IntCounter,

    /// Transactions failing validation
    pub transactions_rejected: IntCounter,

    /// Blocks sealed by this node
    pub blocks_minted: IntCounter,

    /// Peer blocks appended to the chain
    pub blocks_received: IntCounter,

    /// Failed per-peer broadcast attempts
    pub broadcast_failures: IntCounter,

    /// Current chain length
    pub chain_height: IntGauge,

    /// Prometheus registry
    registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("transactions_accepted", &self.transactions_accepted.get())
            .field("transactions_rejected", &self.transactions_rejected.get())
            .field("blocks_minted", &self.blocks_minted.get())
            .field("blocks_received", &self.blocks_received.get())
            .field("chain_height", &self.chain_height.get())
            .finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transactions_accepted = IntCounter::new(
            "node_transactions_accepted_total",
            "Transactions validated and pooled",
        )?;
        registry.register(Box::new(transactions_accepted.clone()))?;

        let transactions_rejected = IntCounter::new(
            "node_transactions_rejected_total",
            "Transactions failing validation",
        )?;
        registry.register(Box::new(transactions_rejected.clone()))?;

        let blocks_minted =
            IntCounter::new("node_blocks_minted_total", "Blocks sealed by this node")?;
        registry.register(Box::new(blocks_minted.clone()))?;

        let blocks_received =
            IntCounter::new("node_blocks_received_total", "Peer blocks appended")?;
        registry.register(Box::new(blocks_received.clone()))?;

        let broadcast_failures = IntCounter::new(
            "node_broadcast_failures_total",
            "Unreachable-peer broadcast attempts",
        )?;
        registry.register(Box::new(broadcast_failures.clone()))?;

        let chain_height = IntGauge::new("node_chain_height", "Current chain length")?;
        registry.register(Box::new(chain_height.clone()))?;

        Ok(Self {
            transactions_accepted,
            transactions_rejected,
            blocks_minted,
            blocks_received,
            broadcast_failures,
            chain_height,
            registry,
        })
    }

    /// Render the registry in Prometheus text format
    pub fn encode_text(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if encoder
            .encode(&self.registry.gather(), &mut buffer)
            .is_err()
        {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
