//! Fire-and-forget peer broadcast
//!
//! Every broadcast call posts to each peer in its own task with a bounded
//! timeout: one unreachable peer never stalls the others, the HTTP
//! handlers, or the ledger actor. Failures are logged and counted, never
//! retried, and never roll back the local mutation that triggered them.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use chain_core::types::{Block, Transaction};
use chain_core::Peer;

use crate::{metrics::Metrics, Error, Result};

/// Broadcast client shared by the HTTP handlers
#[derive(Debug, Clone)]
pub struct Broadcaster {
    client: reqwest::Client,
    metrics: Metrics,
}

impl Broadcaster {
    /// Create a broadcaster with a per-call timeout
    pub fn new(timeout: Duration, metrics: Metrics) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, metrics })
    }

    /// POST `body` to `path` on every target address, each in its own task
    pub fn broadcast<T: Serialize>(&self, targets: &[String], path: &'static str, body: &T) {
        let payload = match serde_json::to_value(body) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(error = %err, "failed to encode broadcast payload");
                return;
            }
        };

        for address in targets {
            let client = self.client.clone();
            let metrics = self.metrics.clone();
            let payload = payload.clone();
            let url = format!("{}{}", address, path);

            tokio::spawn(async move {
                match client.post(&url).json(&payload).send().await {
                    Ok(response) if response.status().is_success() => {
                        tracing::debug!(%url, "broadcast delivered");
                    }
                    Ok(response) => {
                        tracing::warn!(%url, status = %response.status(), "peer rejected broadcast");
                        metrics.broadcast_failures.inc();
                    }
                    Err(err) => {
                        tracing::warn!(%url, error = %err, "broadcast failed");
                        metrics.broadcast_failures.inc();
                    }
                }
            });
        }
    }

    /// Broadcast a transaction to the peer pool endpoints
    pub fn broadcast_transaction(&self, targets: &[String], tx: &Transaction) {
        self.broadcast(targets, "/transactions", tx);
    }

    /// Broadcast a sealed block
    pub fn broadcast_block(&self, targets: &[String], block: &Block) {
        self.broadcast(targets, "/blocks", block);
    }

    /// Broadcast the full peer registry
    pub fn broadcast_peers(&self, targets: &[String], peers: &BTreeMap<u64, Peer>) {
        self.broadcast(targets, "/peers", peers);
    }
}
