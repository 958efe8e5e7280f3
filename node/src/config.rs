//! Configuration for the node

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Listen host
    pub host: String,

    /// Listen port
    pub port: u16,

    /// URL advertised to peers (defaults to `http://{host}:{port}`)
    pub public_url: Option<String>,

    /// Whether this node bootstraps the network
    pub bootstrap: bool,

    /// Bootstrap node URL, required for non-bootstrap nodes
    pub bootstrap_url: Option<String>,

    /// Transactions per block
    pub block_capacity: usize,

    /// Expected network size
    pub total_nodes: usize,

    /// Per-peer broadcast timeout (milliseconds)
    pub broadcast_timeout_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            public_url: None,
            bootstrap: false,
            bootstrap_url: None,
            block_capacity: 5,
            total_nodes: 5,
            broadcast_timeout_ms: 2_000,
        }
    }
}

impl NodeConfig {
    /// URL peers use to reach this node
    pub fn api_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;
        let config: NodeConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = NodeConfig::default();

        if let Ok(host) = std::env::var("NODE_HOST") {
            config.host = host;
        }

        if let Ok(port) = std::env::var("NODE_PORT") {
            config.port = port
                .parse()
                .map_err(|_| Error::Config(format!("Invalid NODE_PORT: {}", port)))?;
        }

        if let Ok(url) = std::env::var("NODE_PUBLIC_URL") {
            config.public_url = Some(url);
        }

        if let Ok(flag) = std::env::var("NODE_BOOTSTRAP") {
            config.bootstrap = matches!(flag.as_str(), "1" | "true" | "yes");
        }

        if let Ok(url) = std::env::var("NODE_BOOTSTRAP_URL") {
            config.bootstrap_url = Some(url);
        }

        if let Ok(capacity) = std::env::var("NODE_BLOCK_CAPACITY") {
            config.block_capacity = capacity
                .parse()
                .map_err(|_| Error::Config(format!("Invalid NODE_BLOCK_CAPACITY: {}", capacity)))?;
        }

        if let Ok(total) = std::env::var("NODE_TOTAL_NODES") {
            config.total_nodes = total
                .parse()
                .map_err(|_| Error::Config(format!("Invalid NODE_TOTAL_NODES: {}", total)))?;
        }

        if let Ok(timeout) = std::env::var("NODE_BROADCAST_TIMEOUT_MS") {
            config.broadcast_timeout_ms = timeout.parse().map_err(|_| {
                Error::Config(format!("Invalid NODE_BROADCAST_TIMEOUT_MS: {}", timeout))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants that make a node unable to run at all
    pub fn validate(&self) -> Result<()> {
        if self.block_capacity == 0 {
            return Err(Error::Config("block_capacity must be positive".to_string()));
        }
        if self.total_nodes == 0 {
            return Err(Error::Config("total_nodes must be positive".to_string()));
        }
        if !self.bootstrap && self.bootstrap_url.is_none() {
            return Err(Error::Config(
                "non-bootstrap nodes need bootstrap_url".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.block_capacity, 5);
        assert_eq!(config.total_nodes, 5);
        assert_eq!(config.api_url(), "http://0.0.0.0:8000");
    }

    #[test]
    fn test_public_url_overrides_api_url() {
        let config = NodeConfig {
            public_url: Some("http://node3.example:9000".to_string()),
            ..NodeConfig::default()
        };
        assert_eq!(config.api_url(), "http://node3.example:9000");
    }

    #[test]
    fn test_non_bootstrap_requires_bootstrap_url() {
        let config = NodeConfig::default();
        assert!(config.validate().is_err());

        let bootstrap = NodeConfig {
            bootstrap: true,
            ..NodeConfig::default()
        };
        assert!(bootstrap.validate().is_ok());
    }
}
