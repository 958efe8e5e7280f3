//! Error types for the node service

use thiserror::Error;

/// Result type for node operations
pub type Result<T> = std::result::Result<T, Error>;

/// Node errors
#[derive(Error, Debug)]
pub enum Error {
    /// Chain engine error
    #[error("Chain error: {0}")]
    Chain(#[from] chain_core::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(String),

    /// Registration failure
    #[error("Registration failed: {0}")]
    Registration(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err.to_string())
    }
}
