//! Error types for Ledgerline

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ChainError {
    EmptyPool,
    SealInFlight,
    InvalidBlockLinkage,
    InvalidProofOfWork,
    InvalidBlock(String),
    NonceExhausted,
    SealWorkerFailed(String),
    ProtocolError(String),
    NetworkError(String),
    ConfigError(String),
    IoError(String),
    HubUnavailable,
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainError::EmptyPool => write!(f, "No pending transactions to mine"),
            ChainError::SealInFlight => write!(f, "A block is already being mined"),
            ChainError::InvalidBlockLinkage => write!(f, "Invalid block linkage"),
            ChainError::InvalidProofOfWork => write!(f, "Invalid proof of work"),
            ChainError::InvalidBlock(msg) => write!(f, "Invalid block: {}", msg),
            ChainError::NonceExhausted => write!(f, "Nonce space exhausted before a valid hash was found"),
            ChainError::SealWorkerFailed(msg) => write!(f, "Seal worker failed: {}", msg),
            ChainError::ProtocolError(msg) => write!(f, "Protocol error: {}", msg),
            ChainError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            ChainError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            ChainError::IoError(msg) => write!(f, "IO error: {}", msg),
            ChainError::HubUnavailable => write!(f, "Ledger hub is no longer running"),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::ProtocolError(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ChainError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ChainError::NetworkError(err.to_string())
    }
}

impl From<crate::config::ConfigError> for ChainError {
    fn from(err: crate::config::ConfigError) -> Self {
        ChainError::ConfigError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
