//! Ledgerline - a single-authority proof-of-work ledger served over WebSockets
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, the hash chain, validation and balances
//! - [`transaction`] - Transfer records
//! - [`mempool`] - Pending transaction pool
//!
//! ## Consensus & Mining
//! - [`miner`] - Proof-of-work sealing
//! - [`crypto`] - Block digests (SHA-256)
//!
//! ## Sessions & Protocol
//! - [`session`] - Which connection speaks for which user
//! - [`protocol`] - JSON wire messages
//! - [`hub`] - Single owner of ledger state; routes updates to connections
//!
//! ## Networking
//! - [`server`] - WebSocket transport
//! - [`node`] - Startup and logging
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//! - [`clock`] - Timestamp canonicalisation

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod mempool;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod crypto;
pub mod miner;

// ============================================================================
// Sessions & Protocol
// ============================================================================
pub mod hub;
pub mod protocol;
pub mod session;

// ============================================================================
// Networking
// ============================================================================
pub mod node;
pub mod server;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod clock;
pub mod config;
pub mod error;
