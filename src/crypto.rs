//! Block digests for Ledgerline
//!
//! The digest is an integrity checksum, not a commitment scheme. Its input is
//! the concatenation, in this order, of:
//!
//! 1. the block index in decimal,
//! 2. the previous block hash,
//! 3. the timestamp as RFC 3339 with milliseconds,
//! 4. the transactions as a compact JSON array in insertion order,
//! 5. the nonce in decimal.
//!
//! The result is SHA-256, hex encoded in lowercase.

use crate::clock;
use crate::error::ChainError;
use crate::transaction::Transaction;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Hash state over every field but the nonce. Mining clones it instead of
/// re-serializing the transactions on every attempt.
#[derive(Clone)]
pub struct Preimage {
    state: Sha256,
}

impl Preimage {
    pub fn new(
        index: u64,
        previous_hash: &str,
        timestamp: &DateTime<Utc>,
        transactions: &[Transaction],
    ) -> Result<Self, ChainError> {
        let transactions_json = serde_json::to_string(transactions)?;

        let mut state = Sha256::new();
        state.update(index.to_string().as_bytes());
        state.update(previous_hash.as_bytes());
        state.update(clock::format_millis(timestamp).as_bytes());
        state.update(transactions_json.as_bytes());
        Ok(Self { state })
    }

    pub fn digest(&self, nonce: u64) -> String {
        let mut hasher = self.state.clone();
        hasher.update(nonce.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

pub fn block_digest(
    index: u64,
    previous_hash: &str,
    timestamp: &DateTime<Utc>,
    transactions: &[Transaction],
    nonce: u64,
) -> Result<String, ChainError> {
    Ok(Preimage::new(index, previous_hash, timestamp, transactions)?.digest(nonce))
}
