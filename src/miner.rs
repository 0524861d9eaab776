//! Proof-of-work sealing
//!
//! A block is sealed once its hex digest starts with `difficulty` `'0'`
//! characters. Expected work is about 16^difficulty digests; there is no
//! early exit and no retargeting.

use crate::blockchain::Block;
use crate::error::ChainError;

pub const DEFAULT_DIFFICULTY: usize = 2;

pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

/// Search nonces upward from the candidate's current one until its digest
/// meets `difficulty`, then return the block carrying the winning nonce and
/// hash. Blocks the calling thread for the whole search.
pub fn mine_block(mut block: Block, difficulty: usize) -> Result<Block, ChainError> {
    let preimage = block.preimage()?;
    block.hash = preimage.digest(block.nonce);

    while !meets_difficulty(&block.hash, difficulty) {
        block.nonce = block.nonce.checked_add(1).ok_or(ChainError::NonceExhausted)?;
        block.hash = preimage.digest(block.nonce);
    }

    Ok(block)
}
