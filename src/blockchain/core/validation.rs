use crate::error::ChainError;

use super::chain::Block;

/// Walk the chain from index 1, recomputing each digest and checking the
/// previous-hash link. Stops at the first violation. Genesis is never
/// checked against its digest, and proof-of-work is not re-checked here.
pub fn verify_chain(blocks: &[Block]) -> Result<(), ChainError> {
    for pair in blocks.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);

        let recomputed = current.calculate_hash()?;
        if recomputed != current.hash {
            return Err(ChainError::InvalidBlock(format!(
                "Hash mismatch at block {}. Expected {}, but got {}.",
                current.index, recomputed, current.hash
            )));
        }

        if current.previous_hash != previous.hash {
            return Err(ChainError::InvalidBlockLinkage);
        }
    }
    Ok(())
}

pub fn is_valid_chain(blocks: &[Block]) -> bool {
    verify_chain(blocks).is_ok()
}
