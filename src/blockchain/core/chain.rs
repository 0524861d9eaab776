use crate::clock;
use crate::crypto::{block_digest, Preimage};
use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::miner::{self, meets_difficulty};
use crate::transaction::{Transaction, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::verify_chain;

/// Hash and previous hash of the genesis sentinel.
pub const GENESIS_HASH: &str = "0";
/// Reserved identifier recorded as the genesis block's miner.
pub const SYSTEM_MINER: &str = "system";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    #[serde(with = "clock::millis")]
    pub timestamp: DateTime<Utc>,
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub hash: String,
    pub nonce: u64,
    pub mined_by: UserId,
}

impl Block {
    /// The fixed sentinel anchoring every ledger. Never sealed and never
    /// checked against its digest.
    pub fn genesis(timestamp: DateTime<Utc>) -> Self {
        Block {
            index: 0,
            timestamp,
            transactions: Vec::new(),
            previous_hash: GENESIS_HASH.to_string(),
            hash: GENESIS_HASH.to_string(),
            nonce: 0,
            mined_by: SYSTEM_MINER.to_string(),
        }
    }

    /// Unsealed candidate stamped with the current time, nonce 0 and its
    /// initial digest.
    pub fn new(
        index: u64,
        previous_hash: String,
        transactions: Vec<Transaction>,
        mined_by: impl Into<UserId>,
    ) -> Result<Self, ChainError> {
        let mut block = Block {
            index,
            timestamp: clock::now(),
            transactions,
            previous_hash,
            hash: String::new(),
            nonce: 0,
            mined_by: mined_by.into(),
        };
        block.hash = block.calculate_hash()?;
        Ok(block)
    }

    pub fn preimage(&self) -> Result<Preimage, ChainError> {
        Preimage::new(self.index, &self.previous_hash, &self.timestamp, &self.transactions)
    }

    pub fn calculate_hash(&self) -> Result<String, ChainError> {
        block_digest(
            self.index,
            &self.previous_hash,
            &self.timestamp,
            &self.transactions,
            self.nonce,
        )
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }
}

/// Append-only ledger anchored by the genesis sentinel.
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    difficulty: usize,
}

#[allow(clippy::len_without_is_empty)]
impl Blockchain {
    pub fn new(difficulty: usize) -> Self {
        Self::with_genesis(Block::genesis(clock::now()), difficulty)
    }

    pub fn with_genesis(genesis: Block, difficulty: usize) -> Self {
        Blockchain {
            blocks: vec![genesis],
            difficulty,
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn head(&self) -> &Block {
        // Genesis is pushed on construction and blocks are never removed.
        &self.blocks[self.blocks.len() - 1]
    }

    /// First phase of sealing: snapshot the pool into a candidate that
    /// extends the current head. The pool is left untouched.
    pub fn propose(&self, pool: &Mempool, mined_by: &str) -> Result<Block, ChainError> {
        if pool.is_empty() {
            return Err(ChainError::EmptyPool);
        }

        let head = self.head();
        Block::new(head.index + 1, head.hash.clone(), pool.snapshot(), mined_by)
    }

    /// Second phase of sealing: append a block sealed from an earlier
    /// proposal and drop exactly its transactions from the front of the
    /// pool. Anything submitted while the seal was running stays pending.
    pub fn commit(&mut self, block: Block, pool: &mut Mempool) -> Result<&Block, ChainError> {
        self.check_successor(&block)?;

        if !pool.starts_with(&block.transactions) {
            return Err(ChainError::InvalidBlock(
                "Sealed transactions are no longer at the front of the pool.".to_string(),
            ));
        }

        pool.remove_sealed(block.transactions.len());
        self.blocks.push(block);
        Ok(self.head())
    }

    /// Propose, mine and append in one blocking call. The pool is empty
    /// afterwards.
    pub fn seal(&mut self, pool: &mut Mempool, mined_by: &str) -> Result<Block, ChainError> {
        let candidate = self.propose(pool, mined_by)?;
        let sealed = miner::mine_block(candidate, self.difficulty)?;
        self.check_successor(&sealed)?;

        // Drain only once the block is known good so a failed seal keeps the pool.
        let drained = pool.drain_snapshot();
        debug_assert_eq!(drained, sealed.transactions);

        self.blocks.push(sealed.clone());
        Ok(sealed)
    }

    /// Diagnostic integrity check over every block after genesis.
    pub fn validate(&self) -> bool {
        verify_chain(&self.blocks).is_ok()
    }

    fn check_successor(&self, block: &Block) -> Result<(), ChainError> {
        let head = self.head();

        if block.index != head.index + 1 {
            return Err(ChainError::InvalidBlock(format!(
                "Invalid block index. Expected {}, but got {}.",
                head.index + 1,
                block.index
            )));
        }

        if block.previous_hash != head.hash {
            return Err(ChainError::InvalidBlockLinkage);
        }

        if block.calculate_hash()? != block.hash {
            return Err(ChainError::InvalidBlock(format!(
                "Hash {} does not match the contents of block {}.",
                block.hash, block.index
            )));
        }

        if !meets_difficulty(&block.hash, self.difficulty) {
            return Err(ChainError::InvalidProofOfWork);
        }

        Ok(())
    }
}
