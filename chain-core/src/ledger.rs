//! Chain and mempool ownership
//!
//! A `Ledger` owns the ordered sealed chain, the pending pool, and the
//! configured per-block capacity. Every mutator takes `&mut self`, so a
//! single exclusion discipline (the node's single-writer actor) covers the
//! pool append, the mint drain, the block append, and the chain replace;
//! "check pool size, drain, seal" is one atomic step.

use std::collections::HashSet;

use crate::types::{Block, Hash256, PublicKey, Transaction};
use crate::{Error, Result};

/// Ordered sealed blocks plus the pending-transaction pool
#[derive(Debug, Clone)]
pub struct Ledger {
    chain: Vec<Block>,
    pool: Vec<Transaction>,
    capacity: usize,
}

impl Ledger {
    /// Create an empty ledger with the given per-block capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            chain: Vec::new(),
            pool: Vec::new(),
            capacity,
        }
    }

    /// Sealed chain, oldest first
    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    /// Pending pool, oldest first
    pub fn pool(&self) -> &[Transaction] {
        &self.pool
    }

    /// Configured per-block capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Chain length
    pub fn height(&self) -> usize {
        self.chain.len()
    }

    /// Last sealed block, if any
    pub fn tip(&self) -> Option<&Block> {
        self.chain.last()
    }

    /// Whether a transaction with this identity hash is already sealed or
    /// pooled
    pub fn contains(&self, id: &Hash256) -> bool {
        self.pool.iter().any(|tx| &tx.id == id)
            || self
                .chain
                .iter()
                .any(|block| block.transactions.iter().any(|tx| &tx.id == id))
    }

    /// Append a transaction to the pool
    ///
    /// No validation happens here; validating against balance, stake, and
    /// nonce state is the caller's responsibility before pooling.
    pub fn add_transaction_to_pool(&mut self, tx: Transaction) {
        self.pool.push(tx);
    }

    /// Seal the next block from the pool, if it is full
    ///
    /// Drains the oldest `capacity` transactions, seals a block linking to
    /// the tip, and appends it, all under the same `&mut self`. Returns
    /// `Ok(None)` with the pool untouched when below capacity. A pool that
    /// momentarily overflowed (blocks from the elected validator arrive
    /// asynchronously) keeps its remainder for the next mint.
    pub fn try_mint(&mut self, validator: PublicKey) -> Result<Option<Block>> {
        if self.pool.len() < self.capacity {
            return Ok(None);
        }
        let Some(tip) = self.chain.last() else {
            return Err(Error::Genesis(
                "cannot mint before the genesis block".to_string(),
            ));
        };

        let batch = self.pool[..self.capacity].to_vec();
        let block = Block::seal(
            self.chain.len() as u64,
            batch,
            validator,
            tip.current_hash,
            self.capacity,
        )?;
        self.append_block(block.clone())?;
        Ok(Some(block))
    }

    /// Append a sealed block to the chain
    ///
    /// The block must link to the tip (or be the genesis block on an empty
    /// chain) and its stored content hash must recompute. Pooled copies of
    /// the sealed transactions are pruned, so nothing is ever minted twice.
    pub fn append_block(&mut self, block: Block) -> Result<()> {
        match self.chain.last() {
            None => {
                if block.index != 0 {
                    return Err(Error::Genesis(format!(
                        "first block must have index 0, got {}",
                        block.index
                    )));
                }
            }
            Some(tip) => {
                if block.previous_hash != tip.current_hash {
                    return Err(Error::Link { index: block.index });
                }
            }
        }
        if block.compute_hash() != block.current_hash {
            return Err(Error::HashMismatch { index: block.index });
        }

        let sealed: HashSet<Hash256> = block.transactions.iter().map(|tx| tx.id).collect();
        self.pool.retain(|tx| !sealed.contains(&tx.id));
        self.chain.push(block);
        Ok(())
    }

    /// Validate the owned chain
    pub fn validate(&self) -> bool {
        Self::validate_chain(&self.chain)
    }

    /// Validate a standalone chain: genesis shape, hash linkage, and
    /// content-hash recomputation for every block
    ///
    /// Logs the failing index before returning false.
    pub fn validate_chain(chain: &[Block]) -> bool {
        let Some(first) = chain.first() else {
            tracing::warn!("chain validation failed: empty chain");
            return false;
        };
        if first.index != 0 || first.previous_hash != Hash256::zero() {
            tracing::warn!(index = first.index, "chain validation failed: malformed genesis block");
            return false;
        }

        for (i, block) in chain.iter().enumerate() {
            if block.index != i as u64 {
                tracing::warn!(
                    index = block.index,
                    position = i,
                    "chain validation failed: non-sequential index"
                );
                return false;
            }
            if i > 0 && block.previous_hash != chain[i - 1].current_hash {
                tracing::warn!(index = block.index, "chain validation failed: broken link");
                return false;
            }
            if block.compute_hash() != block.current_hash {
                tracing::warn!(
                    index = block.index,
                    "chain validation failed: content hash does not recompute"
                );
                return false;
            }
        }
        true
    }

    /// Adopt a candidate chain iff it is valid and strictly longer
    ///
    /// This is the only fork-resolution rule: ties and shorter valid
    /// chains are rejected and the current chain stays untouched.
    pub fn replace_if_better(&mut self, candidate: Vec<Block>) -> bool {
        if !Self::validate_chain(&candidate) {
            tracing::warn!("rejected candidate chain: failed validation");
            return false;
        }
        if candidate.len() <= self.chain.len() {
            tracing::debug!(
                candidate_len = candidate.len(),
                current_len = self.chain.len(),
                "rejected candidate chain: not longer"
            );
            return false;
        }

        tracing::info!(new_len = candidate.len(), "adopted longer chain");
        self.chain = candidate;
        true
    }

    /// Chain adoption for the sync protocol
    ///
    /// Wraps [`Ledger::replace_if_better`]; on success the local pool is
    /// replaced with the candidate pool as well (trusting the sender's pool
    /// state; a deliberate simplification, not a security property).
    pub fn adopt(&mut self, candidate_chain: Vec<Block>, candidate_pool: Vec<Transaction>) -> bool {
        if self.replace_if_better(candidate_chain) {
            self.pool = candidate_pool;
            true
        } else {
            false
        }
    }
}
