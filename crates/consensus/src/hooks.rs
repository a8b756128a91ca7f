//! Per-fork hook set.
//!
//! Hooks are assembled by the fork manager for a given height and invoked
//! by the backend on the proposal, verification and insert paths. Unset
//! hooks are no-ops.

use cinnabar_types::header::Block;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("block must not have transactions in the last block of an epoch")]
    TxInLastEpochBlock,

    #[error("{0}")]
    Other(String),
}

type BlockFn = Box<dyn Fn(&Block) -> Result<(), HookError> + Send + Sync>;
type HeightPredicateFn = Box<dyn Fn(u64) -> bool + Send + Sync>;

#[derive(Default)]
pub struct Hooks {
    pub post_insert_block_fn: Option<BlockFn>,
    pub should_write_transactions_fn: Option<HeightPredicateFn>,
    pub verify_block_fn: Option<BlockFn>,
}

impl Hooks {
    pub fn post_insert_block(&self, block: &Block) -> Result<(), HookError> {
        match &self.post_insert_block_fn {
            Some(hook) => hook(block),
            None => Ok(()),
        }
    }

    /// Whether a payload carrying transactions may be proposed at `height`.
    pub fn should_write_transactions(&self, height: u64) -> bool {
        match &self.should_write_transactions_fn {
            Some(hook) => hook(height),
            None => true,
        }
    }

    pub fn verify_block(&self, block: &Block) -> Result<(), HookError> {
        match &self.verify_block_fn {
            Some(hook) => hook(block),
            None => Ok(()),
        }
    }
}

/// Registers the guard keeping the last block of every epoch free of
/// transactions; epoch checkpoints only carry validator-set updates.
pub(crate) fn register_tx_inclusion_guard(hooks: &mut Hooks, epoch_size: u64) {
    let is_last_epoch_block = move |height: u64| height > 0 && height % epoch_size == 0;

    hooks.should_write_transactions_fn = Some(Box::new(move |height| !is_last_epoch_block(height)));

    hooks.verify_block_fn = Some(Box::new(move |block| {
        if is_last_epoch_block(block.number()) && !block.payload.transactions.is_empty() {
            return Err(HookError::TxInLastEpochBlock);
        }
        Ok(())
    }));
}

#[cfg(test)]
mod tests {
    use cinnabar_types::{header::Header, payload::ExecutionPayload};

    use super::*;

    fn block_at(number: u64, tx_count: usize) -> Block {
        let mut header = Header { number, difficulty: number, ..Default::default() };
        header.compute_hash();
        let transactions =
            (0..tx_count).map(|i| cinnabar_types::aliases::Bytes::from(vec![i as u8])).collect();
        Block { header, payload: ExecutionPayload { transactions, ..Default::default() } }
    }

    #[test]
    fn epoch_guard_blocks_transactions_at_epoch_end() {
        let mut hooks = Hooks::default();
        register_tx_inclusion_guard(&mut hooks, 10);

        assert!(!hooks.should_write_transactions(10));
        assert!(!hooks.should_write_transactions(20));
        assert!(hooks.should_write_transactions(0));
        assert!(hooks.should_write_transactions(9));
        assert!(hooks.should_write_transactions(11));

        assert!(matches!(
            hooks.verify_block(&block_at(10, 1)),
            Err(HookError::TxInLastEpochBlock)
        ));
        assert!(hooks.verify_block(&block_at(10, 0)).is_ok());
        assert!(hooks.verify_block(&block_at(11, 3)).is_ok());
    }

    #[test]
    fn unset_hooks_are_noops() {
        let hooks = Hooks::default();
        assert!(hooks.post_insert_block(&block_at(1, 5)).is_ok());
        assert!(hooks.verify_block(&block_at(10, 2)).is_ok());
        assert!(hooks.should_write_transactions(100));
    }
}
