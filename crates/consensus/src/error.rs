use cinnabar_blockchain::StoreError;
use cinnabar_execution::EngineError;
use thiserror::Error;

use crate::{fork::ForkError, signer::SignerError};

/// Errors raised on the proposal and insert paths. The IBFT library only
/// sees these as a dropped proposal or a skipped insert; the round change
/// machinery handles recovery.
#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("stale proposal slot: head is {head}, asked to build {height}")]
    StaleParent { head: u64, height: u64 },

    #[error("no payload id cached; the engine was never asked to build")]
    MissingPayloadId,

    #[error("refusing non-empty payload in the last block of the epoch (height {height})")]
    TransactionsInEpochBlock { height: u64 },

    #[error("proposal cancelled")]
    Cancelled,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error(transparent)]
    Fork(#[from] ForkError),
}
