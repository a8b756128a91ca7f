//! Canonical chain facade over the header store.
//!
//! Owns the cached head header, the execution-genesis bootstrap hash and
//! the payload-id handoff cache. Consensus components hold this behind an
//! `Arc` and only ever clone headers out; nothing borrows chain state
//! across an await point.

use std::sync::RwLock;

use alloy_rpc_types_engine::PayloadId;
use cinnabar_types::{
    aliases::{B256, U256},
    header::{Block, Header},
};
use tracing::{debug, info};

pub use crate::gas_limit::GasLimitPolicy;
use crate::{error::StoreError, storage::Storage};

pub struct Blockchain {
    storage: Storage,
    current_header: RwLock<Header>,
    /// Identifier of the payload the EL is currently building for us.
    /// Overwritten on every forkchoice update that requests a build; stale
    /// reads are tolerated because the EL rejects retired ids.
    payload_id: tokio::sync::RwLock<Option<PayloadId>>,
    execution_genesis_hash: B256,
    gas_limit: GasLimitPolicy,
}

impl Blockchain {
    /// Opens the chain on top of `storage`, minting the genesis header when
    /// the store is empty and verifying it otherwise.
    pub async fn open(
        storage: Storage,
        genesis: Header,
        execution_genesis_hash: B256,
        gas_limit: GasLimitPolicy,
    ) -> Result<Self, StoreError> {
        let head = match storage.read_head_hash().await? {
            Some(head_hash) => {
                let stored_genesis = storage
                    .read_canonical_hash(0)
                    .await?
                    .ok_or_else(|| StoreError::Corrupt("head set but no genesis".into()))?;
                if stored_genesis != genesis.hash {
                    return Err(StoreError::GenesisMismatch {
                        stored: stored_genesis,
                        computed: genesis.hash,
                    });
                }

                let head = storage
                    .read_header(head_hash)
                    .await?
                    .ok_or_else(|| StoreError::Corrupt("head header missing".into()))?;
                info!(number = head.number, hash = %head.hash, "Resuming chain from stored head");
                head
            }
            None => {
                storage.write_canonical_header(genesis.clone(), U256::ZERO).await?;
                storage.write_forks(vec![genesis.hash]).await?;
                info!(hash = %genesis.hash, "Wrote genesis header");
                genesis
            }
        };

        Ok(Self {
            storage,
            current_header: RwLock::new(head),
            payload_id: tokio::sync::RwLock::new(None),
            execution_genesis_hash,
            gas_limit,
        })
    }

    /// Snapshot of the current head header.
    pub fn header(&self) -> Header {
        self.current_header.read().expect("head lock poisoned").clone()
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Hash of the newest execution payload: the head's payload hash, or
    /// the configured execution-genesis hash while the chain is at height 0.
    pub fn get_latest_payload_hash(&self) -> B256 {
        let head = self.header();
        if head.number == 0 {
            self.execution_genesis_hash
        } else {
            head.payload_hash
        }
    }

    pub async fn set_payload_id(&self, payload_id: PayloadId) {
        *self.payload_id.write().await = Some(payload_id);
    }

    pub async fn get_payload_id(&self) -> Option<PayloadId> {
        *self.payload_id.read().await
    }

    /// Gas limit for block `number`, derived from its canonical parent.
    pub async fn calculate_gas_limit(&self, number: u64) -> Result<u64, StoreError> {
        if number == 0 {
            return Err(StoreError::Corrupt("no gas limit for the genesis block".into()));
        }
        let parent_hash = self
            .storage
            .read_canonical_hash(number - 1)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("no canonical parent for {number}")))?;
        let parent = self
            .storage
            .read_header(parent_hash)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("missing parent header {parent_hash}")))?;

        Ok(self.gas_limit.next(parent.gas_limit))
    }

    /// Atomically inserts a committed block and advances the head.
    ///
    /// Total difficulty is the parent's plus the header's difficulty; the
    /// fork-tip set drops the parent hash and gains the new head. The
    /// in-memory head is swapped only after the transaction commits, so a
    /// proposal for the next height can never observe a half-written head.
    pub async fn write_block(&self, block: &Block) -> Result<(), StoreError> {
        let header = &block.header;

        let parent_td = self
            .storage
            .read_total_difficulty(header.parent_hash)
            .await?
            .ok_or_else(|| {
                StoreError::Corrupt(format!("missing total difficulty for {}", header.parent_hash))
            })?;
        let td = parent_td + U256::from(header.difficulty);

        let mut forks = self.storage.read_forks().await?;
        forks.retain(|hash| *hash != header.parent_hash);
        forks.push(header.hash);

        self.storage.write_block(header.clone(), block.body(), td, forks).await?;

        *self.current_header.write().expect("head lock poisoned") = header.clone();
        debug!(number = header.number, hash = %header.hash, "Advanced canonical head");
        Ok(())
    }
}
