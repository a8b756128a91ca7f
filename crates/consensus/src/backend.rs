//! IBFT consensus backend: the surface the BFT message engine drives.
//!
//! The engine calls [`IbftBackend::build_proposal`] when this node leads a
//! round, [`IbftBackend::verify_proposal`] on incoming proposals and
//! [`IbftBackend::insert_block`] once commit quorum is reached. Failures on
//! these paths never panic; a dropped proposal or skipped insert simply
//! sends the cluster into a round change.

use std::{
    collections::BTreeMap,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use alloy_rlp::Decodable;
use cinnabar_blockchain::Blockchain;
use cinnabar_execution::EngineApi;
use cinnabar_types::{
    aliases::{Address, Bytes},
    constants::{EMPTY_ROOT_HASH, EMPTY_UNCLE_HASH, ISTANBUL_DIGEST},
    header::{Block, Header},
    Seals,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    error::ConsensusError,
    fork::{ChainFeature, ForkManager},
    signer::Signer as _,
};

/// Sentinel returned by [`IbftBackend::quorum`] when the validator set for
/// a height cannot be resolved: large enough that the message engine can
/// never reach agreement on an unvalidated height, small enough not to
/// overflow its vote accounting.
const QUORUM_SENTINEL: u64 = i32::MAX as u64;

/// A commit signature delivered by the message engine at quorum.
#[derive(Clone, Debug)]
pub struct CommittedSeal {
    pub signer: Address,
    pub signature: Bytes,
}

pub struct IbftBackend<E> {
    blockchain: Arc<Blockchain>,
    engine: Arc<E>,
    fork_manager: Arc<ForkManager>,
    block_time: Duration,
}

impl<E: EngineApi> IbftBackend<E> {
    pub fn new(
        blockchain: Arc<Blockchain>,
        engine: Arc<E>,
        fork_manager: Arc<ForkManager>,
        block_time: Duration,
    ) -> Self {
        Self { blockchain, engine, fork_manager, block_time }
    }

    /// Address this node participates with at the next height.
    pub fn id(&self) -> Address {
        let next = self.blockchain.header().number + 1;
        match self.fork_manager.get_signer(next) {
            Ok(signer) => signer.address(),
            Err(_) => Address::ZERO,
        }
    }

    /// Quorum size for `height`; ⌈2N/3⌉, or the sentinel when the
    /// validator set cannot be resolved so that consensus cannot make
    /// unsafe progress.
    pub fn quorum(&self, height: u64) -> u64 {
        match self.fork_manager.get_validators(height) {
            Ok(validators) => validators.quorum(),
            Err(err) => {
                error!(height, %err, "failed to get validators when calculating quorum");
                QUORUM_SENTINEL
            }
        }
    }

    pub fn maximum_faulty_nodes(&self) -> u64 {
        let next = self.blockchain.header().number + 1;
        match self.fork_manager.get_validators(next) {
            Ok(validators) => validators.max_faulty(),
            Err(_) => 0,
        }
    }

    /// Builds the proposal for `height`, or `None` when the slot is stale
    /// or any build step fails; the message engine treats an empty
    /// proposal as a round timeout.
    pub async fn build_proposal(&self, height: u64, cancel: &CancellationToken) -> Option<Bytes> {
        let parent = self.blockchain.header();
        if parent.number + 1 != height {
            error!(
                head = parent.number,
                height, "unable to build block, due to lack of parent block"
            );
            return None;
        }

        match self.build_block(&parent, height, cancel).await {
            Ok(block) => Some(Bytes::from(alloy_rlp::encode(&block))),
            Err(err) => {
                error!(height, %err, "cannot build block");
                None
            }
        }
    }

    async fn build_block(
        &self,
        parent: &Header,
        height: u64,
        cancel: &CancellationToken,
    ) -> Result<Block, ConsensusError> {
        let signer = self.fork_manager.get_signer(height)?;
        let validators = self.fork_manager.get_validators(height)?;
        let hooks = self.fork_manager.get_hooks(height);

        let gas_limit = self.blockchain.calculate_gas_limit(height).await?;

        let mut header = Header {
            parent_hash: parent.hash,
            number: height,
            miner: Address::ZERO,
            nonce: 0,
            mix_hash: ISTANBUL_DIGEST,
            // difficulty tracks the number; the store organizes forks by it
            difficulty: height,
            state_root: EMPTY_ROOT_HASH,
            receipts_root: EMPTY_ROOT_HASH,
            sha3_uncles: EMPTY_UNCLE_HASH,
            tx_root: EMPTY_ROOT_HASH,
            gas_limit,
            ..Default::default()
        };

        header.timestamp = header_timestamp(parent.timestamp, unix_now(), self.block_time);

        let parent_committed_seals = self.extract_parent_committed_seals(parent)?;
        signer.init_ibft_extra(&mut header, &validators, parent_committed_seals);

        self.sleep_until(header.timestamp, cancel).await?;

        let payload_id =
            self.blockchain.get_payload_id().await.ok_or(ConsensusError::MissingPayloadId)?;
        let payload = self.engine.get_payload(payload_id, cancel).await?;

        if !hooks.should_write_transactions(height) && !payload.transactions.is_empty() {
            return Err(ConsensusError::TransactionsInEpochBlock { height });
        }

        header.payload_hash = payload.block_hash;
        header.gas_used = payload.gas_used;

        if self.fork_manager.is_feature_active(ChainFeature::Belgrade, height) {
            debug!(height, "Belgrade active, setting header state root from payload");
            header.state_root = payload.state_root;
        }

        let header = signer.write_proposer_seal(&header)?;

        let mut block = Block { header, payload };
        // Provisional hash; the final one lands after the committed seals.
        block.header.compute_hash();

        self.engine.new_payload(&block.payload, parent.hash).await?;

        Ok(block)
    }

    /// Checks an incoming proposal against the chain and the active fork's
    /// rules before the message engine votes on it.
    pub async fn verify_proposal(&self, proposal: &[u8]) -> bool {
        let block = match Block::decode(&mut &proposal[..]) {
            Ok(block) => block,
            Err(err) => {
                warn!(%err, "rejecting undecodable proposal");
                return false;
            }
        };
        let header = &block.header;
        let height = header.number;

        let parent = self.blockchain.header();
        if header.parent_hash != parent.hash || height != parent.number + 1 {
            warn!(height, "rejecting proposal not building on the current head");
            return false;
        }

        let sealed_fields_ok = header.miner == Address::ZERO &&
            header.nonce == 0 &&
            header.difficulty == height &&
            header.mix_hash == ISTANBUL_DIGEST &&
            header.sha3_uncles == EMPTY_UNCLE_HASH &&
            header.tx_root == EMPTY_ROOT_HASH &&
            header.receipts_root == EMPTY_ROOT_HASH &&
            header.payload_hash == block.payload.block_hash;
        if !sealed_fields_ok {
            warn!(height, "rejecting proposal with malformed identity fields");
            return false;
        }

        // The state root follows the payload once Belgrade is active and
        // stays pinned to the empty root before that.
        let expected_state_root =
            if self.fork_manager.is_feature_active(ChainFeature::Belgrade, height) {
                block.payload.state_root
            } else {
                EMPTY_ROOT_HASH
            };
        if header.state_root != expected_state_root {
            warn!(height, "rejecting proposal with a mismatched state root");
            return false;
        }

        if header.timestamp < parent.timestamp + self.block_time.as_secs() {
            warn!(height, "rejecting proposal with a regressing timestamp");
            return false;
        }

        let signer = match self.fork_manager.get_signer(height) {
            Ok(signer) => signer,
            Err(err) => {
                error!(height, %err, "no signer for height");
                return false;
            }
        };
        if let Err(err) = signer.validate_extra_data_format(header) {
            warn!(height, %err, "rejecting proposal with malformed extra data");
            return false;
        }

        let proposer = match signer.recover_proposer(header) {
            Ok(proposer) => proposer,
            Err(err) => {
                warn!(height, %err, "rejecting proposal with unrecoverable proposer seal");
                return false;
            }
        };
        match self.fork_manager.get_validators(height) {
            Ok(validators) if validators.contains(&proposer) => {}
            _ => {
                warn!(height, %proposer, "rejecting proposal from a non-validator");
                return false;
            }
        }

        let hooks = self.fork_manager.get_hooks(height);
        if let Err(err) = hooks.verify_block(&block) {
            warn!(height, %err, "rejecting proposal: block hook failed");
            return false;
        }

        true
    }

    /// Inserts a committed proposal: writes the committed seals, re-checks
    /// the extra-data format, persists atomically, fires the post-insert
    /// hook and schedules the next payload build.
    pub async fn insert_block(&self, proposal: &[u8], committed_seals: &[CommittedSeal]) {
        let mut block = match Block::decode(&mut &proposal[..]) {
            Ok(block) => block,
            Err(err) => {
                error!(%err, "cannot decode committed proposal");
                return;
            }
        };
        let height = block.number();

        let signer = match self.fork_manager.get_signer(height) {
            Ok(signer) => signer,
            Err(err) => {
                error!(height, %err, "no signer for committed block");
                return;
            }
        };
        let hooks = self.fork_manager.get_hooks(height);

        let seals_map: BTreeMap<Address, Bytes> = committed_seals
            .iter()
            .map(|seal| (seal.signer, seal.signature.clone()))
            .collect();

        // Keep the pre-write extra around: if the seal write corrupts the
        // encoding we want both sides of the mutation in the log.
        let extra_backup = block.header.extra_data.clone();

        let sealed = match signer.write_committed_seals(&block.header, &seals_map) {
            Ok(sealed) => sealed,
            Err(err) => {
                error!(height, %err, "cannot write committed seals");
                return;
            }
        };

        if let Err(err) = signer.validate_extra_data_format(&sealed) {
            error!(
                height,
                %err,
                before = %hex::encode(&extra_backup),
                after = %hex::encode(&sealed.extra_data),
                committed = committed_seals.len(),
                "cannot write block: corrupted extra data"
            );
            return;
        }

        block.header = sealed;

        if let Err(err) = self.blockchain.write_block(&block).await {
            error!(height, %err, "cannot write block");
            return;
        }

        info!(
            number = height,
            hash = %block.hash(),
            validation_type = %signer.kind(),
            committed = committed_seals.len(),
            "block committed"
        );

        if let Err(err) = hooks.post_insert_block(&block) {
            error!(height, hash = %block.hash(), %err, "failed to call post-insert hook");
            return;
        }

        // Point the EL at the new head and start the next payload build.
        let timestamp = unix_now().max(block.header.timestamp + 1);
        match self
            .engine
            .forkchoice_updated(block.hash(), block.hash(), true, timestamp)
            .await
        {
            Ok(updated) => match updated.payload_id {
                Some(payload_id) => self.blockchain.set_payload_id(payload_id).await,
                None => error!(height, "forkchoice accepted but returned no payload id"),
            },
            Err(err) => error!(height, %err, "post-insert forkchoice update failed"),
        }
    }

    fn extract_parent_committed_seals(
        &self,
        parent: &Header,
    ) -> Result<Option<Seals>, ConsensusError> {
        if parent.number == 0 {
            return Ok(None);
        }
        let signer = self.fork_manager.get_signer(parent.number)?;
        let extra = signer.get_ibft_extra(parent)?;
        Ok(Some(extra.committed_seals))
    }

    async fn sleep_until(
        &self,
        timestamp: u64,
        cancel: &CancellationToken,
    ) -> Result<(), ConsensusError> {
        let wait = timestamp.saturating_sub(unix_now());
        if wait == 0 {
            return Ok(());
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(ConsensusError::Cancelled),
            _ = tokio::time::sleep(Duration::from_secs(wait)) => Ok(()),
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default()
}

/// Timestamp for the next block: at least one block time past the parent,
/// and never behind the wall clock rounded up to a block-time multiple.
/// Clock skew can therefore delay a block but never regress its timestamp.
fn header_timestamp(parent_timestamp: u64, now: u64, block_time: Duration) -> u64 {
    let block_time = block_time.as_secs().max(1);
    let minimum = parent_timestamp + block_time;
    let rounded_now = now.div_ceil(block_time) * block_time;
    minimum.max(rounded_now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_is_parent_plus_block_time_when_on_schedule() {
        let parent = 1_700_000_000;
        let now = parent + 1;
        assert_eq!(header_timestamp(parent, now, Duration::from_secs(2)), parent + 2);
    }

    #[test]
    fn timestamp_catches_up_after_a_stall() {
        let parent = 1_700_000_000;
        // Proposer was down for a minute; the slot rounds up to the next
        // block-time multiple instead of replaying missed slots.
        let now = parent + 61;
        let got = header_timestamp(parent, now, Duration::from_secs(2));
        assert_eq!(got % 2, 0);
        assert!(got >= now);
        assert!(got <= now + 2);
    }

    #[test]
    fn timestamp_never_regresses_under_clock_skew() {
        let parent = 1_700_000_000;
        // Local clock is far behind the parent.
        let now = parent - 120;
        assert_eq!(header_timestamp(parent, now, Duration::from_secs(2)), parent + 2);
    }

    #[test]
    fn zero_block_time_is_clamped() {
        assert_eq!(header_timestamp(10, 10, Duration::from_secs(0)), 11);
    }
}
