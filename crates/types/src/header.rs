//! Block header and block container types.

use alloy_primitives::keccak256;

use crate::{
    aliases::{Address, BlockHash, BlockNumber, Bloom, Bytes, B256},
    constants::{EMPTY_ROOT_HASH, EMPTY_UNCLE_HASH},
    extra,
    payload::ExecutionPayload,
    rlp,
};

/// Consensus header. Fixed-width identifier record, invariant across
/// re-encoding: `hash` is a pure function of every other field except the
/// committed-seal element of `extra_data`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    pub parent_hash: BlockHash,
    pub sha3_uncles: B256,
    pub miner: Address,
    pub state_root: B256,
    pub tx_root: B256,
    pub receipts_root: B256,
    pub logs_bloom: Bloom,
    pub difficulty: u64,
    pub number: BlockNumber,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra_data: Bytes,
    pub mix_hash: B256,
    pub nonce: u64,
    /// Cached header hash; not part of the wire encoding. Recomputed on
    /// decode and after any mutation that can change it (seal writes).
    pub hash: BlockHash,
    /// Block hash the execution layer reported for the attached payload.
    pub payload_hash: BlockHash,
}

impl Header {
    /// Recomputes and caches the header hash: keccak256 of the RLP encoding
    /// with the committed-seal element of `extra_data` erased. Extra data
    /// that does not parse as IBFT extra (genesis) hashes as-is.
    pub fn compute_hash(&mut self) -> BlockHash {
        let erased = extra::erase_committed_seals(&self.extra_data);
        let extra = match &erased {
            Ok(extra) => extra.as_slice(),
            Err(_) => self.extra_data.as_ref(),
        };

        let mut out = Vec::new();
        rlp::encode_header_with_extra(self, extra, &mut out);
        self.hash = keccak256(&out);
        self.hash
    }

    /// Digest the round leader signs: keccak256 of the RLP encoding with
    /// both the proposer seal and the committed seals erased. The proposer
    /// seal is empty at signing time, so sealed and unsealed headers agree
    /// on this value.
    pub fn seal_digest(&self) -> Result<B256, crate::extra::ExtraError> {
        let extra = extra::erase_proposer_and_committed_seals(&self.extra_data)?;
        let mut out = Vec::new();
        rlp::encode_header_with_extra(self, &extra, &mut out);
        Ok(keccak256(&out))
    }

    pub fn is_genesis(&self) -> bool {
        self.hash != BlockHash::ZERO && self.number == 0
    }

    pub fn has_body(&self) -> bool {
        self.tx_root != EMPTY_ROOT_HASH || self.sha3_uncles != EMPTY_UNCLE_HASH
    }
}

/// A full block: sealed header plus the execution payload built by the EL.
/// Transactions only live inside the payload; the legacy block-level
/// transaction and uncle slots are always encoded as empty lists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub header: Header,
    pub payload: ExecutionPayload,
}

impl Block {
    pub fn hash(&self) -> BlockHash {
        self.header.hash
    }

    pub fn number(&self) -> BlockNumber {
        self.header.number
    }

    pub fn parent_hash(&self) -> BlockHash {
        self.header.parent_hash
    }

    pub fn body(&self) -> Body {
        Body { payload: self.payload.clone() }
    }
}

/// On-disk block body: the execution payload behind the legacy null slots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Body {
    pub payload: ExecutionPayload,
}
