//! Genesis header construction.

use serde::{Deserialize, Serialize};

use crate::{
    aliases::{Address, BlockHash, Bytes},
    constants::{EMPTY_ROOT_HASH, EMPTY_UNCLE_HASH, ISTANBUL_DIGEST},
    header::Header,
};

/// Chain-level genesis parameters. The execution side has its own genesis;
/// consensus only needs enough to mint the height-0 header every node
/// agrees on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenesisSpec {
    pub gas_limit: u64,
    pub timestamp: u64,
    #[serde(default)]
    pub extra_data: Bytes,
}

impl GenesisSpec {
    /// Builds the canonical genesis header. `payload_hash` stays zero: the
    /// execution genesis hash is supplied by configuration and used by the
    /// store's bootstrap path instead.
    pub fn build_header(&self) -> Header {
        let mut header = Header {
            parent_hash: BlockHash::ZERO,
            sha3_uncles: EMPTY_UNCLE_HASH,
            miner: Address::ZERO,
            state_root: EMPTY_ROOT_HASH,
            tx_root: EMPTY_ROOT_HASH,
            receipts_root: EMPTY_ROOT_HASH,
            difficulty: 0,
            number: 0,
            gas_limit: self.gas_limit,
            gas_used: 0,
            timestamp: self.timestamp,
            extra_data: self.extra_data.clone(),
            mix_hash: ISTANBUL_DIGEST,
            nonce: 0,
            ..Default::default()
        };
        header.compute_hash();
        header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_header_is_deterministic() {
        let spec = GenesisSpec {
            gas_limit: 30_000_000,
            timestamp: 1_700_000_000,
            extra_data: Bytes::new(),
        };
        let a = spec.build_header();
        let b = spec.build_header();
        assert_eq!(a.hash, b.hash);
        assert!(a.is_genesis());

        let other = GenesisSpec { timestamp: 1_700_000_001, ..spec };
        assert_ne!(other.build_header().hash, a.hash);
    }
}
