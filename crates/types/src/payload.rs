//! Execution payload: the EL-built block body attached to every header.

use serde::{Deserialize, Serialize};

use crate::aliases::{Address, BlockHash, Bloom, Bytes, B256, U256};

/// Execution payload as returned by `engine_getPayloadV3`.
///
/// Immutable once received from the EL; the source of truth for the
/// header's `payload_hash`, `gas_used` and (post-Belgrade) `state_root`.
/// `prev_randao` exists only on the JSON-RPC wire; the RLP form carries
/// the remaining 13 fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPayload {
    pub parent_hash: B256,
    pub fee_recipient: Address,
    pub state_root: B256,
    pub receipts_root: B256,
    pub logs_bloom: Bloom,
    pub prev_randao: B256,
    #[serde(rename = "blockNumber", with = "serde_utils::u64_hex_be")]
    pub number: u64,
    #[serde(with = "serde_utils::u64_hex_be")]
    pub gas_limit: u64,
    #[serde(with = "serde_utils::u64_hex_be")]
    pub gas_used: u64,
    #[serde(with = "serde_utils::u64_hex_be")]
    pub timestamp: u64,
    pub extra_data: Bytes,
    #[serde(with = "serde_utils::u256_hex_be")]
    pub base_fee_per_gas: U256,
    pub block_hash: BlockHash,
    /// Opaque RLP-encoded transactions, never interpreted by consensus.
    pub transactions: Vec<Bytes>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_engine_api_json() {
        // engine_getPayloadV3 result shape; unknown fields (withdrawals,
        // blob gas) must be tolerated.
        let raw = r#"{
            "parentHash": "0x3b8fb240d288781d4aac94d3fd16809ee413bc99294a085798a589dae51ddd4a",
            "feeRecipient": "0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b",
            "stateRoot": "0xca3149fa9e37db08d1cd49c9061db1002ef1cd58db2210f2115c8c989b2bdf45",
            "receiptsRoot": "0x56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421",
            "logsBloom": "0x00000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000",
            "prevRandao": "0x0000000000000000000000000000000000000000000000000000000000000000",
            "blockNumber": "0x1",
            "gasLimit": "0x1c9c380",
            "gasUsed": "0x5208",
            "timestamp": "0x64",
            "extraData": "0x",
            "baseFeePerGas": "0x7",
            "blockHash": "0x6ff7f3c4b22a14b4d04d8d104c4b5600b4cc2f4c2b5c2f4e7a3e7a3e7a3e7a3e",
            "transactions": ["0x02f87001018405f5e100"],
            "withdrawals": [],
            "blobGasUsed": "0x0",
            "excessBlobGas": "0x0"
        }"#;

        let payload: ExecutionPayload = serde_json::from_str(raw).unwrap();
        assert_eq!(payload.number, 1);
        assert_eq!(payload.gas_used, 21_000);
        assert_eq!(payload.base_fee_per_gas, U256::from(7));
        assert_eq!(payload.transactions.len(), 1);
    }

    #[test]
    fn serializes_hex_quantities() {
        let payload = ExecutionPayload {
            number: 16,
            gas_limit: 30_000_000,
            base_fee_per_gas: U256::from(1000),
            ..Default::default()
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["blockNumber"], "0x10");
        assert_eq!(json["gasLimit"], "0x1c9c380");
        assert_eq!(json["baseFeePerGas"], "0x3e8");
        assert_eq!(json["transactions"], serde_json::json!([]));
    }
}
