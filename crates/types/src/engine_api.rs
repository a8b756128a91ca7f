//! JSON shapes exchanged with the execution layer over the Engine API.
//!
//! These mirror the Engine API schema exactly; all quantities travel as
//! `0x`-prefixed minimal hex. The node-internal [`ExecutionPayload`] is
//! converted into [`JsonExecutionPayloadInput`] for `engine_newPayloadV3`,
//! which carries fields this chain pins to constants (empty withdrawals,
//! zero blob gas).

use serde::{Deserialize, Serialize};

use crate::{
    aliases::{Address, B256},
    payload::ExecutionPayload,
};

/// `payloadAttributes` parameter of `engine_forkchoiceUpdatedV3`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonPayloadAttributes {
    #[serde(with = "serde_utils::u64_hex_be")]
    pub timestamp: u64,
    pub prev_randao: B256,
    pub suggested_fee_recipient: Address,
    pub withdrawals: Vec<serde_json::Value>,
    pub parent_beacon_block_root: B256,
}

impl JsonPayloadAttributes {
    /// Attributes for the next payload build round. `prev_randao` is pinned
    /// to zero: IBFT provides no block-level randomness.
    pub fn building(timestamp: u64, fee_recipient: Address, parent_beacon_block_root: B256) -> Self {
        Self {
            timestamp,
            prev_randao: B256::ZERO,
            suggested_fee_recipient: fee_recipient,
            withdrawals: Vec::new(),
            parent_beacon_block_root,
        }
    }
}

/// `executionPayload` parameter of `engine_newPayloadV3`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonExecutionPayloadInput {
    #[serde(flatten)]
    pub payload: ExecutionPayload,
    pub withdrawals: Vec<serde_json::Value>,
    #[serde(with = "serde_utils::u64_hex_be")]
    pub excess_blob_gas: u64,
    #[serde(with = "serde_utils::u64_hex_be")]
    pub blob_gas_used: u64,
    pub deposit_requests: Option<serde_json::Value>,
}

impl From<&ExecutionPayload> for JsonExecutionPayloadInput {
    fn from(payload: &ExecutionPayload) -> Self {
        Self {
            payload: payload.clone(),
            withdrawals: Vec::new(),
            excess_blob_gas: 0,
            blob_gas_used: 0,
            deposit_requests: None,
        }
    }
}

/// Result object of `engine_getPayloadV3`. The EL returns additional
/// fields (block value, blobs bundle); only the payload is consumed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonGetPayloadResponse {
    pub execution_payload: ExecutionPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_payload_input_pins_constant_fields() {
        let payload = ExecutionPayload { number: 3, gas_used: 1, ..Default::default() };
        let input = JsonExecutionPayloadInput::from(&payload);
        let json = serde_json::to_value(&input).unwrap();

        assert_eq!(json["withdrawals"], serde_json::json!([]));
        assert_eq!(json["excessBlobGas"], "0x0");
        assert_eq!(json["blobGasUsed"], "0x0");
        assert_eq!(json["depositRequests"], serde_json::Value::Null);
        assert_eq!(json["blockNumber"], "0x3");
    }

    #[test]
    fn building_attributes_zero_the_randao() {
        let attrs = JsonPayloadAttributes::building(
            1_700_000_000,
            Address::repeat_byte(0x11),
            B256::repeat_byte(0x22),
        );
        let json = serde_json::to_value(&attrs).unwrap();
        assert_eq!(json["timestamp"], "0x6553f100");
        assert_eq!(
            json["prevRandao"],
            "0x0000000000000000000000000000000000000000000000000000000000000000"
        );
        assert_eq!(json["withdrawals"], serde_json::json!([]));
    }
}
