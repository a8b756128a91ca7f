//! Test doubles for external dependencies used by integration tests.
//!
//! These mocks allow the harness to exercise consensus logic without
//! maintaining a live execution-layer connection.

use std::{
    collections::HashMap,
    sync::Mutex,
};

use alloy_rpc_types_engine::{ForkchoiceUpdated, PayloadId, PayloadStatus, PayloadStatusEnum};
use async_trait::async_trait;
use cinnabar_execution::{EngineApi, EngineError};
use cinnabar_types::{aliases::B256, payload::ExecutionPayload};
use tokio_util::sync::CancellationToken;

/// Lightweight Engine API mock that records invocations and returns canned
/// responses. Behavior mirrors the real client's contract: `get_payload`
/// blocks on the cancellation token when no payload is registered, and
/// terminal payload statuses surface as typed errors.
pub struct MockEngineApi {
    payloads: Mutex<HashMap<PayloadId, ExecutionPayload>>,
    /// (head, build_payload) per forkchoice call.
    pub forkchoice_updates: Mutex<Vec<(B256, bool)>>,
    /// Payload id handed out by build-mode forkchoice updates.
    pub next_payload_id: Mutex<PayloadId>,
    /// Status every `new_payload` call reports.
    pub new_payload_status: Mutex<PayloadStatusEnum>,
}

impl Default for MockEngineApi {
    fn default() -> Self {
        Self {
            payloads: Mutex::new(HashMap::new()),
            forkchoice_updates: Mutex::new(Vec::new()),
            next_payload_id: Mutex::new(PayloadId::new([0xff; 8])),
            new_payload_status: Mutex::new(PayloadStatusEnum::Valid),
        }
    }
}

impl MockEngineApi {
    /// Register a payload to be served for `payload_id`.
    pub fn register_payload(&self, payload_id: PayloadId, payload: ExecutionPayload) {
        self.payloads.lock().unwrap().insert(payload_id, payload);
    }

    pub fn set_new_payload_status(&self, status: PayloadStatusEnum) {
        *self.new_payload_status.lock().unwrap() = status;
    }
}

#[async_trait]
impl EngineApi for MockEngineApi {
    async fn exchange_capabilities(
        &self,
        capabilities: Vec<String>,
    ) -> Result<Vec<String>, EngineError> {
        Ok(capabilities)
    }

    async fn forkchoice_updated(
        &self,
        head: B256,
        _parent_beacon_block_root: B256,
        build_payload: bool,
        _timestamp: u64,
    ) -> Result<ForkchoiceUpdated, EngineError> {
        self.forkchoice_updates.lock().unwrap().push((head, build_payload));
        Ok(ForkchoiceUpdated {
            payload_status: PayloadStatus::new(PayloadStatusEnum::Valid, Some(head)),
            payload_id: build_payload.then(|| *self.next_payload_id.lock().unwrap()),
        })
    }

    async fn get_payload(
        &self,
        payload_id: PayloadId,
        cancel: &CancellationToken,
    ) -> Result<ExecutionPayload, EngineError> {
        let canned = self.payloads.lock().unwrap().get(&payload_id).cloned();
        match canned {
            Some(payload) => Ok(payload),
            None => {
                // An EL with nothing to serve keeps the client retrying
                // until the proposal context is cancelled.
                cancel.cancelled().await;
                Err(EngineError::Cancelled)
            }
        }
    }

    async fn new_payload(
        &self,
        _payload: &ExecutionPayload,
        _parent_beacon_block_root: B256,
    ) -> Result<PayloadStatus, EngineError> {
        let status = self.new_payload_status.lock().unwrap().clone();
        match status {
            PayloadStatusEnum::Syncing => Err(EngineError::Syncing),
            PayloadStatusEnum::Invalid { validation_error } => {
                Err(EngineError::InvalidPayload(validation_error))
            }
            status => Ok(PayloadStatus::new(status, None)),
        }
    }
}
