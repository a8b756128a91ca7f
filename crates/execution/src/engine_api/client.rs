use std::{fmt, sync::Arc, time::Duration};

use alloy_rpc_types_engine::{
    ForkchoiceState, ForkchoiceUpdated, PayloadId, PayloadStatus, PayloadStatusEnum,
};
use async_trait::async_trait;
use cinnabar_types::{
    aliases::{Address, B256},
    engine_api::{JsonExecutionPayloadInput, JsonGetPayloadResponse, JsonPayloadAttributes},
    payload::ExecutionPayload,
};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::{
    EngineApi, ENGINE_EXCHANGE_CAPABILITIES, ENGINE_FORKCHOICE_UPDATED_V3, ENGINE_GET_PAYLOAD_V3,
    ENGINE_NEW_PAYLOAD_V3,
};
use crate::{
    error::EngineError,
    transport::{JsonRpcRequest, Transport},
};

const RETRY_DELAY: Duration = Duration::from_secs(2);

pub struct EngineApiClient {
    transport: Arc<dyn Transport>,
    fee_recipient: Address,
    /// The authenticated Engine port expects one request at a time per
    /// client; concurrent callers queue here.
    request_lock: tokio::sync::Mutex<()>,
}

impl EngineApiClient {
    pub fn new(transport: impl Transport + 'static, fee_recipient: Address) -> Self {
        Self {
            transport: Arc::new(transport),
            fee_recipient,
            request_lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn request_once<R>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<R, EngineError>
    where
        R: DeserializeOwned,
    {
        let req = JsonRpcRequest::new(method, params);
        let resp = {
            let _guard = self.request_lock.lock().await;
            self.transport.send(&req).await?
        };

        if let Some(err) = resp.error {
            return Err(EngineError::Rpc { code: err.code, message: err.message });
        }

        let result = resp
            .result
            .ok_or_else(|| EngineError::InvalidResponse("missing result field".to_string()))?;
        serde_json::from_value(result).map_err(|e| EngineError::InvalidResponse(e.to_string()))
    }

    /// Retries transient failures without bound, two seconds apart.
    /// Consensus cannot proceed without a live EL, so giving up is never
    /// the right answer here.
    async fn retry_forever<R>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<R, EngineError>
    where
        R: DeserializeOwned,
    {
        loop {
            match self.request_once(method, params.clone()).await {
                Ok(result) => return Ok(result),
                Err(err) if err.is_retryable() => {
                    error!(method, %err, "engine API error, retrying indefinitely");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Same loop, but stops the moment the caller's token fires, without
    /// sleeping into the next attempt.
    async fn retry_until_cancelled<R>(
        &self,
        method: &str,
        params: serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<R, EngineError>
    where
        R: DeserializeOwned,
    {
        loop {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            match self.request_once(method, params.clone()).await {
                Ok(result) => return Ok(result),
                Err(err) if err.is_retryable() => {
                    error!(method, %err, "engine API error, retrying until cancelled");
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                        _ = tokio::time::sleep(RETRY_DELAY) => {}
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl fmt::Debug for EngineApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineApiClient")
            .field("transport", &"<dyn Transport>")
            .field("fee_recipient", &self.fee_recipient)
            .finish()
    }
}

#[async_trait]
impl EngineApi for EngineApiClient {
    async fn exchange_capabilities(
        &self,
        capabilities: Vec<String>,
    ) -> Result<Vec<String>, EngineError> {
        debug!("running exchangeCapabilities");
        self.retry_forever(ENGINE_EXCHANGE_CAPABILITIES, serde_json::json!([capabilities])).await
    }

    async fn forkchoice_updated(
        &self,
        head: B256,
        parent_beacon_block_root: B256,
        build_payload: bool,
        timestamp: u64,
    ) -> Result<ForkchoiceUpdated, EngineError> {
        debug!(%head, build_payload, "running forkchoiceUpdatedV3");

        let state = ForkchoiceState {
            head_block_hash: head,
            safe_block_hash: head,
            finalized_block_hash: head,
        };
        let attributes = build_payload.then(|| {
            JsonPayloadAttributes::building(
                timestamp,
                self.fee_recipient,
                parent_beacon_block_root,
            )
        });

        let updated: ForkchoiceUpdated = self
            .retry_forever(ENGINE_FORKCHOICE_UPDATED_V3, serde_json::json!([state, attributes]))
            .await?;

        if matches!(updated.payload_status.status, PayloadStatusEnum::Syncing) {
            error!(%head, "forkchoice rejected: execution layer is syncing");
            return Err(EngineError::Syncing);
        }

        Ok(updated)
    }

    async fn get_payload(
        &self,
        payload_id: PayloadId,
        cancel: &CancellationToken,
    ) -> Result<ExecutionPayload, EngineError> {
        debug!(%payload_id, "running getPayloadV3");
        let envelope: JsonGetPayloadResponse = self
            .retry_until_cancelled(ENGINE_GET_PAYLOAD_V3, serde_json::json!([payload_id]), cancel)
            .await?;
        Ok(envelope.execution_payload)
    }

    async fn new_payload(
        &self,
        payload: &ExecutionPayload,
        parent_beacon_block_root: B256,
    ) -> Result<PayloadStatus, EngineError> {
        debug!(block_hash = %payload.block_hash, "running newPayloadV3");

        let input = JsonExecutionPayloadInput::from(payload);
        let expected_blob_hashes: [B256; 0] = [];
        let status: PayloadStatus = self
            .retry_forever(
                ENGINE_NEW_PAYLOAD_V3,
                serde_json::json!([input, expected_blob_hashes, parent_beacon_block_root]),
            )
            .await?;

        match &status.status {
            PayloadStatusEnum::Valid | PayloadStatusEnum::Accepted => Ok(status),
            PayloadStatusEnum::Syncing => Err(EngineError::Syncing),
            PayloadStatusEnum::Invalid { validation_error } => {
                Err(EngineError::InvalidPayload(validation_error.clone()))
            }
            other => Err(EngineError::InvalidResponse(format!("unexpected status {other}"))),
        }
    }
}
