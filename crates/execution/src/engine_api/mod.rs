pub mod client;
pub mod jwt;

use alloy_rpc_types_engine::{ForkchoiceUpdated, PayloadId, PayloadStatus};
use async_trait::async_trait;
use cinnabar_types::{aliases::B256, payload::ExecutionPayload};
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;

pub const ENGINE_EXCHANGE_CAPABILITIES: &str = "engine_exchangeCapabilities";
pub const ENGINE_FORKCHOICE_UPDATED_V3: &str = "engine_forkchoiceUpdatedV3";
pub const ENGINE_GET_PAYLOAD_V3: &str = "engine_getPayloadV3";
pub const ENGINE_NEW_PAYLOAD_V3: &str = "engine_newPayloadV3";

/// The Engine API surface consensus depends on.
///
/// Implementations retry transient failures internally: every method except
/// [`get_payload`](EngineApi::get_payload) retries without bound, because
/// consensus cannot make progress without a live execution layer.
/// `get_payload` runs inside the proposal path and stops the moment its
/// cancellation token fires.
#[async_trait]
pub trait EngineApi: Send + Sync {
    async fn exchange_capabilities(
        &self,
        capabilities: Vec<String>,
    ) -> Result<Vec<String>, EngineError>;

    /// `engine_forkchoiceUpdatedV3` with head = safe = finalized; finality
    /// is immediate under IBFT. With `build_payload`, attributes ask the EL
    /// to start assembling the next payload and the response carries a new
    /// payload id. A `SYNCING` payload status is returned as
    /// [`EngineError::Syncing`].
    async fn forkchoice_updated(
        &self,
        head: B256,
        parent_beacon_block_root: B256,
        build_payload: bool,
        timestamp: u64,
    ) -> Result<ForkchoiceUpdated, EngineError>;

    /// `engine_getPayloadV3`. Retries until the EL answers or `cancel`
    /// fires.
    async fn get_payload(
        &self,
        payload_id: PayloadId,
        cancel: &CancellationToken,
    ) -> Result<ExecutionPayload, EngineError>;

    /// `engine_newPayloadV3`. `INVALID` and `SYNCING` statuses are terminal
    /// errors for the proposal that submitted the payload.
    async fn new_payload(
        &self,
        payload: &ExecutionPayload,
        parent_beacon_block_root: B256,
    ) -> Result<PayloadStatus, EngineError>;

    /// Boot sequence, run once after the header store opens: capability
    /// handshake, then a forkchoice update that starts the first payload
    /// build. Returns the payload id to prime the cache with.
    async fn initialize(
        &self,
        latest_payload_hash: B256,
        parent_beacon_block_root: B256,
        timestamp: u64,
    ) -> Result<PayloadId, EngineError> {
        self.exchange_capabilities(Vec::new()).await?;
        let updated = self
            .forkchoice_updated(latest_payload_hash, parent_beacon_block_root, true, timestamp)
            .await?;
        updated.payload_id.ok_or(EngineError::MissingPayloadId)
    }
}
