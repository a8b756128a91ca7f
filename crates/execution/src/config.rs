use std::path::PathBuf;

use cinnabar_types::aliases::Address;
use serde::{Deserialize, Serialize};
use url::Url;

/// Engine API connection settings, loaded from the node configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// HTTP endpoint of the execution client's authenticated Engine port.
    pub engine_url: Url,
    /// Path to the shared 32-byte JWT secret (raw or 64 hex chars).
    pub engine_token_path: PathBuf,
    /// `kid` header claim identifying this consensus client's key.
    #[serde(default)]
    pub engine_jwt_id: Option<String>,
    /// Fee recipient suggested in payload build attributes.
    pub suggested_fee_recipient: Address,
}
