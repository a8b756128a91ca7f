//! Node configuration surface.
//!
//! Loaded from a JSON file; every key is enumerated and unknown keys are
//! errors, not silently ignored.

use std::path::{Path, PathBuf};

use cinnabar_blockchain::GasLimitPolicy;
use cinnabar_consensus::ForkSpec;
use cinnabar_execution::EngineConfig;
use cinnabar_types::{
    aliases::{Bytes, B256},
    GenesisSpec, ValidatorSet,
};
use serde::{Deserialize, Serialize};

use crate::server::NodeError;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    /// Base directory for the chain database.
    pub data_dir: PathBuf,
    /// Seconds between blocks.
    pub block_time: u64,
    /// Engine API endpoint and credentials.
    pub engine: EngineConfig,
    /// Hash of the execution layer's genesis block; the payload hash the
    /// chain reports while at height 0.
    pub execution_genesis_hash: B256,
    /// Path to this validator's hex-encoded secp256k1 secret.
    pub validator_key_path: PathBuf,
    /// 48-byte BLS public key, required when any fork runs BLS validators.
    #[serde(default)]
    pub bls_public_key: Option<Bytes>,
    /// Consensus genesis parameters.
    pub genesis: GenesisSpec,
    /// Validator set at genesis; a fork-0 override wins over this.
    #[serde(default)]
    pub initial_validators: Option<ValidatorSet>,
    #[serde(default)]
    pub gas_limit: GasLimitPolicy,
    /// Fork schedule; must contain a fork starting at height 0.
    pub forks: Vec<ForkSpec>,
}

impl NodeConfig {
    pub fn load(path: &Path) -> Result<Self, NodeError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// The validator set the fork manager starts from: the explicit
    /// `initial_validators`, else the first fork's override.
    pub fn genesis_validators(&self) -> Result<ValidatorSet, NodeError> {
        if let Some(validators) = &self.initial_validators {
            return Ok(validators.clone());
        }
        self.forks
            .iter()
            .find(|fork| fork.start_height == 0)
            .and_then(|fork| fork.validators.clone())
            .ok_or_else(|| {
                NodeError::Config(
                    "no initial validators: set initial_validators or a fork-0 override"
                        .to_string(),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> serde_json::Value {
        serde_json::json!({
            "data_dir": "/var/lib/cinnabar",
            "block_time": 2,
            "engine": {
                "engine_url": "http://localhost:8551",
                "engine_token_path": "/etc/cinnabar/jwt.hex",
                "engine_jwt_id": "cinnabar-0",
                "suggested_fee_recipient": "0x735773c4c940b849d457adcf0e519d75d384af27"
            },
            "execution_genesis_hash":
                "0x3b8fb240d288781d4aac94d3fd16809ee413bc99294a085798a589dae51ddd4a",
            "validator_key_path": "/etc/cinnabar/validator.key",
            "genesis": { "gas_limit": 30000000, "timestamp": 1700000000 },
            "forks": [{
                "start_height": 0,
                "validator_kind": "ecdsa",
                "epoch_size": 100,
                "validators": {
                    "kind": "ecdsa",
                    "validators": [
                        { "type": "ecdsa", "address": "0x1111111111111111111111111111111111111111" },
                        { "type": "ecdsa", "address": "0x2222222222222222222222222222222222222222" }
                    ]
                }
            }]
        })
    }

    #[test]
    fn parses_a_complete_config() {
        let config: NodeConfig = serde_json::from_value(sample_config()).unwrap();
        assert_eq!(config.block_time, 2);
        assert_eq!(config.forks.len(), 1);
        assert_eq!(config.genesis_validators().unwrap().len(), 2);
        assert!(config.gas_limit.target.is_none());
    }

    #[test]
    fn unknown_keys_are_errors() {
        let mut raw = sample_config();
        raw["mystery_knob"] = serde_json::json!(true);
        assert!(serde_json::from_value::<NodeConfig>(raw).is_err());
    }

    #[test]
    fn missing_validators_is_a_config_error() {
        let mut raw = sample_config();
        raw["forks"][0]["validators"] = serde_json::Value::Null;
        let config: NodeConfig = serde_json::from_value(raw).unwrap();
        assert!(matches!(config.genesis_validators(), Err(NodeError::Config(_))));
    }
}
