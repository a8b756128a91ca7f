//! Server wiring: everything that has to exist, in order, before the BFT
//! message engine can drive the backend.

use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use cinnabar_blockchain::{Blockchain, Storage, StoreError};
use cinnabar_consensus::{
    fork::ForkError, EcdsaSigner, ForkManager, IbftBackend, SignerError,
};
use cinnabar_execution::{
    transport::http::HttpTransport, EngineApi, EngineApiClient, EngineError,
};
use thiserror::Error;
use tracing::info;

use crate::config::NodeConfig;

/// Fatal initialization errors surfaced by [`new_server`]. After this
/// returns `Ok`, the engine handshake has completed and the payload-id
/// cache is primed.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JWT secret: {0}")]
    InvalidJwtSecret(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Fork(#[from] ForkError),

    #[error(transparent)]
    Signer(#[from] SignerError),
}

/// The wired consensus core. The BFT message engine holds this and calls
/// into [`Server::backend`] for proposals, verification and inserts.
pub struct Server {
    blockchain: Arc<Blockchain>,
    engine: Arc<EngineApiClient>,
    backend: Arc<IbftBackend<EngineApiClient>>,
}

impl Server {
    pub fn backend(&self) -> &Arc<IbftBackend<EngineApiClient>> {
        &self.backend
    }

    pub fn blockchain(&self) -> &Arc<Blockchain> {
        &self.blockchain
    }

    pub fn engine(&self) -> &Arc<EngineApiClient> {
        &self.engine
    }
}

pub async fn new_server(config: NodeConfig) -> Result<Server, NodeError> {
    std::fs::create_dir_all(config.data_dir.join("blockchain"))?;

    let key = load_validator_key(&config)?;
    let jwt_secret = load_jwt_secret(&config)?;
    info!(path = %config.engine.engine_token_path.display(), "Loaded JWT secret file");

    let storage = Storage::open(config.data_dir.join("blockchain").join("chain.db"))?;
    let blockchain = Arc::new(
        Blockchain::open(
            storage,
            config.genesis.build_header(),
            config.execution_genesis_hash,
            config.gas_limit,
        )
        .await?,
    );

    let transport = HttpTransport::new(config.engine.engine_url.clone())?
        .with_jwt(jwt_secret, config.engine.engine_jwt_id.clone());
    let engine = Arc::new(EngineApiClient::new(
        transport,
        config.engine.suggested_fee_recipient,
    ));

    let fork_manager = Arc::new(ForkManager::new(
        config.forks.clone(),
        key,
        config.bls_public_key.clone(),
        config.genesis_validators()?,
    )?);

    let backend = Arc::new(IbftBackend::new(
        Arc::clone(&blockchain),
        Arc::clone(&engine),
        Arc::clone(&fork_manager),
        Duration::from_secs(config.block_time.max(1)),
    ));

    // Engine handshake: capabilities, then a forkchoice update pointing at
    // the newest payload so the EL starts building on top of it.
    let head = blockchain.header();
    let payload_id = engine
        .initialize(blockchain.get_latest_payload_hash(), head.hash, unix_now())
        .await?;
    blockchain.set_payload_id(payload_id).await;

    info!(
        height = head.number,
        address = %backend.id(),
        "Consensus core initialized"
    );

    Ok(Server { blockchain, engine, backend })
}

fn load_validator_key(config: &NodeConfig) -> Result<EcdsaSigner, NodeError> {
    let raw = std::fs::read_to_string(&config.validator_key_path)?;
    Ok(EcdsaSigner::from_hex(&raw)?)
}

/// Reads the shared Engine JWT secret: either raw 32 bytes or 64 hex chars
/// with an optional newline.
fn load_jwt_secret(config: &NodeConfig) -> Result<[u8; 32], NodeError> {
    let raw = std::fs::read(&config.engine.engine_token_path)?;
    if raw.len() == 32 {
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&raw);
        return Ok(secret);
    }

    let text = String::from_utf8_lossy(&raw);
    let text = text.trim().trim_start_matches("0x");
    let decoded = hex::decode(text).map_err(|e| NodeError::InvalidJwtSecret(e.to_string()))?;
    decoded
        .as_slice()
        .try_into()
        .map_err(|_| NodeError::InvalidJwtSecret(format!("{} bytes, need 32", decoded.len())))
}

fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::config::NodeConfig;

    fn config_with_token(dir: &tempfile::TempDir, token_file: &str) -> NodeConfig {
        serde_json::from_value(serde_json::json!({
            "data_dir": dir.path(),
            "block_time": 2,
            "engine": {
                "engine_url": "http://localhost:8551",
                "engine_token_path": dir.path().join(token_file),
                "suggested_fee_recipient": "0x735773c4c940b849d457adcf0e519d75d384af27"
            },
            "execution_genesis_hash":
                "0x3b8fb240d288781d4aac94d3fd16809ee413bc99294a085798a589dae51ddd4a",
            "validator_key_path": dir.path().join("validator.key"),
            "genesis": { "gas_limit": 30000000, "timestamp": 1700000000 },
            "forks": [{
                "start_height": 0,
                "validator_kind": "ecdsa",
                "epoch_size": 100
            }]
        }))
        .unwrap()
    }

    #[test]
    fn jwt_secret_accepts_raw_and_hex() {
        let dir = tempfile::tempdir().unwrap();

        let raw_path = dir.path().join("raw.jwt");
        std::fs::File::create(&raw_path).unwrap().write_all(&[0xab; 32]).unwrap();
        let mut config = config_with_token(&dir, "raw.jwt");
        config.engine.engine_token_path = raw_path;
        assert_eq!(load_jwt_secret(&config).unwrap(), [0xab; 32]);

        let hex_path = dir.path().join("hex.jwt");
        std::fs::write(&hex_path, format!("0x{}\n", "cd".repeat(32))).unwrap();
        config.engine.engine_token_path = hex_path;
        assert_eq!(load_jwt_secret(&config).unwrap(), [0xcd; 32]);
    }

    #[test]
    fn short_jwt_secret_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.jwt");
        std::fs::write(&path, "aabb").unwrap();
        let mut config = config_with_token(&dir, "short.jwt");
        config.engine.engine_token_path = path;
        assert!(matches!(load_jwt_secret(&config), Err(NodeError::InvalidJwtSecret(_))));
    }

    #[test]
    fn validator_key_loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_token(&dir, "unused.jwt");
        std::fs::write(
            &config.validator_key_path,
            "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318\n",
        )
        .unwrap();
        assert!(load_validator_key(&config).is_ok());

        std::fs::write(&config.validator_key_path, "not hex").unwrap();
        assert!(load_validator_key(&config).is_err());
    }
}
