//! Shared harness for consensus integration tests: a temp-backed chain, a
//! mock execution layer and a fully wired backend.
#![allow(dead_code)]

pub mod mocks;

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use alloy_rpc_types_engine::PayloadId;
use cinnabar_blockchain::{Blockchain, GasLimitPolicy, Storage};
use cinnabar_consensus::{
    backend::IbftBackend, fork::ForkSpec, ChainFeature, EcdsaSigner, ForkManager, Signer,
};
use cinnabar_types::{
    aliases::B256, payload::ExecutionPayload, GenesisSpec, ValidatorKind, ValidatorSet,
};
use mocks::MockEngineApi;

pub const BLOCK_TIME: Duration = Duration::from_secs(2);

pub struct TestNode {
    pub backend: IbftBackend<MockEngineApi>,
    pub blockchain: Arc<Blockchain>,
    pub engine: Arc<MockEngineApi>,
    pub fork_manager: Arc<ForkManager>,
    pub signers: Vec<EcdsaSigner>,
    _dir: tempfile::TempDir,
}

pub fn genesis_spec() -> GenesisSpec {
    GenesisSpec { gas_limit: 30_000_000, timestamp: 1_700_000_000, extra_data: Default::default() }
}

pub fn fork_spec(start_height: u64, epoch_size: u64, validators: ValidatorSet) -> ForkSpec {
    ForkSpec {
        start_height,
        validator_kind: ValidatorKind::Ecdsa,
        epoch_size,
        validators: Some(validators),
        min_validator_count: None,
        max_validator_count: None,
        features: BTreeSet::new(),
    }
}

/// Builds a node with `validator_count` ECDSA validators; the first one is
/// this node's signer. The payload-id cache is primed like the server's
/// engine init would.
pub async fn build_node(validator_count: usize, forks: Vec<ForkSpec>) -> TestNode {
    let node = build_node_unprimed(validator_count, forks).await;
    node.blockchain.set_payload_id(PayloadId::new([1; 8])).await;
    node
}

/// Like [`build_node`], but without a primed payload-id cache: the state
/// of a node whose engine init never completed.
pub async fn build_node_unprimed(validator_count: usize, forks: Vec<ForkSpec>) -> TestNode {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::open(dir.path().join("chain.db")).unwrap();
    let blockchain = Arc::new(
        Blockchain::open(
            storage,
            genesis_spec().build_header(),
            B256::repeat_byte(0xe1),
            GasLimitPolicy::default(),
        )
        .await
        .unwrap(),
    );

    let signers: Vec<EcdsaSigner> = (0..validator_count).map(|_| EcdsaSigner::random()).collect();
    let validators =
        ValidatorSet::from_addresses(signers.iter().map(|signer| signer.address()));

    let forks = if forks.is_empty() { vec![fork_spec(0, 100, validators.clone())] } else { forks };

    // The backend signs with the first validator's key.
    let fork_manager = Arc::new(
        ForkManager::new(forks, signers[0].clone(), None, validators).unwrap(),
    );

    let engine = Arc::new(MockEngineApi::default());
    let backend = IbftBackend::new(
        Arc::clone(&blockchain),
        Arc::clone(&engine),
        Arc::clone(&fork_manager),
        BLOCK_TIME,
    );

    TestNode { backend, blockchain, engine, fork_manager, signers, _dir: dir }
}

/// Same chain and engine, different fork schedule.
pub fn rebuild_with_forks(node: TestNode, forks: Vec<ForkSpec>) -> TestNode {
    let validators =
        ValidatorSet::from_addresses(node.signers.iter().map(|signer| signer.address()));
    let manager = ForkManager::new(forks, node.signers[0].clone(), None, validators).unwrap();
    rebuild_with_manager(node, manager)
}

/// Same chain and engine, different fork manager.
pub fn rebuild_with_manager(node: TestNode, manager: ForkManager) -> TestNode {
    let fork_manager = Arc::new(manager);
    let backend = IbftBackend::new(
        Arc::clone(&node.blockchain),
        Arc::clone(&node.engine),
        Arc::clone(&fork_manager),
        BLOCK_TIME,
    );
    TestNode { backend, fork_manager, ..node }
}

/// Payload the mock EL "built" for the given height.
pub fn payload_for(height: u64, parent_payload_hash: B256) -> ExecutionPayload {
    ExecutionPayload {
        parent_hash: parent_payload_hash,
        state_root: B256::repeat_byte(0x5a),
        block_hash: B256::repeat_byte(0x90 ^ (height as u8)),
        number: height,
        gas_limit: 30_000_000,
        gas_used: 21_000,
        timestamp: 1_700_000_000 + height * 2,
        ..Default::default()
    }
}

pub fn belgrade_features() -> BTreeSet<ChainFeature> {
    let mut features = BTreeSet::new();
    features.insert(ChainFeature::Belgrade);
    features
}
