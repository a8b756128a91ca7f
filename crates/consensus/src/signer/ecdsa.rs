//! ECDSA (secp256k1) signer with recoverable 65-byte seals.

use std::collections::BTreeMap;

use alloy_primitives::keccak256;
use cinnabar_types::{
    aliases::{Address, Bytes, B256},
    extra::ECDSA_SEAL_LEN,
    header::Header,
    IbftExtra, Seals, ValidatorKind, ValidatorSet,
};
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    Message, PublicKey, SecretKey, SECP256K1,
};

use super::{Signer, SignerError};

#[derive(Clone)]
pub struct EcdsaSigner {
    secret: SecretKey,
    address: Address,
}

impl EcdsaSigner {
    pub fn new(secret: SecretKey) -> Self {
        let public = PublicKey::from_secret_key(SECP256K1, &secret);
        Self { secret, address: public_key_to_address(&public) }
    }

    /// Parses a 32-byte secret from hex, with or without the 0x prefix.
    pub fn from_hex(raw: &str) -> Result<Self, SignerError> {
        let raw = raw.trim().trim_start_matches("0x");
        let bytes = hex::decode(raw).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        let secret =
            SecretKey::from_slice(&bytes).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        Ok(Self::new(secret))
    }

    pub fn random() -> Self {
        Self::new(SecretKey::new(&mut secp256k1::rand::thread_rng()))
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    /// Commit signature over a block hash, as carried in COMMIT messages
    /// and later embedded as a committed seal.
    pub fn sign_committed_seal(&self, block_hash: B256) -> Bytes {
        Bytes::from(self.sign_digest(block_hash).to_vec())
    }

    pub(crate) fn sign_digest(&self, digest: B256) -> [u8; ECDSA_SEAL_LEN] {
        let message = Message::from_digest(digest.0);
        let signature = SECP256K1.sign_ecdsa_recoverable(&message, &self.secret);
        let (recovery_id, compact) = signature.serialize_compact();

        let mut seal = [0u8; ECDSA_SEAL_LEN];
        seal[..64].copy_from_slice(&compact);
        seal[64] = recovery_id.to_i32() as u8;
        seal
    }

    /// Recovers the signer address of a 65-byte seal over `digest`.
    pub fn recover(digest: B256, seal: &[u8]) -> Result<Address, SignerError> {
        if seal.len() != ECDSA_SEAL_LEN {
            return Err(SignerError::Crypto(format!("seal length {} != 65", seal.len())));
        }
        let recovery_id = RecoveryId::from_i32(i32::from(seal[64]))
            .map_err(|e| SignerError::Crypto(e.to_string()))?;
        let signature = RecoverableSignature::from_compact(&seal[..64], recovery_id)
            .map_err(|e| SignerError::Crypto(e.to_string()))?;

        let message = Message::from_digest(digest.0);
        let public = SECP256K1
            .recover_ecdsa(&message, &signature)
            .map_err(|e| SignerError::Crypto(e.to_string()))?;
        Ok(public_key_to_address(&public))
    }
}

pub(crate) fn public_key_to_address(public: &PublicKey) -> Address {
    let hash = keccak256(&public.serialize_uncompressed()[1..]);
    Address::from_slice(&hash[12..])
}

impl Signer for EcdsaSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Ecdsa
    }

    fn init_ibft_extra(
        &self,
        header: &mut Header,
        validators: &ValidatorSet,
        parent_committed_seals: Option<Seals>,
    ) {
        let extra = IbftExtra::new(
            0,
            validators,
            parent_committed_seals.unwrap_or_else(|| Seals::empty(ValidatorKind::Ecdsa)),
        );
        header.extra_data = extra.encode();
    }

    fn write_proposer_seal(&self, header: &Header) -> Result<Header, SignerError> {
        let digest = header.seal_digest()?;
        let seal = self.sign_digest(digest);

        let mut extra = self.get_ibft_extra(header)?;
        extra.proposer_seal = Bytes::from(seal.to_vec());

        let mut sealed = header.clone();
        sealed.extra_data = extra.encode();
        sealed.compute_hash();
        Ok(sealed)
    }

    fn write_committed_seals(
        &self,
        header: &Header,
        seals: &BTreeMap<Address, Bytes>,
    ) -> Result<Header, SignerError> {
        if seals.is_empty() {
            return Err(SignerError::EmptyCommittedSeals);
        }

        let mut extra = self.get_ibft_extra(header)?;
        let snapshot = &extra.validators;
        for address in seals.keys() {
            if !snapshot.iter().any(|v| v.address() == *address) {
                return Err(SignerError::UnknownValidator(*address));
            }
        }

        // Snapshot order keeps the vector identical on every node.
        let ordered: Vec<Bytes> = snapshot
            .iter()
            .filter_map(|validator| seals.get(&validator.address()).cloned())
            .collect();
        extra.committed_seals = Seals::Serialized(ordered);

        let mut sealed = header.clone();
        sealed.extra_data = extra.encode();
        sealed.compute_hash();
        Ok(sealed)
    }

    fn get_ibft_extra(&self, header: &Header) -> Result<IbftExtra, SignerError> {
        Ok(IbftExtra::decode(ValidatorKind::Ecdsa, &header.extra_data)?)
    }

    fn validate_extra_data_format(&self, header: &Header) -> Result<(), SignerError> {
        let extra = self.get_ibft_extra(header)?;
        Ok(extra.validate(ValidatorKind::Ecdsa)?)
    }

    fn recover_proposer(&self, header: &Header) -> Result<Address, SignerError> {
        let extra = self.get_ibft_extra(header)?;
        let digest = header.seal_digest()?;
        Self::recover(digest, &extra.proposer_seal)
    }
}
