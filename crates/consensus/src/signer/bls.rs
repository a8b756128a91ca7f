//! BLS-mode signer.
//!
//! BLS forks change the committed-seal format, not the proposer seal: the
//! round leader still seals with its ECDSA key, while commit signatures are
//! carried as `[validatorIndex, signature]` pairs because a BLS signer
//! cannot be recovered from its signature. Pairing verification of the
//! commit signatures happens in the consensus message layer before a block
//! ever reaches the insert path; the signer enforces identity and format.

use std::collections::BTreeMap;

use cinnabar_types::{
    aliases::{Address, Bytes},
    extra::BLS_SEAL_LEN,
    header::Header,
    IbftExtra, IndexedSeal, Seals, ValidatorKind, ValidatorSet,
};

use super::{ecdsa::EcdsaSigner, Signer, SignerError};

pub struct BlsSigner {
    ecdsa: EcdsaSigner,
    public_key: Bytes,
}

impl BlsSigner {
    pub fn new(ecdsa: EcdsaSigner, public_key: Bytes) -> Result<Self, SignerError> {
        if public_key.len() != 48 {
            return Err(SignerError::InvalidKey(format!(
                "BLS public key must be 48 bytes, got {}",
                public_key.len()
            )));
        }
        Ok(Self { ecdsa, public_key })
    }

    pub fn public_key(&self) -> &Bytes {
        &self.public_key
    }
}

impl Signer for BlsSigner {
    fn address(&self) -> Address {
        self.ecdsa.address()
    }

    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Bls
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
            parent_committed_seals.unwrap_or_else(|| Seals::empty(ValidatorKind::Bls)),
        );
        header.extra_data = extra.encode();
    }

    fn write_proposer_seal(&self, header: &Header) -> Result<Header, SignerError> {
        let digest = header.seal_digest()?;
        let seal = self.ecdsa.sign_digest(digest);

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

        for address in seals.keys() {
            if !extra.validators.iter().any(|v| v.address() == *address) {
                return Err(SignerError::UnknownValidator(*address));
            }
        }

        let mut ordered = Vec::with_capacity(seals.len());
        for (index, validator) in extra.validators.iter().enumerate() {
            let Some(signature) = seals.get(&validator.address()) else { continue };
            if signature.len() != BLS_SEAL_LEN {
                return Err(SignerError::Crypto(format!(
                    "BLS seal length {} != {BLS_SEAL_LEN}",
                    signature.len()
                )));
            }
            ordered.push(IndexedSeal { index: index as u64, signature: signature.clone() });
        }
        extra.committed_seals = Seals::Indexed(ordered);

        let mut sealed = header.clone();
        sealed.extra_data = extra.encode();
        sealed.compute_hash();
        Ok(sealed)
    }

    fn get_ibft_extra(&self, header: &Header) -> Result<IbftExtra, SignerError> {
        Ok(IbftExtra::decode(ValidatorKind::Bls, &header.extra_data)?)
    }

    fn validate_extra_data_format(&self, header: &Header) -> Result<(), SignerError> {
        let extra = self.get_ibft_extra(header)?;
        Ok(extra.validate(ValidatorKind::Bls)?)
    }

    fn recover_proposer(&self, header: &Header) -> Result<Address, SignerError> {
        let extra = self.get_ibft_extra(header)?;
        let digest = header.seal_digest()?;
        EcdsaSigner::recover(digest, &extra.proposer_seal)
    }
}
