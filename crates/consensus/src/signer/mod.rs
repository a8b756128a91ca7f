//! Header sealing.
//!
//! A [`Signer`] owns every read and write of the IBFT extra: snapshot
//! initialization, the proposer seal, the committed-seal vector and the
//! format check that guards against non-atomic extra mutation. The ECDSA
//! signer covers ECDSA forks; the BLS signer reuses an ECDSA key for the
//! proposer seal and carries index-tagged committed seals.

pub mod bls;
pub mod ecdsa;

use std::collections::BTreeMap;

use cinnabar_types::{
    aliases::{Address, Bytes},
    extra::ExtraError,
    header::Header,
    IbftExtra, Seals, ValidatorKind, ValidatorSet,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error(transparent)]
    Extra(#[from] ExtraError),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("{0} is not in the validator snapshot")]
    UnknownValidator(Address),

    #[error("no committed seals to write")]
    EmptyCommittedSeals,

    #[error("invalid key material: {0}")]
    InvalidKey(String),
}

/// Sealing operations over a header's extra data.
pub trait Signer: Send + Sync {
    /// Address this node signs with.
    fn address(&self) -> Address;

    /// Validator kind the signer produces seals for.
    fn kind(&self) -> ValidatorKind;

    /// Writes a fresh extra into the header: round zero, the given
    /// validator snapshot, empty seal vectors and the parent's committed
    /// seals.
    fn init_ibft_extra(
        &self,
        header: &mut Header,
        validators: &ValidatorSet,
        parent_committed_seals: Option<Seals>,
    );

    /// Signs the seal digest and returns the header with the proposer seal
    /// written and the hash recomputed.
    fn write_proposer_seal(&self, header: &Header) -> Result<Header, SignerError>;

    /// Writes the committed-seal vector collected at commit quorum. Seals
    /// are ordered by the validator snapshot, making the encoding
    /// deterministic across nodes. Unknown signers are an error.
    fn write_committed_seals(
        &self,
        header: &Header,
        seals: &BTreeMap<Address, Bytes>,
    ) -> Result<Header, SignerError>;

    /// Decodes the header's extra.
    fn get_ibft_extra(&self, header: &Header) -> Result<IbftExtra, SignerError>;

    /// Structural check of the extra. Run after every committed-seal write:
    /// a failure means the extra was corrupted mid-mutation and the block
    /// must be dropped.
    fn validate_extra_data_format(&self, header: &Header) -> Result<(), SignerError>;

    /// Recovers the address that wrote the proposer seal.
    fn recover_proposer(&self, header: &Header) -> Result<Address, SignerError>;
}
