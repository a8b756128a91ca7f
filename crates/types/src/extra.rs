//! IBFT extra-data codec.
//!
//! `extraData` of a sealed header is a 32-byte zero vanity prefix followed
//! by the RLP list `[round, validators, proposerSeal, committedSeals,
//! parentCommittedSeals]`. The validator snapshot and the seal vectors are
//! encoded per validator kind: ECDSA entries are bare addresses with
//! 65-byte recoverable signatures, BLS entries are `[address, publicKey]`
//! pairs with `[validatorIndex, signature]` seals.
//!
//! Header hashing erases the committed-seal element without decoding the
//! rest, so the hash stays a pure function of everything else even when the
//! validator kind of a foreign header is unknown.

use alloy_rlp::{Decodable, Encodable};
use thiserror::Error;

use crate::{
    aliases::{Address, Bytes},
    constants::EXTRA_VANITY_LEN,
    rlp::split_elements,
    validator_set::{Validator, ValidatorKind, ValidatorSet},
};

/// Length of an ECDSA recoverable signature: r ++ s ++ v.
pub const ECDSA_SEAL_LEN: usize = 65;

/// Length of a BLS signature in compressed form.
pub const BLS_SEAL_LEN: usize = 96;

/// Position of the committed-seal element inside the extra RLP list.
const COMMITTED_SEALS_INDEX: usize = 3;

/// Position of the proposer-seal element inside the extra RLP list.
const PROPOSER_SEAL_INDEX: usize = 2;

const EXTRA_ELEMENT_COUNT: usize = 5;

#[derive(Debug, Error)]
pub enum ExtraError {
    #[error("extra data shorter than the {EXTRA_VANITY_LEN}-byte vanity prefix")]
    MissingVanity,

    #[error("rlp: {0}")]
    Rlp(#[from] alloy_rlp::Error),

    #[error("expected {EXTRA_ELEMENT_COUNT} extra elements, found {0}")]
    ElementCount(usize),

    #[error("seal vector does not match validator kind {0}")]
    SealVariantMismatch(ValidatorKind),

    #[error("invalid seal length {got}, expected {expected}")]
    SealLength { got: usize, expected: usize },

    #[error("seal index {0} outside validator snapshot")]
    SealIndexOutOfRange(u64),

    #[error("duplicate seal index {0}")]
    DuplicateSealIndex(u64),

    #[error("proposer seal must be empty or {ECDSA_SEAL_LEN} bytes, found {0}")]
    ProposerSealLength(usize),
}

/// A committed seal carrying the index of its validator; used by BLS sets
/// where the signer cannot be recovered from the signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexedSeal {
    pub index: u64,
    pub signature: Bytes,
}

/// Committed-seal vector, shaped per validator kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Seals {
    /// ECDSA: recoverable signatures, signer implied by recovery.
    Serialized(Vec<Bytes>),
    /// BLS: signatures tagged with the validator's snapshot index.
    Indexed(Vec<IndexedSeal>),
}

impl Seals {
    pub fn empty(kind: ValidatorKind) -> Self {
        match kind {
            ValidatorKind::Ecdsa => Self::Serialized(Vec::new()),
            ValidatorKind::Bls => Self::Indexed(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Serialized(seals) => seals.len(),
            Self::Indexed(seals) => seals.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn kind(&self) -> ValidatorKind {
        match self {
            Self::Serialized(_) => ValidatorKind::Ecdsa,
            Self::Indexed(_) => ValidatorKind::Bls,
        }
    }
}

/// Decoded form of a header's `extraData`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IbftExtra {
    pub round: u64,
    pub validators: Vec<Validator>,
    pub proposer_seal: Bytes,
    pub committed_seals: Seals,
    pub parent_committed_seals: Seals,
}

impl IbftExtra {
    /// Fresh extra for a proposal: snapshot of the current set, empty seals.
    pub fn new(round: u64, validators: &ValidatorSet, parent_committed_seals: Seals) -> Self {
        Self {
            round,
            validators: validators.iter().cloned().collect(),
            proposer_seal: Bytes::new(),
            committed_seals: Seals::empty(validators.kind()),
            parent_committed_seals,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut payload = Vec::new();
        self.round.encode(&mut payload);
        encode_validators(&self.validators, &mut payload);
        self.proposer_seal.encode(&mut payload);
        encode_seals(&self.committed_seals, &mut payload);
        encode_seals(&self.parent_committed_seals, &mut payload);

        let mut out = Vec::with_capacity(EXTRA_VANITY_LEN + payload.len() + 4);
        out.extend_from_slice(&[0u8; EXTRA_VANITY_LEN]);
        alloy_rlp::Header { list: true, payload_length: payload.len() }.encode(&mut out);
        out.extend_from_slice(&payload);
        Bytes::from(out)
    }

    pub fn decode(kind: ValidatorKind, extra_data: &[u8]) -> Result<Self, ExtraError> {
        let mut payload = extra_payload(extra_data)?;
        let buf = &mut payload;

        let round = u64::decode(buf)?;
        let validators = decode_validators(kind, buf)?;
        let proposer_seal = Bytes::decode(buf)?;
        let committed_seals = decode_seals(kind, buf)?;
        let parent_committed_seals = decode_seals(kind, buf)?;

        if !buf.is_empty() {
            return Err(ExtraError::ElementCount(EXTRA_ELEMENT_COUNT + 1));
        }

        Ok(Self { round, validators, proposer_seal, committed_seals, parent_committed_seals })
    }

    /// Structural validation of seal vectors against the embedded snapshot.
    ///
    /// The proposer seal may be empty (pre-seal headers) or a recoverable
    /// signature; committed and parent-committed seals must be well-formed
    /// for the given kind. Cryptographic verification is the caller's job.
    pub fn validate(&self, kind: ValidatorKind) -> Result<(), ExtraError> {
        if !self.proposer_seal.is_empty() && self.proposer_seal.len() != ECDSA_SEAL_LEN {
            return Err(ExtraError::ProposerSealLength(self.proposer_seal.len()));
        }
        validate_seals(&self.committed_seals, kind, self.validators.len())?;
        validate_seals(&self.parent_committed_seals, kind, self.validators.len())
    }
}

fn validate_seals(seals: &Seals, kind: ValidatorKind, set_len: usize) -> Result<(), ExtraError> {
    if seals.kind() != kind {
        return Err(ExtraError::SealVariantMismatch(kind));
    }
    match seals {
        Seals::Serialized(seals) => {
            for seal in seals {
                if seal.len() != ECDSA_SEAL_LEN {
                    return Err(ExtraError::SealLength {
                        got: seal.len(),
                        expected: ECDSA_SEAL_LEN,
                    });
                }
            }
        }
        Seals::Indexed(seals) => {
            let mut seen = std::collections::BTreeSet::new();
            for seal in seals {
                if seal.signature.len() != BLS_SEAL_LEN {
                    return Err(ExtraError::SealLength {
                        got: seal.signature.len(),
                        expected: BLS_SEAL_LEN,
                    });
                }
                if seal.index >= set_len as u64 {
                    return Err(ExtraError::SealIndexOutOfRange(seal.index));
                }
                if !seen.insert(seal.index) {
                    return Err(ExtraError::DuplicateSealIndex(seal.index));
                }
            }
        }
    }
    Ok(())
}

/// Strips the vanity prefix and the outer list header, returning the list
/// payload of the extra RLP.
fn extra_payload(extra_data: &[u8]) -> Result<&[u8], ExtraError> {
    if extra_data.len() < EXTRA_VANITY_LEN {
        return Err(ExtraError::MissingVanity);
    }
    let mut buf = &extra_data[EXTRA_VANITY_LEN..];
    let header = alloy_rlp::Header::decode(&mut buf)?;
    if !header.list {
        return Err(alloy_rlp::Error::UnexpectedString.into());
    }
    if buf.len() < header.payload_length {
        return Err(alloy_rlp::Error::InputTooShort.into());
    }
    Ok(&buf[..header.payload_length])
}

/// Re-packs the extra with selected seal elements replaced by empties,
/// keeping every other element byte-for-byte. Works without knowing the
/// validator kind, which is what makes seal-erased hashing possible for
/// headers from any fork.
fn repack_with_erased(extra_data: &[u8], erase_proposer: bool) -> Result<Vec<u8>, ExtraError> {
    let payload = extra_payload(extra_data)?;
    let elements = split_elements(payload)?;
    if elements.len() != EXTRA_ELEMENT_COUNT {
        return Err(ExtraError::ElementCount(elements.len()));
    }

    const EMPTY_STRING: &[u8] = &[alloy_rlp::EMPTY_STRING_CODE];
    const EMPTY_LIST: &[u8] = &[alloy_rlp::EMPTY_LIST_CODE];

    let mut new_payload_len = 0;
    let parts: Vec<&[u8]> = elements
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let part: &[u8] = if i == COMMITTED_SEALS_INDEX {
                EMPTY_LIST
            } else if erase_proposer && i == PROPOSER_SEAL_INDEX {
                EMPTY_STRING
            } else {
                raw
            };
            new_payload_len += part.len();
            part
        })
        .collect();

    let mut out = Vec::with_capacity(EXTRA_VANITY_LEN + new_payload_len + 4);
    out.extend_from_slice(&extra_data[..EXTRA_VANITY_LEN]);
    alloy_rlp::Header { list: true, payload_length: new_payload_len }.encode(&mut out);
    for part in parts {
        out.extend_from_slice(part);
    }
    Ok(out)
}

/// Extra with the committed-seal vector replaced by an empty list; the
/// basis of the header hash.
pub fn erase_committed_seals(extra_data: &[u8]) -> Result<Vec<u8>, ExtraError> {
    repack_with_erased(extra_data, false)
}

/// Extra with both the proposer seal and the committed seals erased; the
/// basis of the digest the round leader signs.
pub fn erase_proposer_and_committed_seals(extra_data: &[u8]) -> Result<Vec<u8>, ExtraError> {
    repack_with_erased(extra_data, true)
}

fn encode_validators(validators: &[Validator], out: &mut Vec<u8>) {
    let mut payload = Vec::new();
    for validator in validators {
        match validator {
            Validator::Ecdsa { address } => address.encode(&mut payload),
            Validator::Bls { address, public_key } => {
                let inner = address.length() + public_key.length();
                alloy_rlp::Header { list: true, payload_length: inner }.encode(&mut payload);
                address.encode(&mut payload);
                public_key.encode(&mut payload);
            }
        }
    }
    alloy_rlp::Header { list: true, payload_length: payload.len() }.encode(out);
    out.extend_from_slice(&payload);
}

fn decode_validators(
    kind: ValidatorKind,
    buf: &mut &[u8],
) -> Result<Vec<Validator>, ExtraError> {
    let header = alloy_rlp::Header::decode(buf)?;
    if !header.list {
        return Err(alloy_rlp::Error::UnexpectedString.into());
    }
    if buf.len() < header.payload_length {
        return Err(alloy_rlp::Error::InputTooShort.into());
    }
    let mut payload = &buf[..header.payload_length];
    *buf = &buf[header.payload_length..];

    let mut validators = Vec::new();
    while !payload.is_empty() {
        let validator = match kind {
            ValidatorKind::Ecdsa => Validator::Ecdsa { address: Address::decode(&mut payload)? },
            ValidatorKind::Bls => {
                let inner = alloy_rlp::Header::decode(&mut payload)?;
                if !inner.list {
                    return Err(alloy_rlp::Error::UnexpectedString.into());
                }
                if payload.len() < inner.payload_length {
                    return Err(alloy_rlp::Error::InputTooShort.into());
                }
                let mut entry = &payload[..inner.payload_length];
                payload = &payload[inner.payload_length..];
                Validator::Bls {
                    address: Address::decode(&mut entry)?,
                    public_key: Bytes::decode(&mut entry)?,
                }
            }
        };
        validators.push(validator);
    }
    Ok(validators)
}

fn encode_seals(seals: &Seals, out: &mut Vec<u8>) {
    let mut payload = Vec::new();
    match seals {
        Seals::Serialized(seals) => {
            for seal in seals {
                seal.encode(&mut payload);
            }
        }
        Seals::Indexed(seals) => {
            for seal in seals {
                let inner = seal.index.length() + seal.signature.length();
                alloy_rlp::Header { list: true, payload_length: inner }.encode(&mut payload);
                seal.index.encode(&mut payload);
                seal.signature.encode(&mut payload);
            }
        }
    }
    alloy_rlp::Header { list: true, payload_length: payload.len() }.encode(out);
    out.extend_from_slice(&payload);
}

fn decode_seals(kind: ValidatorKind, buf: &mut &[u8]) -> Result<Seals, ExtraError> {
    let header = alloy_rlp::Header::decode(buf)?;
    if !header.list {
        return Err(alloy_rlp::Error::UnexpectedString.into());
    }
    if buf.len() < header.payload_length {
        return Err(alloy_rlp::Error::InputTooShort.into());
    }
    let mut payload = &buf[..header.payload_length];
    *buf = &buf[header.payload_length..];

    match kind {
        ValidatorKind::Ecdsa => {
            let mut seals = Vec::new();
            while !payload.is_empty() {
                seals.push(Bytes::decode(&mut payload)?);
            }
            Ok(Seals::Serialized(seals))
        }
        ValidatorKind::Bls => {
            let mut seals = Vec::new();
            while !payload.is_empty() {
                let inner = alloy_rlp::Header::decode(&mut payload)?;
                if !inner.list {
                    return Err(alloy_rlp::Error::UnexpectedString.into());
                }
                if payload.len() < inner.payload_length {
                    return Err(alloy_rlp::Error::InputTooShort.into());
                }
                let mut entry = &payload[..inner.payload_length];
                payload = &payload[inner.payload_length..];
                seals.push(IndexedSeal {
                    index: u64::decode(&mut entry)?,
                    signature: Bytes::decode(&mut entry)?,
                });
            }
            Ok(Seals::Indexed(seals))
        }
    }
}
