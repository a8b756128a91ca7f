//! Ordered validator sets with polymorphic element types.
//!
//! Every node derives the same ordering for a given set, so validator
//! indices are stable across the cluster and can be embedded in seal
//! vectors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aliases::{Address, Bytes};

/// Signing scheme used by a validator set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorKind {
    Ecdsa,
    Bls,
}

impl std::fmt::Display for ValidatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ecdsa => f.write_str("ecdsa"),
            Self::Bls => f.write_str("bls"),
        }
    }
}

/// A single validator entry.
///
/// BLS validators carry the public key alongside the address because the
/// key cannot be recovered from a BLS signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Validator {
    Ecdsa { address: Address },
    Bls { address: Address, public_key: Bytes },
}

impl Validator {
    pub fn address(&self) -> Address {
        match self {
            Self::Ecdsa { address } => *address,
            Self::Bls { address, .. } => *address,
        }
    }

    pub fn kind(&self) -> ValidatorKind {
        match self {
            Self::Ecdsa { .. } => ValidatorKind::Ecdsa,
            Self::Bls { .. } => ValidatorKind::Bls,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidatorSetError {
    #[error("validator {0} already present in set")]
    Duplicate(Address),

    #[error("validator kind mismatch: set is {set}, entry is {entry}")]
    KindMismatch { set: ValidatorKind, entry: ValidatorKind },
}

/// Deterministically ordered set of validators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSet {
    kind: ValidatorKind,
    validators: Vec<Validator>,
}

impl ValidatorSet {
    pub fn new(kind: ValidatorKind) -> Self {
        Self { kind, validators: Vec::new() }
    }

    pub fn from_validators(
        kind: ValidatorKind,
        validators: impl IntoIterator<Item = Validator>,
    ) -> Result<Self, ValidatorSetError> {
        let mut set = Self::new(kind);
        for validator in validators {
            set.add(validator)?;
        }
        Ok(set)
    }

    /// Convenience constructor for ECDSA sets.
    pub fn from_addresses(addresses: impl IntoIterator<Item = Address>) -> Self {
        Self {
            kind: ValidatorKind::Ecdsa,
            validators: addresses.into_iter().map(|address| Validator::Ecdsa { address }).collect(),
        }
    }

    pub fn add(&mut self, validator: Validator) -> Result<(), ValidatorSetError> {
        if validator.kind() != self.kind {
            return Err(ValidatorSetError::KindMismatch {
                set: self.kind,
                entry: validator.kind(),
            });
        }
        if self.contains(&validator.address()) {
            return Err(ValidatorSetError::Duplicate(validator.address()));
        }
        self.validators.push(validator);
        Ok(())
    }

    pub fn kind(&self) -> ValidatorKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.index_of(address).is_some()
    }

    pub fn index_of(&self, address: &Address) -> Option<usize> {
        self.validators.iter().position(|v| v.address() == *address)
    }

    pub fn get(&self, index: usize) -> Option<&Validator> {
        self.validators.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Validator> {
        self.validators.iter()
    }

    /// Minimum number of validators whose agreement finalizes a block: ⌈2N/3⌉.
    pub fn quorum(&self) -> u64 {
        (2 * self.validators.len() as u64).div_ceil(3)
    }

    /// Maximum number of faulty validators the set tolerates: ⌊(N-1)/3⌋.
    pub fn max_faulty(&self) -> u64 {
        (self.validators.len() as u64).saturating_sub(1) / 3
    }
}
