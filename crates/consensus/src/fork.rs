//! Fork schedule and the signer/validator/hook resolution it drives.
//!
//! Forks are ordered by start height; the fork active at height `h` is the
//! one with the greatest start height ≤ `h`. Each fork pins the validator
//! kind, the epoch size, optional explicit validator overrides and a
//! feature set.

use std::{
    collections::BTreeSet,
    sync::{Arc, RwLock},
};

use cinnabar_types::{
    aliases::Bytes,
    validator_set::{ValidatorKind, ValidatorSet},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::{
    hooks::{register_tx_inclusion_guard, HookError, Hooks},
    signer::{bls::BlsSigner, ecdsa::EcdsaSigner, Signer},
};

/// Feature flags a fork can activate.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ChainFeature {
    /// Belgrade: the header's state root follows the execution payload
    /// instead of staying pinned to the empty root.
    Belgrade,
}

/// One entry of the fork schedule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForkSpec {
    pub start_height: u64,
    pub validator_kind: ValidatorKind,
    pub epoch_size: u64,
    /// Explicit validator set effective from `start_height`; wins over the
    /// derived set.
    #[serde(default)]
    pub validators: Option<ValidatorSet>,
    #[serde(default)]
    pub min_validator_count: Option<u64>,
    #[serde(default)]
    pub max_validator_count: Option<u64>,
    #[serde(default)]
    pub features: BTreeSet<ChainFeature>,
}

#[derive(Debug, Error)]
pub enum ForkError {
    #[error("fork schedule is empty")]
    EmptySchedule,

    #[error("first fork must start at height 0, starts at {0}")]
    ScheduleStart(u64),

    #[error("fork schedule is not strictly increasing at height {0}")]
    ScheduleOrder(u64),

    #[error("fork at {0} has epoch size 0")]
    ZeroEpoch(u64),

    #[error("fork at {start} wants {got} validators, allowed range is [{min}, {max}]")]
    ValidatorCount { start: u64, got: u64, min: u64, max: u64 },

    #[error("fork at {0} overrides validators of kind {1}, fork kind is {2}")]
    OverrideKind(u64, ValidatorKind, ValidatorKind),

    #[error("no fork active at height {0}")]
    NoActiveFork(u64),

    #[error("fork at {0} uses BLS validators but no BLS public key is configured")]
    MissingBlsKey(u64),

    #[error("invalid BLS public key: {0}")]
    InvalidBlsKey(String),

    #[error("no validators available at height {0}")]
    NoValidators(u64),
}

/// Resolves (signer, validator set, hooks) for any height.
pub struct ForkManager {
    schedule: Vec<ForkSpec>,
    ecdsa_signer: Arc<EcdsaSigner>,
    bls_signer: Option<Arc<BlsSigner>>,
    /// Derived validator set: starts from genesis and is swapped by the
    /// post-insert hook one block before a fork with an override begins.
    current_validators: RwLock<ValidatorSet>,
}

impl ForkManager {
    pub fn new(
        mut schedule: Vec<ForkSpec>,
        key: EcdsaSigner,
        bls_public_key: Option<Bytes>,
        genesis_validators: ValidatorSet,
    ) -> Result<Self, ForkError> {
        if schedule.is_empty() {
            return Err(ForkError::EmptySchedule);
        }
        schedule.sort_by_key(|fork| fork.start_height);
        if schedule[0].start_height != 0 {
            return Err(ForkError::ScheduleStart(schedule[0].start_height));
        }
        for pair in schedule.windows(2) {
            if pair[0].start_height == pair[1].start_height {
                return Err(ForkError::ScheduleOrder(pair[1].start_height));
            }
        }

        for fork in &schedule {
            if fork.epoch_size == 0 {
                return Err(ForkError::ZeroEpoch(fork.start_height));
            }
            if let Some(validators) = &fork.validators {
                if validators.kind() != fork.validator_kind {
                    return Err(ForkError::OverrideKind(
                        fork.start_height,
                        validators.kind(),
                        fork.validator_kind,
                    ));
                }
                let min = fork.min_validator_count.unwrap_or(1);
                let max = fork.max_validator_count.unwrap_or(u64::MAX);
                let got = validators.len() as u64;
                if got < min || got > max {
                    return Err(ForkError::ValidatorCount {
                        start: fork.start_height,
                        got,
                        min,
                        max,
                    });
                }
            }
        }

        let ecdsa_signer = Arc::new(key);
        let bls_signer = match bls_public_key {
            Some(public_key) => {
                let ecdsa = EcdsaSigner::new(*ecdsa_signer.secret_key());
                Some(Arc::new(
                    BlsSigner::new(ecdsa, public_key)
                        .map_err(|err| ForkError::InvalidBlsKey(err.to_string()))?,
                ))
            }
            None => None,
        };
        if bls_signer.is_none() {
            if let Some(fork) = schedule.iter().find(|f| f.validator_kind == ValidatorKind::Bls)
            {
                return Err(ForkError::MissingBlsKey(fork.start_height));
            }
        }

        Ok(Self {
            schedule,
            ecdsa_signer,
            bls_signer,
            current_validators: RwLock::new(genesis_validators),
        })
    }

    /// The fork with the greatest start height ≤ `height`.
    pub fn active_fork(&self, height: u64) -> Result<&ForkSpec, ForkError> {
        self.schedule
            .iter()
            .rev()
            .find(|fork| fork.start_height <= height)
            .ok_or(ForkError::NoActiveFork(height))
    }

    pub fn get_signer(&self, height: u64) -> Result<Arc<dyn Signer>, ForkError> {
        let fork = self.active_fork(height)?;
        match fork.validator_kind {
            ValidatorKind::Ecdsa => Ok(self.ecdsa_signer.clone()),
            ValidatorKind::Bls => self
                .bls_signer
                .clone()
                .map(|signer| -> Arc<dyn Signer> { signer })
                .ok_or(ForkError::MissingBlsKey(fork.start_height)),
        }
    }

    /// Validator set effective at `height`: the active fork's explicit
    /// override wins over the derived set.
    pub fn get_validators(&self, height: u64) -> Result<ValidatorSet, ForkError> {
        let fork = self.active_fork(height)?;
        if let Some(validators) = &fork.validators {
            return Ok(validators.clone());
        }

        let current = self
            .current_validators
            .read()
            .map_err(|_| ForkError::NoValidators(height))?
            .clone();
        if current.is_empty() {
            return Err(ForkError::NoValidators(height));
        }
        Ok(current)
    }

    /// Swaps the derived validator set; fired by the post-insert hook one
    /// block before `from_height`.
    pub fn update_validator_set(&self, validators: ValidatorSet, from_height: u64) {
        info!(from_height, count = validators.len(), "Updating validator set");
        if let Ok(mut current) = self.current_validators.write() {
            *current = validators;
        }
    }

    pub fn epoch_size(&self, height: u64) -> Result<u64, ForkError> {
        Ok(self.active_fork(height)?.epoch_size)
    }

    pub fn is_feature_active(&self, feature: ChainFeature, height: u64) -> bool {
        self.active_fork(height)
            .map(|fork| fork.features.contains(&feature))
            .unwrap_or(false)
    }

    /// Assembles the hook set for `height`: the epoch transaction guard,
    /// and, when the next fork carries a validator override, the
    /// post-insert swap that arms it one block early.
    pub fn get_hooks(self: &Arc<Self>, height: u64) -> Hooks {
        let mut hooks = Hooks::default();

        if let Ok(fork) = self.active_fork(height) {
            register_tx_inclusion_guard(&mut hooks, fork.epoch_size);

            let next_with_override = self
                .schedule
                .iter()
                .find(|next| next.start_height > fork.start_height && next.validators.is_some())
                .cloned();
            if let Some(next) = next_with_override {
                let manager = Arc::clone(self);
                hooks.post_insert_block_fn = Some(Box::new(move |block| {
                    if block.number() + 1 != next.start_height {
                        return Ok(());
                    }
                    let validators = next
                        .validators
                        .clone()
                        .ok_or_else(|| HookError::Other("override vanished".to_string()))?;
                    manager.update_validator_set(validators, next.start_height);
                    Ok(())
                }));
            }
        }

        hooks
    }
}
