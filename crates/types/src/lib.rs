#![forbid(unsafe_code)]
#![deny(trivial_casts, trivial_numeric_casts)]

pub mod aliases;
pub mod constants;
pub mod engine_api;
pub mod extra;
pub mod genesis;
pub mod header;
pub mod payload;
pub mod rlp;
pub mod validator_set;

pub use extra::{IbftExtra, IndexedSeal, Seals};
pub use genesis::GenesisSpec;
pub use header::{Block, Body, Header};
pub use payload::ExecutionPayload;
pub use validator_set::{Validator, ValidatorKind, ValidatorSet};
