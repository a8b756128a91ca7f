#![forbid(unsafe_code)]
#![deny(trivial_casts, trivial_numeric_casts)]

pub mod backend;
pub mod error;
pub mod fork;
pub mod hooks;
pub mod signer;

pub use backend::{CommittedSeal, IbftBackend};
pub use error::ConsensusError;
pub use fork::{ChainFeature, ForkManager, ForkSpec};
pub use signer::{bls::BlsSigner, ecdsa::EcdsaSigner, Signer, SignerError};
