#![forbid(unsafe_code)]
#![deny(trivial_casts, trivial_numeric_casts)]

pub mod chain;
pub mod error;
pub mod gas_limit;
pub mod storage;

pub use chain::{Blockchain, GasLimitPolicy};
pub use error::StoreError;
pub use storage::Storage;
