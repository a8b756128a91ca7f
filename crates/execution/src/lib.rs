#![forbid(unsafe_code)]
#![deny(trivial_casts, trivial_numeric_casts)]

pub mod config;
pub mod engine_api;
pub mod error;
pub mod transport;

pub use config::EngineConfig;
pub use engine_api::{client::EngineApiClient, EngineApi};
pub use error::EngineError;
