#![forbid(unsafe_code)]
#![deny(trivial_casts, trivial_numeric_casts)]

pub mod config;
pub mod logging;
pub mod server;

pub use config::NodeConfig;
pub use server::{new_server, NodeError, Server};
