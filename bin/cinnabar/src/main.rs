//! Consensus node entry point: arguments, logging, runtime, server.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use tracing::info;

use cinnabar_node::{
    logging::{self, LogFormat, LogLevel},
    new_server, NodeConfig,
};

#[derive(Debug, Parser)]
#[command(name = "cinnabar", about, version)]
struct Args {
    /// Path to the node configuration file.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    #[arg(long, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    #[arg(long, default_value_t = LogFormat::Plaintext)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    // Drop guard flushing remaining logs on exit; must not be bound to _.
    let _guard = logging::init(args.log_level, args.log_format);

    let config = NodeConfig::load(&args.config)
        .map_err(|err| eyre!("failed to load {}: {err}", args.config.display()))?;

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;

    runtime.block_on(async {
        let server = new_server(config).await?;
        info!(address = %server.backend().id(), "Consensus node running");

        // The BFT message engine drives the backend from here on; the main
        // task only waits for shutdown.
        tokio::signal::ctrl_c().await?;
        info!("Shutting down");
        Ok(())
    })
}
