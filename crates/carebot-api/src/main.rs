//! carebot entry point.
//!
//! Binary name: `carebot`
//!
//! Parses CLI arguments, installs tracing, loads configuration (file plus
//! environment), then runs the requested command.

mod cli;
mod http;
mod state;

#[cfg(test)]
mod test_support;

use std::path::PathBuf;

use clap::Parser;

use carebot_infra::config::{DEFAULT_CONFIG_FILE, load_config};
use carebot_observe::tracing_setup::{init_tracing, shutdown_tracing};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let mut config = load_config(&config_path).await;

    let result = match cli.command {
        Commands::Serve { port, host } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            cli::serve::serve(&config).await
        }
        Commands::Migrate => cli::maintenance::migrate(&config, cli.json).await,
        Commands::Sweep => cli::maintenance::sweep(&config, cli.json).await,
    };

    shutdown_tracing();
    result
}
