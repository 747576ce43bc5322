//! CLI command definitions for the `carebot` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod maintenance;
pub mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Patient-facing chat backend for the healthcare portal.
#[derive(Parser)]
#[command(name = "carebot", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (TOML). Defaults to `carebot.toml` in the working directory.
    #[arg(long, global = true, env = "CAREBOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP and WebSocket server.
    Serve {
        /// Port to listen on (overrides the config file).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides the config file).
        #[arg(long)]
        host: Option<String>,
    },

    /// Apply database migrations and exit.
    Migrate,

    /// Delete expired sessions once and print how many were removed.
    Sweep,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_with_overrides() {
        let cli = Cli::try_parse_from(["carebot", "-vv", "serve", "--port", "4000", "--host", "127.0.0.1"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Serve { port, host } => {
                assert_eq!(port, Some(4000));
                assert_eq!(host.as_deref(), Some("127.0.0.1"));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["carebot", "sweep", "--config", "/etc/carebot.toml", "--otel"])
            .unwrap();
        assert!(cli.otel);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/carebot.toml")));
        assert!(matches!(cli.command, Commands::Sweep));
    }

    #[test]
    fn test_cli_definition_is_valid() {
        <Cli as clap::CommandFactory>::command().debug_assert();
    }
}
