// SPDX-FileCopyrightText: 2026 Weft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Weft - follow a live agent session from the terminal.
//!
//! This is the binary entry point.

mod render;
mod tail;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use weft_core::SessionId;

/// Weft - follow a live agent session from the terminal.
#[derive(Parser, Debug)]
#[command(name = "weft", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Follow a session and print its transcript as it streams.
    Tail {
        /// Session to follow.
        session_id: String,
    },
    /// Print a session's stored history and exit.
    History {
        /// Session to print.
        session_id: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => weft_config::load_and_validate_path(path),
        None => weft_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            weft_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.logging.level);

    let result = match cli.command {
        Commands::Tail { session_id } => tail::run_tail(&config, SessionId::from(session_id)).await,
        Commands::History { session_id } => {
            tail::run_history(&config, SessionId::from(session_id)).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("weft: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("weft={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn tail_takes_a_session_and_global_config() {
        let cli = Cli::try_parse_from(["weft", "tail", "ses_123", "--config", "/tmp/weft.toml"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/weft.toml")));
        assert!(matches!(cli.command, Commands::Tail { session_id } if session_id == "ses_123"));
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = weft_config::load_and_validate_str("").expect("default config should be valid");
        assert_eq!(config.server.base_url, "http://localhost:9100");
        assert_eq!(config.logging.level, "info");
    }
}
