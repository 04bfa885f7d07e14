// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rosalind - dispatch backend for research workflows.
//!
//! One binary, two long-running roles: `serve` is the API process, `worker`
//! executes queued stage jobs against agent services. Both share the same
//! SQLite store.

mod check;
mod serve;
mod shutdown;
mod worker;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rosalind_config::{ConfigError, RosalindConfig};

/// Rosalind - dispatch backend for research workflows.
#[derive(Parser, Debug)]
#[command(name = "rosalind", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, short, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Start the HTTP API.
    Serve,
    /// Run the stage job worker pool.
    Worker,
    /// Validate configuration and print the resolved routing tables.
    CheckConfig,
}

fn load(path: Option<&std::path::Path>) -> Result<RosalindConfig, Vec<ConfigError>> {
    match path {
        Some(path) => rosalind_config::load_and_validate_path(path),
        None => rosalind_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            rosalind_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Worker => worker::run_worker(config).await,
        Commands::CheckConfig => {
            for line in check::summary(&config) {
                println!("{line}");
            }
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("rosalind: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subcommands_parse() {
        let cli = Cli::try_parse_from(["rosalind", "serve"]).unwrap();
        assert_eq!(cli.command, Commands::Serve);
        assert!(cli.config.is_none());

        let cli = Cli::try_parse_from(["rosalind", "worker", "--config", "/tmp/r.toml"]).unwrap();
        assert_eq!(cli.command, Commands::Worker);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/r.toml")));

        let cli = Cli::try_parse_from(["rosalind", "check-config"]).unwrap();
        assert_eq!(cli.command, Commands::CheckConfig);
    }

    #[test]
    fn a_subcommand_is_required() {
        assert!(Cli::try_parse_from(["rosalind"]).is_err());
    }

    #[test]
    fn explicit_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rosalind.toml");
        std::fs::write(&path, "[server]\nport = 9090\n").unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(
            config.agent_url("agent-stage2-lit"),
            Some("http://agent-stage2-lit:8010")
        );

        std::fs::write(&path, "[server]\nprot = 9090\n").unwrap();
        assert!(load(Some(&path)).is_err());
    }
}
