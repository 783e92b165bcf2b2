// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Murmur - a packet-radio mesh to conversational AI bridge.
//!
//! This is the binary entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod serve;
mod status;

/// Murmur - a packet-radio mesh to conversational AI bridge.
#[derive(Parser, Debug)]
#[command(name = "murmur", version, about, long_about = None)]
struct Cli {
    /// Path to an explicit config file (otherwise the XDG hierarchy).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect to the mesh and run the bridge.
    Serve,
    /// Show the resolved configuration and transport target.
    Status,
    /// Print the resolved configuration as TOML.
    Config,
}

fn load_config(path: Option<&PathBuf>) -> murmur_config::MurmurConfig {
    let result = match path {
        Some(path) => murmur_config::load_and_validate_path(path),
        None => murmur_config::load_and_validate(),
    };
    match result {
        Ok(config) => config,
        Err(errors) => {
            murmur_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("murmur={log_level},warn")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    match cli.command {
        Some(Commands::Serve) => {
            init_tracing(&config.bridge.log_level);
            if let Err(e) = serve::run(config).await {
                eprintln!("murmur: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Status) => {
            status::print_status(&config);
        }
        Some(Commands::Config) => match toml::to_string_pretty(&config) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => {
                eprintln!("murmur: failed to render config: {e}");
                std::process::exit(1);
            }
        },
        None => {
            println!("murmur: use --help for available commands");
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        super::Cli::command().debug_assert();
    }

    #[test]
    fn default_config_loads() {
        let config = murmur_config::load_config_from_str("").unwrap();
        assert!(murmur_config::validate_config(&config).is_ok());
        assert_eq!(config.bridge.name, "murmur");
    }
}
