// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! wamux - multi-tenant WhatsApp session multiplexer.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod sessions;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use wamux_config::model::WamuxConfig;

/// wamux - multi-tenant WhatsApp session multiplexer.
#[derive(Parser, Debug)]
#[command(name = "wamux", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP gateway and manage sessions (default).
    Serve,
    /// List persisted sessions straight from the database.
    Sessions {
        /// Output JSON for scripting.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Validate the configuration and print the effective values.
    CheckConfig,
}

fn load_config(path: Option<&PathBuf>) -> WamuxConfig {
    let loaded = match path {
        Some(path) => wamux_config::load_and_validate_path(path),
        None => wamux_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            wamux_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Sessions { json, plain } => sessions::run_sessions(&config, json, plain).await,
        Commands::CheckConfig => match wamux_config::render_effective(&config) {
            Ok(rendered) => {
                eprintln!("wamux: configuration is valid");
                println!("{rendered}");
                Ok(())
            }
            Err(e) => {
                wamux_config::render_errors(&[e]);
                std::process::exit(1);
            }
        },
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_defaults_to_serve() {
        let cli = Cli::parse_from(["wamux"]);
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn cli_parses_sessions_flags() {
        let cli = Cli::parse_from(["wamux", "sessions", "--json", "--config", "/tmp/w.toml"]);
        match cli.command {
            Some(Commands::Sessions { json, plain }) => {
                assert!(json);
                assert!(!plain);
            }
            other => panic!("expected sessions, got {other:?}"),
        }
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/w.toml")));
    }

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
