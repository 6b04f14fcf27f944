//! Command-line interface for the appwatch engine.
//!
//! The CLI surface is flat: options plus positional application keys.
//!
//! ```bash
//! appwatch                      # check every enabled application
//! appwatch vivaldi VeraCrypt    # check specific applications
//! appwatch -n                   # dry run: discover and verify only
//! appwatch --create-config      # scaffold a default configuration set
//! ```

pub mod check;
pub mod create_config;

use anyhow::Result;
use clap::{ArgAction, Parser};

/// The main CLI structure that parses command-line arguments.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Raise log verbosity
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// Discover and verify, but neither prompt, install, nor persist state
    #[arg(short = 'n', long = "dry-run")]
    dry_run: bool,

    /// Answer every confirmation prompt with yes
    #[arg(short = 'y', long = "yes")]
    yes: bool,

    /// Override the response-cache freshness window, in seconds
    #[arg(long = "cache-duration", value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    cache_duration: Option<u64>,

    /// Write a default set of per-app configurations and exit
    #[arg(long = "create-config")]
    create_config: bool,

    /// Application keys to check; empty means all enabled applications
    apps: Vec<String>,
}

impl Cli {
    /// Parses arguments, configures logging, and dispatches.
    pub async fn menu() -> Result<()> {
        let cli = Self::parse();

        // Tracing output only appears when asked for, either via the
        // environment or -v, so normal runs stay clean.
        let env_debug = std::env::var("APPWATCH_DEBUG").is_ok() || std::env::var("RUST_LOG").is_ok();
        if cli.verbose > 0 || env_debug {
            if cli.verbose > 0 {
                std::env::set_var("APPWATCH_DEBUG", "1");
            }
            let default_filter = if cli.verbose > 1 { "appwatch=trace" } else { "appwatch=debug" };
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
                )
                .init();
        }

        if cli.create_config {
            return create_config::cmd();
        }

        check::cmd(check::CheckArgs {
            dry_run: cli.dry_run,
            assume_yes: cli.yes,
            cache_duration: cli.cache_duration,
            apps: cli.apps,
        })
        .await
    }
}
