//! Main entry point for the appwatch application.
//!
//! Delegates to the CLI handler and maps classified engine failures onto
//! the documented process exit codes.

use appwatch::commands::Cli;
use appwatch::libs::error;

#[tokio::main]
async fn main() {
    if let Err(e) = Cli::menu().await {
        // Classified failures carry their own exit code; anything else,
        // including per-app failure tallies, collapses to 1.
        let code = error::kind_of(&e).map(|kind| kind.exit_code()).unwrap_or(1);
        appwatch::msg_error!(e);
        std::process::exit(code);
    }
}
