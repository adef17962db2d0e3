//! pantry CLI entry point
//!
//! Handles command-line argument parsing, logging setup, error display,
//! and command execution. Logging always goes to stderr: the shell-hook
//! subcommands reserve stdout for eval-able output, and mixing the two
//! would execute log lines in the user's shell.

use anyhow::Result;
use clap::Parser;
use pantry_cli::cli;
use pantry_cli::core::user_friendly_error;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = cli::Cli::parse();

    // Logging level rules:
    // 1. RUST_LOG set - use it, verbose flag or not
    // 2. RUST_LOG unset, --verbose - debug level
    // 3. RUST_LOG unset, no flag - logging off
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"))
    } else if cli.verbose() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("off")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.execute().await {
        Ok(code) => Ok(code),
        Err(e) => {
            user_friendly_error(e).display();
            Ok(ExitCode::FAILURE)
        }
    }
}
