//! Command-line interface for pantry.
//!
//! Each command is implemented as a separate module with its own argument
//! structure and execution logic. Commands fall into two categories with
//! different output disciplines:
//!
//! - **Human commands** (`install`, `env:list`, `clean`, `cache:stats`)
//!   print summaries to stdout and may render progress.
//! - **Hook commands** (`shell:lookup`, `shell:activate`, `env:lookup`)
//!   are consumed by the shell integration: stdout carries only the wire
//!   format or eval-able shell code, human text goes to stderr, and a
//!   miss is a silent exit 1.
//!
//! # Shell integration
//!
//! The hook installed in the user's shell rc runs, on every directory
//! change:
//!
//! ```bash
//! if pantry shell:lookup "$PWD" >/dev/null 2>&1; then
//!     eval "$(pantry shell:activate "$PWD")"
//! fi
//! ```
//!
//! # Exit codes
//!
//! 0: success, including batches with per-package warnings.
//! 1: fatal, meaning no manifest, unrecoverable I/O, a cache miss on a
//! hook lookup, or an unknown environment hash.

mod cache;
mod clean;
mod env;
mod install;
mod shell;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::ExitCode;

/// Top-level CLI for the pantry environment manager.
#[derive(Parser)]
#[command(
    name = "pantry",
    about = "Project-scoped developer environments with shell auto-activation",
    version,
    long_about = "pantry materializes an isolated environment for each project's dependency \
                  manifest and wires its bin/ onto PATH when you enter the project."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output (equivalent to RUST_LOG=debug).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Disable progress rendering (automation, non-ANSI terminals).
    #[arg(long, global = true)]
    no_progress: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Install dependencies from the nearest manifest.
    Install(install::InstallCommand),

    /// Shell-hook fast path: print `<env_bin>|<project_dir>` on a cache
    /// hit, exit 1 silently on a miss.
    #[command(name = "shell:lookup")]
    ShellLookup(shell::LookupCommand),

    /// Emit eval-able shell code activating the project's environment,
    /// installing it first if needed.
    #[command(name = "shell:activate")]
    ShellActivate(shell::ActivateCommand),

    /// Print `<env_bin>|<manifest_path>` for a directory's cached
    /// environment.
    #[command(name = "env:lookup")]
    EnvLookup(env::LookupCommand),

    /// List known environments.
    #[command(name = "env:list")]
    EnvList(env::ListCommand),

    /// Remove one environment by its 32-character fingerprint.
    #[command(name = "env:remove")]
    EnvRemove(env::RemoveCommand),

    /// Wipe project-local state, global environments, or the package
    /// cache.
    Clean(clean::CleanCommand),

    /// Print package cache statistics.
    #[command(name = "cache:stats")]
    CacheStats(cache::StatsCommand),
}

impl Cli {
    /// Whether `--verbose` was passed; consulted before logging init.
    #[must_use]
    pub const fn verbose(&self) -> bool {
        self.verbose
    }

    /// Whether this invocation is a shell-hook command whose stdout is
    /// consumed programmatically.
    #[must_use]
    pub const fn is_hook_command(&self) -> bool {
        matches!(
            self.command,
            Commands::ShellLookup(_) | Commands::ShellActivate(_) | Commands::EnvLookup(_)
        )
    }

    /// Execute the selected command.
    pub async fn execute(self) -> Result<ExitCode> {
        let quiet = self.quiet;
        let no_progress = self.no_progress;
        match self.command {
            Commands::Install(cmd) => cmd.execute(quiet, no_progress).await,
            Commands::ShellLookup(cmd) => cmd.execute(),
            Commands::ShellActivate(cmd) => cmd.execute(quiet, no_progress).await,
            Commands::EnvLookup(cmd) => cmd.execute(),
            Commands::EnvList(cmd) => cmd.execute(),
            Commands::EnvRemove(cmd) => cmd.execute(),
            Commands::Clean(cmd) => cmd.execute(quiet),
            Commands::CacheStats(cmd) => cmd.execute(),
        }
    }
}
