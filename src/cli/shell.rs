//! Shell-hook commands: `shell:lookup` and `shell:activate`.
//!
//! Both are consumed by the shell integration, so stdout carries only the
//! wire format (`lookup`) or eval-able shell code (`activate`). A miss or
//! failure is a silent non-zero exit; diagnostics go to stderr only under
//! `--verbose`.

use anyhow::Result;
use clap::Args;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::activate::{ActivateStatus, Activator};
use crate::config;
use crate::installer::BatchOptions;

/// Fast-path environment lookup for the shell hook.
#[derive(Args)]
pub struct LookupCommand {
    /// Directory to look up (typically `$PWD`).
    dir: PathBuf,
}

impl LookupCommand {
    /// Print `<env_bin>|<project_dir>` on a fresh cache hit.
    pub fn execute(self) -> Result<ExitCode> {
        let activator = Activator::new(config::pantry_home()?);
        match activator.lookup(&self.dir) {
            Some(hit) => {
                println!("{}|{}", hit.env_bin.display(), hit.project_dir.display());
                Ok(ExitCode::SUCCESS)
            }
            None => Ok(ExitCode::FAILURE),
        }
    }
}

/// Full activation for the shell hook.
#[derive(Args)]
pub struct ActivateCommand {
    /// Directory to activate (typically `$PWD`).
    dir: PathBuf,
}

impl ActivateCommand {
    /// Emit activation shell code, installing on a cache miss.
    pub async fn execute(self, quiet: bool, no_progress: bool) -> Result<ExitCode> {
        let activator = Activator::new(config::pantry_home()?);
        let options = BatchOptions { quiet, no_progress, ..BatchOptions::default() };

        let mut stdout = std::io::stdout().lock();
        let status = activator.activate(&self.dir, &options, &mut stdout).await?;
        stdout.flush()?;

        match status {
            ActivateStatus::Activated | ActivateStatus::EmptyManifest => Ok(ExitCode::SUCCESS),
            ActivateStatus::NoManifest | ActivateStatus::Failed => Ok(ExitCode::FAILURE),
        }
    }
}
