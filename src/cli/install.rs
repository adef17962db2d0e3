//! The `install` command: run one batch for the nearest manifest.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::process::ExitCode;

use crate::cache::env_cache::{EnvCache, EnvCacheEntry};
use crate::config;
use crate::core::PantryError;
use crate::fingerprint;
use crate::installer::{BatchOptions, BatchReport, InstallEngine};
use crate::manifest::{find_manifest, parse_manifest};

/// Install dependencies from the nearest manifest.
#[derive(Args)]
pub struct InstallCommand {
    /// Skip dev dependencies.
    #[arg(long)]
    production: bool,

    /// Install only dev dependencies.
    #[arg(long, conflicts_with = "production")]
    dev: bool,

    /// Also install peer dependencies.
    #[arg(long)]
    peer: bool,

    /// Exit non-zero when any dependency fails, local warnings included.
    #[arg(long)]
    strict: bool,
}

impl InstallCommand {
    /// Run the install batch and print the summary.
    pub async fn execute(self, quiet: bool, no_progress: bool) -> Result<ExitCode> {
        let cwd = std::env::current_dir()?;
        let manifest = find_manifest(&cwd).ok_or_else(|| PantryError::ManifestNotFound {
            dir: cwd.display().to_string(),
        })?;
        let project_dir = manifest
            .path
            .parent()
            .ok_or_else(|| PantryError::Other {
                message: format!("manifest has no parent directory: {}", manifest.path.display()),
            })?
            .to_path_buf();

        let deps = parse_manifest(&manifest.path)?;
        if deps.is_empty() {
            if !quiet {
                println!("{} has no dependencies", manifest.path.display());
            }
            return Ok(ExitCode::SUCCESS);
        }

        let options = BatchOptions {
            production: self.production,
            dev_only: self.dev,
            include_peer: self.peer,
            quiet,
            no_progress,
        };
        let home = config::pantry_home()?;
        let engine = InstallEngine::new(home.clone())?;
        let report = engine.install_batch(&project_dir, Some(&manifest.path), &deps, &options).await?;

        // Keep the shell hook's fast path warm for this manifest
        let hash = fingerprint::path_hash_hex(&manifest.path);
        if report.any_usable()
            && let Some(entry) = EnvCacheEntry::fresh(&hash, &manifest.path, &report.env_bin)
        {
            EnvCache::load(config::env_cache_file(&home)).put(entry).ok();
        }

        if !quiet {
            print_summary(&report);
        }

        if self.strict && report.failures() > 0 {
            return Ok(ExitCode::FAILURE);
        }
        Ok(ExitCode::SUCCESS)
    }
}

fn print_summary(report: &BatchReport) {
    let installed = report.successes();
    let local = report.skipped_local();
    let failed = report.failures();
    let cached = report.cached_count();

    let mut parts = vec![format!("{installed} installed ({cached} cached)")];
    if local > 0 {
        parts.push(format!("{local} local"));
    }
    if failed > 0 {
        parts.push(format!("{failed} failed"));
    }
    println!("{} {}", "✓".green().bold(), parts.join(", "));

    for line in report.failure_lines() {
        println!("  {} {line}", "✗".red());
    }
    if !report.lockfile_written {
        println!("  {} lockfile could not be written", "warning:".yellow());
    }
}
