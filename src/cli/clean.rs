//! The `clean` command: wipe local state, global environments, or the
//! package cache.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::process::ExitCode;

use crate::cache::{EnvCache, PackageCache};
use crate::config;
use crate::fingerprint;
use crate::manifest::find_manifest;
use crate::utils::{remove_dir_if_exists, remove_file_if_exists};

/// Wipe pantry state. With no flags, cleans everything.
#[derive(Args)]
pub struct CleanCommand {
    /// Remove the current project's `pantry_modules/`, `.freezer`, and
    /// env-cache entry.
    #[arg(long)]
    local: bool,

    /// Remove all environment directories and the env cache.
    #[arg(long)]
    global: bool,

    /// Clear the package cache.
    #[arg(long)]
    cache: bool,
}

impl CleanCommand {
    /// Run the requested clean operations.
    pub fn execute(self, quiet: bool) -> Result<ExitCode> {
        let all = !self.local && !self.global && !self.cache;
        let home = config::pantry_home()?;

        if self.local || all {
            let cwd = std::env::current_dir()?;
            if let Some(manifest) = find_manifest(&cwd) {
                let project_dir = manifest.path.parent().unwrap_or(&cwd);
                remove_dir_if_exists(&project_dir.join("pantry_modules"))?;
                remove_file_if_exists(&project_dir.join(crate::lockfile::LOCKFILE_NAME))?;
                let env_cache = EnvCache::load(config::env_cache_file(&home));
                env_cache.remove(&fingerprint::path_hash_hex(&manifest.path))?;
                if !quiet {
                    println!("{} local state for {}", "cleaned".green(), project_dir.display());
                }
            } else if self.local && !quiet {
                println!("no manifest found; nothing local to clean");
            }
        }

        if self.global || all {
            remove_dir_if_exists(&config::envs_dir(&home))?;
            EnvCache::load(config::env_cache_file(&home)).clear()?;
            if !quiet {
                println!("{} all environments", "cleaned".green());
            }
        }

        if self.cache || all {
            let cache = PackageCache::open(config::package_cache_dir(&home))?;
            let stats = cache.stats();
            cache.clear()?;
            if !quiet {
                println!(
                    "{} package cache ({} packages, {})",
                    "cleaned".green(),
                    stats.total_packages,
                    human_bytes(stats.total_bytes)
                );
            }
        }

        Ok(ExitCode::SUCCESS)
    }
}

/// Render a byte count the way humans read it.
pub(crate) fn human_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
