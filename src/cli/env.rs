//! Environment inspection and removal: `env:lookup`, `env:list`,
//! `env:remove`.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::activate::Activator;
use crate::cache::EnvCache;
use crate::config;
use crate::core::PantryError;
use crate::fingerprint::validate_env_hash;
use crate::utils::remove_dir_if_exists;

/// Look up the cached environment for a directory.
#[derive(Args)]
pub struct LookupCommand {
    /// Directory to look up.
    dir: PathBuf,
}

impl LookupCommand {
    /// Print `<env_bin>|<manifest_path>` on a fresh cache hit; exit 1
    /// silently on a miss.
    pub fn execute(self) -> Result<ExitCode> {
        let activator = Activator::new(config::pantry_home()?);
        match activator.lookup(&self.dir) {
            Some(hit) => {
                println!("{}|{}", hit.env_bin.display(), hit.manifest_path.display());
                Ok(ExitCode::SUCCESS)
            }
            None => Ok(ExitCode::FAILURE),
        }
    }
}

/// List all known environments.
#[derive(Args)]
pub struct ListCommand {}

impl ListCommand {
    /// Print one `hash  env_bin  manifest` row per cached environment.
    pub fn execute(self) -> Result<ExitCode> {
        let home = config::pantry_home()?;
        let cache = EnvCache::load(config::env_cache_file(&home));
        let entries = cache.entries();
        if entries.is_empty() {
            println!("no environments");
            return Ok(ExitCode::SUCCESS);
        }
        for entry in entries {
            println!(
                "{}  {}  {}",
                entry.hash.dimmed(),
                entry.path.display(),
                entry.manifest_path.display()
            );
        }
        Ok(ExitCode::SUCCESS)
    }
}

/// Remove one environment by fingerprint.
#[derive(Args)]
pub struct RemoveCommand {
    /// The 32-character environment hash (see `env:list`).
    hash: String,
}

impl RemoveCommand {
    /// Delete the environment directory and evict its cache row.
    pub fn execute(self) -> Result<ExitCode> {
        validate_env_hash(&self.hash)?;

        let home = config::pantry_home()?;
        let cache = EnvCache::load(config::env_cache_file(&home));
        let Some(entry) = cache.remove(&self.hash)? else {
            return Err(PantryError::EnvNotFound { hash: self.hash }.into());
        };

        // entry.path is the env's bin/; the env dir is its parent
        if let Some(env_dir) = entry.path.parent() {
            remove_dir_if_exists(env_dir)?;
        }
        println!("removed environment for {}", entry.manifest_path.display());
        Ok(ExitCode::SUCCESS)
    }
}
