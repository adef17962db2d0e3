//! The `cache:stats` command.

use anyhow::Result;
use clap::Args;
use std::process::ExitCode;

use crate::cache::PackageCache;
use crate::cli::clean::human_bytes;
use crate::config;

/// Print package cache statistics.
#[derive(Args)]
pub struct StatsCommand {}

impl StatsCommand {
    /// Report package count, byte total, and cache location.
    pub fn execute(self) -> Result<ExitCode> {
        let home = config::pantry_home()?;
        let cache = PackageCache::open(config::package_cache_dir(&home))?;
        let stats = cache.stats();
        println!("packages: {}", stats.total_packages);
        println!("size:     {}", human_bytes(stats.total_bytes));
        println!("location: {}", cache.location().display());
        Ok(ExitCode::SUCCESS)
    }
}
