//! Batch installation for one project.
//!
//! [`InstallEngine`] owns one installation batch: it addresses the
//! environment directory, partitions local from registry dependencies,
//! dispatches registry installs to a bounded pool of blocking workers,
//! finalizes local dependencies serially via symlinks, writes the
//! lockfile, and hands back a [`BatchReport`] the CLI renders into a
//! summary.
//!
//! # Parallel installation architecture
//!
//! Registry dependencies are installed concurrently, capped at
//! [`MAX_WORKERS`] workers regardless of how many the manifest lists. The
//! dispatch uses `stream::iter(..).buffer_unordered(cap)` over
//! `spawn_blocking` tasks: each worker is a blocking thread running one
//! [`SingleInstaller`], and the stream bounds how many are in flight.
//! The cap balances fetch parallelism against remote-server politeness
//! and is fixed at the engine boundary, not configurable per manifest.
//!
//! Every worker carries its manifest index and writes its outcome into
//! that slot, so the results array is in manifest order regardless of
//! completion order. Workers share exactly two mutable things: the
//! package cache index and the [`InstallingStack`] that deduplicates
//! concurrent installs of the same `(name, version)`.
//!
//! # Failure accounting
//!
//! Per-package failures never abort the batch; they land in the results
//! array and the summary. Only batch-wide setup failures (environment
//! directory creation) error out of [`InstallEngine::install_batch`]. A
//! lockfile write failure is deliberately a warning: the environment on
//! disk is already good, and the next successful batch rewrites the file.
//!
//! # Installation Process
//!
//! 1. **Filtering**: the dep-type filter is applied to the manifest list
//!    ([`InstallEngine::filter_deps`])
//! 2. **Addressing**: the environment directory is derived from the
//!    project path and the manifest bytes, and `bin/` is created
//! 3. **Partitioning**: local dependencies are split from registry
//!    dependencies; result slots are pre-initialized to failure sentinels
//! 4. **Parallel installs**: registry dependencies run on the bounded
//!    worker pool, each writing its own slot
//! 5. **Local finalization**: local dependencies are wired serially via
//!    `pantry_modules/` and `bin/` symlinks
//! 6. **Lockfile**: one entry per non-failed slot, in manifest order,
//!    written atomically to `.freezer`
//! 7. **Report**: counts, failure lines, and the lockfile are returned
//!    for the caller to render
//!
//! # Examples
//!
//! ```rust,no_run
//! use pantry_cli::config;
//! use pantry_cli::installer::{BatchOptions, InstallEngine};
//! use pantry_cli::manifest::{find_manifest, parse_manifest};
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let manifest = find_manifest(Path::new("/work/api")).expect("no manifest found");
//! let deps = parse_manifest(&manifest.path)?;
//!
//! let engine = InstallEngine::new(config::pantry_home()?)?;
//! let report = engine
//!     .install_batch(
//!         Path::new("/work/api"),
//!         Some(&manifest.path),
//!         &deps,
//!         &BatchOptions::default(),
//!     )
//!     .await?;
//!
//! println!("{} installed, {} failed", report.successes(), report.failures());
//! for line in report.failure_lines() {
//!     eprintln!("  {line}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod single;
pub mod stack;

pub use single::{InstallOptions, InstallOutcome, SingleInstaller};
pub use stack::{InstallGuard, InstallingStack};

use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::PackageCache;
use crate::core::{PantryError, Result};
use crate::lockfile::{LOCKFILE_NAME, Lockfile, LockfileEntry};
use crate::models::{DepType, DependencyRecord, PackageSource};
use crate::registry::{BuiltinRegistry, Fetcher, HttpFetcher, PackageRegistry};
use crate::utils::progress::InstallProgress;
use crate::utils::{ensure_dir, replace_symlink, resolve_target};
use crate::{config, fingerprint};

/// Upper bound on concurrent install workers per batch.
///
/// Fixed at the engine boundary; a manifest listing 32 dependencies still
/// runs at most 4 fetch+extract operations at any instant.
pub const MAX_WORKERS: usize = 4;

/// Batch-level installation options.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Skip dev dependencies.
    pub production: bool,
    /// Install only dev dependencies.
    pub dev_only: bool,
    /// Also install peer dependencies.
    pub include_peer: bool,
    /// Suppress human-readable progress.
    pub quiet: bool,
    /// Disable in-place progress rendering.
    pub no_progress: bool,
}

/// The result of one installation batch.
///
/// Invariant: `results.len() == deps.len()`, and `results[i]` describes
/// `deps[i]` regardless of worker completion order, so successes plus
/// failures plus skipped-local always equals the filtered dependency
/// count. The CLI and the activator read everything they render from
/// this report; the engine itself prints nothing.
#[derive(Debug)]
pub struct BatchReport {
    /// The environment directory for this project + manifest.
    pub env_dir: PathBuf,
    /// The environment's `bin/` directory.
    pub env_bin: PathBuf,
    /// The dependencies the batch operated on, filter applied, in
    /// manifest order.
    pub deps: Vec<DependencyRecord>,
    /// Per-dependency outcomes; `results[i]` corresponds to `deps[i]`.
    pub results: Vec<InstallOutcome>,
    /// The lockfile built for this batch.
    pub lockfile: Lockfile,
    /// Whether the lockfile reached disk; `false` is a warning, not a
    /// batch failure.
    pub lockfile_written: bool,
}

impl BatchReport {
    /// Count of installed packages (including in-progress skips, which
    /// another worker completed).
    #[must_use]
    pub fn successes(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Count of failed slots, local warnings included.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| r.is_failure()).count()
    }

    /// Count of local dependencies finalized by symlink.
    #[must_use]
    pub fn skipped_local(&self) -> usize {
        self.results.iter().filter(|r| matches!(r, InstallOutcome::SkippedLocal)).count()
    }

    /// Count of failures among registry (non-local) dependencies.
    ///
    /// Local warnings do not affect the exit code; registry failures do.
    #[must_use]
    pub fn registry_failures(&self) -> usize {
        self.deps
            .iter()
            .zip(&self.results)
            .filter(|(dep, result)| !dep.is_local() && result.is_failure())
            .count()
    }

    /// Whether the batch exits zero: no registry dependency failed.
    #[must_use]
    pub fn exit_ok(&self) -> bool {
        self.registry_failures() == 0
    }

    /// Whether at least one usable thing landed in the environment,
    /// the threshold for emitting a PATH export on partial failure.
    #[must_use]
    pub fn any_usable(&self) -> bool {
        self.successes() > 0 || self.skipped_local() > 0
    }

    /// Formatted `<pkg>@<version> (<reason>)` lines for every failure.
    #[must_use]
    pub fn failure_lines(&self) -> Vec<String> {
        self.results.iter().filter_map(InstallOutcome::failure_line).collect()
    }

    /// How many successes were served from the package cache.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| match r {
                InstallOutcome::Installed { package, .. } => package.from_cache,
                InstallOutcome::SkippedInProgress { .. } => true,
                _ => false,
            })
            .count()
    }
}

/// Orchestrates installation batches against shared collaborators.
///
/// One engine serves one pantry home. The package cache, registry, and
/// fetcher are `Arc`-shared into every worker; the engine itself holds
/// no per-batch state, so a single instance can run batch after batch
/// (the activator reuses one across the cache-miss path).
///
/// # Examples
///
/// The default engine wires the builtin registry and HTTP fetcher:
///
/// ```rust,no_run
/// use pantry_cli::config;
/// use pantry_cli::installer::InstallEngine;
///
/// # fn example() -> anyhow::Result<()> {
/// let engine = InstallEngine::new(config::pantry_home()?)?;
/// let stats = engine.cache().stats();
/// println!("{} packages already cached", stats.total_packages);
/// # Ok(())
/// # }
/// ```
///
/// Tests substitute the collaborators to stay hermetic:
///
/// ```rust,ignore
/// let engine = InstallEngine::with_collaborators(home, cache, registry, fetcher);
/// ```
pub struct InstallEngine {
    home: PathBuf,
    cache: Arc<PackageCache>,
    registry: Arc<dyn PackageRegistry>,
    fetcher: Arc<dyn Fetcher>,
}

impl InstallEngine {
    /// Build the default engine: builtin registry, HTTP fetcher, package
    /// cache under the pantry home.
    pub fn new(home: PathBuf) -> Result<Self> {
        let cache = Arc::new(PackageCache::open(config::package_cache_dir(&home))?);
        Ok(Self {
            home,
            cache,
            registry: Arc::new(BuiltinRegistry::new()),
            fetcher: Arc::new(HttpFetcher::new()),
        })
    }

    /// Build an engine with explicit collaborators (tests, alternative
    /// registries).
    #[must_use]
    pub fn with_collaborators(
        home: PathBuf,
        cache: Arc<PackageCache>,
        registry: Arc<dyn PackageRegistry>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self { home, cache, registry, fetcher }
    }

    /// The package cache this engine installs from.
    #[must_use]
    pub fn cache(&self) -> &Arc<PackageCache> {
        &self.cache
    }

    /// Apply the dep-type filter for the batch options.
    ///
    /// | options      | normal | dev | peer              |
    /// |--------------|--------|-----|-------------------|
    /// | default      | yes    | yes | if `include_peer` |
    /// | `production` | yes    | no  | if `include_peer` |
    /// | `dev_only`   | no     | yes | no                |
    ///
    /// Relative order is preserved: the filtered list stays in manifest
    /// order, which is the order results and lockfile entries use.
    #[must_use]
    pub fn filter_deps(deps: &[DependencyRecord], options: &BatchOptions) -> Vec<DependencyRecord> {
        deps.iter()
            .filter(|dep| match dep.dep_type {
                DepType::Normal => !options.dev_only,
                DepType::Dev => !options.production,
                DepType::Peer => options.include_peer && !options.dev_only,
            })
            .cloned()
            .collect()
    }

    /// Run one installation batch for a project.
    ///
    /// `deps` is the full manifest-ordered dependency list; the engine
    /// applies the dep-type filter itself.
    ///
    /// # Arguments
    ///
    /// * `project_dir` - Absolute project directory; addresses the env dir
    /// * `manifest_path` - The manifest whose content bytes suffix the env
    ///   dir name; `None` hashes empty content
    /// * `deps` - Manifest-ordered dependency records, unfiltered
    /// * `options` - Dep-type filter plus quiet/progress switches
    ///
    /// # Returns
    ///
    /// The [`BatchReport`] for the batch. Per-package failures (registry
    /// misses, fetch and extract errors, missing local targets) are *not*
    /// errors here; they are recorded in the report's results array.
    ///
    /// # Errors
    ///
    /// Only batch-wide setup failures error out:
    /// - [`PantryError::ProjectPathNotAbsolute`] for a relative project dir
    /// - [`PantryError::PermissionDenied`] when the env dir cannot be
    ///   created
    /// - an I/O error reading the manifest
    pub async fn install_batch(
        &self,
        project_dir: &Path,
        manifest_path: Option<&Path>,
        deps: &[DependencyRecord],
        options: &BatchOptions,
    ) -> Result<BatchReport> {
        let filtered = Self::filter_deps(deps, options);

        let manifest_content = match manifest_path {
            Some(path) => std::fs::read(path)?,
            None => Vec::new(),
        };
        let env_dir = config::envs_dir(&self.home)
            .join(fingerprint::env_dir_name(project_dir, &manifest_content)?);
        let env_bin = env_dir.join("bin");
        ensure_writable_dir(&env_dir)?;
        ensure_writable_dir(&env_bin)?;

        let mut results: Vec<InstallOutcome> = filtered
            .iter()
            .map(|dep| InstallOutcome::Failed {
                name: dep.display_name().to_string(),
                version: dep.version.clone(),
                error: PantryError::Cancelled,
            })
            .collect();

        let registry_jobs: Vec<(usize, DependencyRecord)> = filtered
            .iter()
            .enumerate()
            .filter(|(_, dep)| !dep.is_local())
            .map(|(i, dep)| (i, dep.clone()))
            .collect();

        let stack = InstallingStack::new();
        let progress = InstallProgress::new(!options.quiet && !options.no_progress);

        if registry_jobs.len() <= 1 {
            for (index, dep) in registry_jobs {
                let outcome = self
                    .spawn_worker(index, dep, &env_dir, stack.clone(), &progress, options.quiet)
                    .await;
                results[outcome.0] = outcome.1;
            }
        } else {
            let cap = registry_jobs.len().min(MAX_WORKERS);
            tracing::debug!("installing {} registry deps with {cap} workers", registry_jobs.len());
            let outcomes = stream::iter(registry_jobs)
                .map(|(index, dep)| {
                    self.spawn_worker(index, dep, &env_dir, stack.clone(), &progress, options.quiet)
                })
                .buffer_unordered(cap)
                .collect::<Vec<(usize, InstallOutcome)>>()
                .await;
            for (index, outcome) in outcomes {
                results[index] = outcome;
            }
        }
        progress.clear();

        // Local deps are finalized serially once the workers are done
        for (index, dep) in filtered.iter().enumerate() {
            if !dep.is_local() {
                continue;
            }
            results[index] = match self.finalize_local_dep(project_dir, &env_dir, dep) {
                Ok(()) => InstallOutcome::SkippedLocal,
                Err(error) => {
                    tracing::warn!("{error}");
                    InstallOutcome::Failed {
                        name: dep.display_name().to_string(),
                        version: dep.version.clone(),
                        error,
                    }
                }
            };
        }

        let lockfile = build_lockfile(&filtered, &results);
        let lockfile_path = project_dir.join(LOCKFILE_NAME);
        let lockfile_written = match lockfile.write(&lockfile_path) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("failed to write {}: {e}", lockfile_path.display());
                false
            }
        };

        Ok(BatchReport { env_dir, env_bin, deps: filtered, results, lockfile, lockfile_written })
    }

    /// Dispatch one registry dependency to a blocking worker.
    ///
    /// The worker constructs its own [`SingleInstaller`] from the shared
    /// immutable collaborators plus the shared stack handle; its progress
    /// slot is allocated here, before spawn, so concurrent renders never
    /// collide.
    async fn spawn_worker(
        &self,
        index: usize,
        dep: DependencyRecord,
        env_dir: &Path,
        stack: InstallingStack,
        progress: &InstallProgress,
        quiet: bool,
    ) -> (usize, InstallOutcome) {
        let spec = dep.to_spec();
        let slot = progress.slot(&format!("{}@{}", spec.name, spec.version));
        let installer = SingleInstaller::new(
            env_dir.to_path_buf(),
            config::staging_dir(&self.home),
            Arc::clone(&self.cache),
            Arc::clone(&self.registry),
            Arc::clone(&self.fetcher),
            stack,
        );
        let (name, version) = (spec.name.clone(), spec.version.clone());

        let handle = tokio::task::spawn_blocking(move || {
            let options = InstallOptions { project_root: None, quiet, inline_progress: slot };
            installer.install(&spec, &options)
        });
        match handle.await {
            Ok(outcome) => (index, outcome),
            Err(join_err) => (
                index,
                InstallOutcome::Failed {
                    name,
                    version,
                    error: PantryError::Other { message: format!("worker panicked: {join_err}") },
                },
            ),
        }
    }

    /// Wire a local dependency into the project and the environment.
    ///
    /// Creates `<project>/pantry_modules/<pkg>/src -> <target>/src` and
    /// `<env>/bin/<pkg> -> <target>`. A missing target is reported as
    /// [`PantryError::LocalPathMissing`]; the caller downgrades it to a
    /// warning.
    fn finalize_local_dep(
        &self,
        project_dir: &Path,
        env_dir: &Path,
        dep: &DependencyRecord,
    ) -> Result<()> {
        let name = dep.display_name();
        let target = resolve_target(&dep.version, project_dir)
            .map_err(|e| PantryError::Other { message: e.to_string() })?;
        if !target.exists() {
            return Err(PantryError::LocalPathMissing {
                name: name.to_string(),
                path: target.display().to_string(),
            });
        }

        let module_link = project_dir.join("pantry_modules").join(name).join("src");
        replace_symlink(&target.join("src"), &module_link).map_err(|e| {
            PantryError::SymlinkFailed {
                path: module_link.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        let bin_link = env_dir.join("bin").join(name);
        replace_symlink(&target, &bin_link).map_err(|e| PantryError::SymlinkFailed {
            path: bin_link.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

/// One lockfile entry per non-failed slot, in manifest order.
///
/// Failed packages are omitted entirely (no placeholder rows); a duplicate
/// `<name>@<version>` from overlapping sections keeps the first entry.
fn build_lockfile(deps: &[DependencyRecord], results: &[InstallOutcome]) -> Lockfile {
    let mut lockfile = Lockfile::new();
    for (dep, result) in deps.iter().zip(results) {
        let entry = match result {
            InstallOutcome::Installed { package, integrity } => LockfileEntry {
                name: dep.display_name().to_string(),
                version: package.resolved_version.clone(),
                source: dep.source(),
                url: None,
                integrity: integrity.clone(),
                dependencies: Default::default(),
            },
            InstallOutcome::SkippedInProgress { version, .. } => LockfileEntry {
                name: dep.display_name().to_string(),
                version: version.clone(),
                source: dep.source(),
                url: None,
                integrity: None,
                dependencies: Default::default(),
            },
            InstallOutcome::SkippedLocal => LockfileEntry {
                name: dep.display_name().to_string(),
                version: dep.version.clone(),
                source: PackageSource::Local,
                url: Some(dep.version.clone()),
                integrity: None,
                dependencies: Default::default(),
            },
            InstallOutcome::Failed { .. } => continue,
        };
        if let Err(e) = lockfile.add_entry(entry) {
            tracing::debug!("skipping duplicate lockfile entry: {e}");
        }
    }
    lockfile
}

/// Create a directory, mapping a permission failure to the fatal
/// activation error.
fn ensure_writable_dir(path: &Path) -> Result<()> {
    ensure_dir(path).map_err(|e| {
        let denied = e
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::PermissionDenied);
        if denied {
            PantryError::PermissionDenied { path: path.display().to_string() }
        } else {
            PantryError::Other { message: e.to_string() }
        }
    })
}

#[cfg(test)]
mod tests;
