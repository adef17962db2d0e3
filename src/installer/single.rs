//! Single-package installation.
//!
//! [`SingleInstaller`] installs one [`PackageSpec`] into a target
//! environment directory. It consults the package cache first, fetches and
//! extracts on a miss, and materializes `bin/` symlinks either way. Every
//! worker in a batch builds its own installer from the shared immutable
//! collaborators plus the one shared [`InstallingStack`] handle.
//!
//! The return shape is a sum, not a result: per-package failures are
//! values the batch folds into its summary, and the two short-circuit
//! outcomes (local deps finalized by the engine, packages another worker
//! is already materializing) are distinguished from real installs rather
//! than encoded in magic field values.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::PackageCache;
use crate::core::{PantryError, Result};
use crate::installer::stack::InstallingStack;
use crate::models::{InstalledPackage, PackageSource, PackageSpec};
use crate::registry::{Fetcher, PackageRegistry, ResolvedPackage};
use crate::utils::progress::RenderSlot;
use crate::utils::{copy_dir, ensure_dir, remove_dir_if_exists, replace_symlink};

/// Per-call installation options.
#[derive(Default)]
pub struct InstallOptions {
    /// Project root, for resolving project-relative paths.
    pub project_root: Option<PathBuf>,
    /// Suppress human-readable progress.
    pub quiet: bool,
    /// In-place rendering slot; when absent the installer writes nothing.
    pub inline_progress: Option<RenderSlot>,
}

/// What happened to one dependency slot.
#[derive(Debug)]
pub enum InstallOutcome {
    /// The package was materialized into the environment.
    Installed {
        /// The completed install.
        package: InstalledPackage,
        /// `sha256:<hex>` of the fetched archive; absent on cache hits.
        integrity: Option<String>,
    },
    /// A local dependency; the engine finalizes it via symlinks.
    SkippedLocal,
    /// Another worker in this batch holds the claim for the same
    /// `(name, version)`; it will materialize the package. Counts as a
    /// success with cache semantics (zero install time).
    SkippedInProgress {
        /// Package name.
        name: String,
        /// Resolved version the other worker is installing.
        version: String,
    },
    /// The package could not be installed; the batch continues.
    Failed {
        /// Package name as requested.
        name: String,
        /// Requested version.
        version: String,
        /// Why the install failed.
        error: PantryError,
    },
}

impl InstallOutcome {
    /// Whether this slot counts as a success in the batch summary.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Installed { .. } | Self::SkippedInProgress { .. })
    }

    /// Whether this slot counts as a failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Summary line for failed slots: `<pkg>@<version> (<reason>)`.
    #[must_use]
    pub fn failure_line(&self) -> Option<String> {
        match self {
            Self::Failed { name, version, error } => {
                Some(format!("{name}@{version} ({error})"))
            }
            _ => None,
        }
    }
}

/// Installs one package into one environment directory.
pub struct SingleInstaller {
    env_dir: PathBuf,
    staging_root: PathBuf,
    cache: Arc<PackageCache>,
    registry: Arc<dyn PackageRegistry>,
    fetcher: Arc<dyn Fetcher>,
    stack: InstallingStack,
}

impl SingleInstaller {
    /// Build an installer from the batch's shared collaborators.
    #[must_use]
    pub fn new(
        env_dir: PathBuf,
        staging_root: PathBuf,
        cache: Arc<PackageCache>,
        registry: Arc<dyn PackageRegistry>,
        fetcher: Arc<dyn Fetcher>,
        stack: InstallingStack,
    ) -> Self {
        Self { env_dir, staging_root, cache, registry, fetcher, stack }
    }

    /// Install one package.
    ///
    /// Blocking: fetch, extraction, and filesystem work all happen on the
    /// calling thread. Errors are folded into the returned outcome rather
    /// than propagated.
    pub fn install(&self, spec: &PackageSpec, options: &InstallOptions) -> InstallOutcome {
        let started = Instant::now();

        // Local deps are finalized by the engine via symlinks
        if spec.source == PackageSource::Local {
            return InstallOutcome::SkippedLocal;
        }

        let resolved = match self.registry.resolve(spec) {
            Ok(resolved) => resolved,
            Err(error) => {
                return InstallOutcome::Failed {
                    name: spec.name.clone(),
                    version: spec.version.clone(),
                    error,
                };
            }
        };

        let Some(_guard) = self.stack.try_begin(&resolved.name, &resolved.version) else {
            tracing::debug!(
                "{}@{} already being installed by another worker",
                resolved.name,
                resolved.version
            );
            return InstallOutcome::SkippedInProgress {
                name: resolved.name,
                version: resolved.version,
            };
        };

        match self.materialize(&resolved, options, started) {
            Ok(outcome) => outcome,
            Err(error) => {
                if let Some(slot) = &options.inline_progress {
                    slot.finish(format!("✗ {}@{}", resolved.name, resolved.version));
                }
                InstallOutcome::Failed {
                    name: resolved.name,
                    version: resolved.version,
                    error,
                }
            }
        }
    }

    fn materialize(
        &self,
        resolved: &ResolvedPackage,
        options: &InstallOptions,
        started: Instant,
    ) -> Result<InstallOutcome> {
        let mut integrity = None;

        let cached = match self.cache.get(&resolved.name, &resolved.version) {
            Some(cached) => {
                if let Some(slot) = &options.inline_progress {
                    slot.update(format!("{}@{} (cached)", resolved.name, resolved.version));
                }
                cached
            }
            None => {
                if let Some(slot) = &options.inline_progress {
                    slot.update(format!("{}@{} fetching…", resolved.name, resolved.version));
                }
                ensure_dir(&self.staging_root)
                    .map_err(|e| PantryError::Other { message: e.to_string() })?;
                // Dropped on every exit path, removing the staging tree
                let staging = tempfile::Builder::new()
                    .prefix(&format!("{}-", resolved.name))
                    .tempdir_in(&self.staging_root)?;

                let materialized = self.fetcher.materialize(resolved, staging.path())?;
                integrity = Some(materialized.integrity);
                self.cache.insert(
                    &resolved.name,
                    &resolved.version,
                    &materialized.unpacked_root,
                )?
            }
        };
        let from_cache = integrity.is_none();

        let install_path = self.link_into_env(resolved, &cached.unpacked_root)?;

        if let Some(slot) = &options.inline_progress {
            let origin = if from_cache { "cached" } else { "fetched" };
            slot.finish(format!("✓ {}@{} ({origin})", resolved.name, resolved.version));
        }

        Ok(InstallOutcome::Installed {
            package: InstalledPackage {
                name: resolved.name.clone(),
                resolved_version: resolved.version.clone(),
                install_path,
                size_bytes: cached.byte_size,
                from_cache,
                install_time_ms: started.elapsed().as_millis() as u64,
            },
            integrity,
        })
    }

    /// Copy the cached tree into the environment and populate `bin/`.
    fn link_into_env(&self, resolved: &ResolvedPackage, unpacked_root: &Path) -> Result<PathBuf> {
        let dest = self.env_dir.join(format!("{}-{}", resolved.name, resolved.version));
        remove_dir_if_exists(&dest).map_err(|e| PantryError::Other { message: e.to_string() })?;
        copy_dir(unpacked_root, &dest)
            .map_err(|e| PantryError::Other { message: e.to_string() })?;

        let env_bin = self.env_dir.join("bin");
        ensure_dir(&env_bin).map_err(|e| PantryError::Other { message: e.to_string() })?;
        let link_err = |path: &Path, e: anyhow::Error| PantryError::SymlinkFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        let pkg_bin = dest.join("bin");
        if pkg_bin.is_dir() {
            for entry in std::fs::read_dir(&pkg_bin)? {
                let entry = entry?;
                let link = env_bin.join(entry.file_name());
                replace_symlink(&entry.path(), &link).map_err(|e| link_err(&link, e))?;
            }
        } else {
            // Flat packages: executables live at the tree root
            for program in &resolved.programs {
                let target = dest.join(program);
                if target.exists() {
                    let link = env_bin.join(program);
                    replace_symlink(&target, &link).map_err(|e| link_err(&link, e))?;
                }
            }
        }
        Ok(dest)
    }
}
