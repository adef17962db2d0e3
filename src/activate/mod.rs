//! Shell activation protocol.
//!
//! The shell hook runs `eval "$(pantry shell:activate "$PWD")"`, which
//! makes stdout *executable shell code*. Everything this module writes to
//! stdout is therefore a shell statement; the only statements emitted on
//! the success path are `export` lines and `echo '...' >&2` banners. All
//! other human-facing text goes to stderr directly.
//!
//! Two entry points serve the hook:
//!
//! - [`Activator::lookup`] is the fast path: manifest detection plus one
//!   env-cache probe. No parsing, no installation; a hit answers from the
//!   cache, a miss exits silently so the hook can decide what to do.
//! - [`Activator::activate`] is the full protocol: on a cache miss it
//!   parses the manifest, runs an installation batch, repopulates the
//!   cache with a freshly-stat'd manifest mtime, and emits the PATH
//!   export. Partial failures still activate when at least one usable
//!   thing landed in the environment; a batch that produced nothing emits
//!   no shell code at all.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::cache::env_cache::{EnvCache, EnvCacheEntry};
use crate::config;
use crate::core::PantryError;
use crate::fingerprint;
use crate::installer::{BatchOptions, BatchReport, InstallEngine};
use crate::manifest::{find_manifest, parse_manifest};

/// What an activation attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivateStatus {
    /// Shell code was emitted; the environment is live.
    Activated,
    /// No manifest at or above the directory; nothing emitted.
    NoManifest,
    /// A manifest with no dependencies; nothing emitted, success.
    EmptyManifest,
    /// The batch produced nothing usable; nothing emitted.
    Failed,
}

/// A successful fast-path lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupHit {
    /// The environment's `bin/` directory.
    pub env_bin: PathBuf,
    /// The project directory owning the manifest.
    pub project_dir: PathBuf,
    /// The manifest the environment was built from.
    pub manifest_path: PathBuf,
}

/// Command entry point behind the shell hook.
pub struct Activator {
    home: PathBuf,
    env_cache: EnvCache,
    /// Injected engine (tests); built on demand otherwise, so the fast
    /// path never pays for opening the package cache.
    engine: Option<InstallEngine>,
}

impl Activator {
    /// Build the default activator rooted at the pantry home.
    ///
    /// Only the env cache is loaded here; the install engine (and the
    /// package cache scan it implies) is constructed lazily, on the first
    /// cache miss that actually needs an installation.
    #[must_use]
    pub fn new(home: PathBuf) -> Self {
        let env_cache = EnvCache::load(config::env_cache_file(&home));
        Self { home, env_cache, engine: None }
    }

    /// Build an activator around an explicit engine (tests inject stub
    /// collaborators this way).
    #[must_use]
    pub fn with_engine(home: &Path, engine: InstallEngine) -> Self {
        Self {
            home: home.to_path_buf(),
            env_cache: EnvCache::load(config::env_cache_file(home)),
            engine: Some(engine),
        }
    }

    /// The environment cache serving the fast path.
    #[must_use]
    pub fn env_cache(&self) -> &EnvCache {
        &self.env_cache
    }

    /// Fast-path lookup: detect the manifest, probe the env cache.
    ///
    /// Returns `None`, silently, when there is no manifest or no fresh
    /// cache entry; the hook treats that as "fall through to activate".
    #[must_use]
    pub fn lookup(&self, cwd: &Path) -> Option<LookupHit> {
        let manifest = find_manifest(cwd)?;
        let hash = fingerprint::path_hash_hex(&manifest.path);
        let entry = self.env_cache.get(&hash)?;
        let project_dir = manifest.path.parent()?.to_path_buf();
        Some(LookupHit { env_bin: entry.path, project_dir, manifest_path: manifest.path })
    }

    /// Full activation: cache hit or install fall-through.
    ///
    /// Shell code goes to `out`; the caller points it at stdout. The
    /// returned status maps to the process exit code.
    pub async fn activate(
        &self,
        cwd: &Path,
        options: &BatchOptions,
        out: &mut impl Write,
    ) -> anyhow::Result<ActivateStatus> {
        let Some(manifest) = find_manifest(cwd) else {
            return Ok(ActivateStatus::NoManifest);
        };
        let project_dir = manifest
            .path
            .parent()
            .ok_or_else(|| PantryError::Other {
                message: format!("manifest has no parent directory: {}", manifest.path.display()),
            })?
            .to_path_buf();
        let hash = fingerprint::path_hash_hex(&manifest.path);

        if let Some(entry) = self.env_cache.get(&hash) {
            tracing::debug!("warm activation for {}", project_dir.display());
            for (key, value) in &entry.env_vars {
                writeln!(out, "export {key}=\"{value}\"")?;
            }
            writeln!(out, "export PATH=\"{}:$PATH\"", entry.path.display())?;
            return Ok(ActivateStatus::Activated);
        }

        let deps = parse_manifest(&manifest.path)?;
        if deps.is_empty() {
            return Ok(ActivateStatus::EmptyManifest);
        }

        let report = match &self.engine {
            Some(engine) => {
                engine.install_batch(&project_dir, Some(&manifest.path), &deps, options).await?
            }
            None => {
                InstallEngine::new(self.home.clone())?
                    .install_batch(&project_dir, Some(&manifest.path), &deps, options)
                    .await?
            }
        };

        if !report.any_usable() {
            return Ok(ActivateStatus::Failed);
        }

        self.remember(&hash, &manifest.path, &report);
        writeln!(out, "export PATH=\"{}:$PATH\"", report.env_bin.display())?;
        writeln!(out, "echo '{}' >&2", banner(&report))?;
        Ok(ActivateStatus::Activated)
    }

    /// Record a freshly-built environment in the env cache.
    ///
    /// The mtime is re-stat'd here, after the batch, so the stored
    /// snapshot reflects the manifest that was actually installed.
    fn remember(&self, hash: &str, manifest_path: &Path, report: &BatchReport) {
        let Some(entry) = EnvCacheEntry::fresh(hash, manifest_path, &report.env_bin) else {
            tracing::warn!("manifest vanished during activation; not caching");
            return;
        };
        if let Err(e) = self.env_cache.put(entry) {
            tracing::warn!("failed to persist env cache: {e}");
        }
    }
}

/// Post-eval banner summarizing the batch. Numbers only, so it is safe
/// inside single quotes.
fn banner(report: &BatchReport) -> String {
    let installed = report.successes() + report.skipped_local();
    let cached = report.cached_count();
    let failed = report.failures();
    if failed > 0 {
        format!("⬢ pantry: {installed} installed ({cached} cached), {failed} failed")
    } else {
        format!("⬢ pantry: {installed} installed ({cached} cached)")
    }
}
