//! Environment cache: the shell hook's fast path.
//!
//! Maps a fingerprint of the manifest *path* to the environment that was
//! last materialized for it. Keying by path rather than content is what
//! makes warm activations O(1): the hook never reads the manifest.
//! Correctness is restored by revalidating the stored mtime on every
//! `get`: if the file was edited (or removed) since the entry was written,
//! the entry is evicted instead of served.
//!
//! The table is persisted as JSON at `~/.pantry/cache/envs.cache` via
//! temp-and-rename. Unknown fields are ignored on load and new fields
//! carry serde defaults, so the format stays forward-compatible as
//! optional fields are added.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::UNIX_EPOCH;

use crate::core::Result;
use crate::utils::atomic_write;

/// Current persistence format version.
const FORMAT_VERSION: u32 = 1;

/// One cached environment row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvCacheEntry {
    /// Hex MD5 fingerprint of the manifest path (32 chars).
    pub hash: String,
    /// Absolute path of the manifest this environment was built from.
    pub manifest_path: PathBuf,
    /// Manifest mtime in nanoseconds since the epoch, snapshotted when the
    /// entry was created or last revalidated. A differing on-disk mtime
    /// makes the entry stale.
    pub manifest_mtime: u64,
    /// The environment's `bin/` directory.
    pub path: PathBuf,
    /// Extra environment variables to export on activation.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env_vars: BTreeMap<String, String>,
    /// When the environment was first materialized.
    pub created_at: DateTime<Utc>,
    /// When this row was last written.
    #[serde(default = "Utc::now")]
    pub cached_at: DateTime<Utc>,
    /// When the mtime check last passed.
    #[serde(default = "Utc::now")]
    pub last_validated: DateTime<Utc>,
}

impl EnvCacheEntry {
    /// Build an entry for a freshly-materialized environment, snapshotting
    /// the manifest's current mtime. Returns `None` when the manifest has
    /// vanished; an entry without a valid mtime could never be served.
    #[must_use]
    pub fn fresh(hash: &str, manifest_path: &Path, env_bin: &Path) -> Option<Self> {
        let manifest_mtime = mtime_nanos(manifest_path)?;
        let now = Utc::now();
        Some(Self {
            hash: hash.to_string(),
            manifest_path: manifest_path.to_path_buf(),
            manifest_mtime,
            path: env_bin.to_path_buf(),
            env_vars: BTreeMap::new(),
            created_at: now,
            cached_at: now,
            last_validated: now,
        })
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedTable {
    version: u32,
    #[serde(default)]
    entries: Vec<EnvCacheEntry>,
}

/// Fingerprint-indexed table of known environments.
pub struct EnvCache {
    file: PathBuf,
    entries: Mutex<HashMap<String, EnvCacheEntry>>,
}

impl EnvCache {
    /// Load the cache from its persistence file.
    ///
    /// A missing file yields an empty cache; an unreadable one is treated
    /// as empty with a warning, since the cache is always rebuildable.
    #[must_use]
    pub fn load(file: PathBuf) -> Self {
        let entries = match fs::read(&file) {
            Ok(bytes) => match serde_json::from_slice::<PersistedTable>(&bytes) {
                Ok(table) => {
                    table.entries.into_iter().map(|e| (e.hash.clone(), e)).collect()
                }
                Err(e) => {
                    tracing::warn!("discarding unreadable env cache {}: {e}", file.display());
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self { file, entries: Mutex::new(entries) }
    }

    /// Look up an entry by fingerprint, revalidating manifest mtime.
    ///
    /// Stats the manifest on every call, never skipped. A missing
    /// manifest or a changed mtime evicts the entry; a stale entry is
    /// never returned.
    pub fn get(&self, hash: &str) -> Option<EnvCacheEntry> {
        let mut entries = self.entries.lock().expect("env cache mutex poisoned");
        let (manifest_path, stored_mtime) = {
            let entry = entries.get(hash)?;
            (entry.manifest_path.clone(), entry.manifest_mtime)
        };

        if mtime_nanos(&manifest_path) == Some(stored_mtime) {
            let entry = entries.get_mut(hash)?;
            entry.last_validated = Utc::now();
            Some(entry.clone())
        } else {
            tracing::debug!("env cache entry {hash} stale; evicting");
            entries.remove(hash);
            drop(entries);
            self.persist().ok();
            None
        }
    }

    /// Insert or replace the entry for its fingerprint and persist.
    pub fn put(&self, entry: EnvCacheEntry) -> Result<()> {
        {
            let mut entries = self.entries.lock().expect("env cache mutex poisoned");
            entries.insert(entry.hash.clone(), entry);
        }
        self.persist()
    }

    /// Remove an entry by fingerprint, returning it if present.
    pub fn remove(&self, hash: &str) -> Result<Option<EnvCacheEntry>> {
        let removed = {
            let mut entries = self.entries.lock().expect("env cache mutex poisoned");
            entries.remove(hash)
        };
        if removed.is_some() {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Snapshot all rows, ordered by manifest path for stable listings.
    pub fn entries(&self) -> Vec<EnvCacheEntry> {
        let entries = self.entries.lock().expect("env cache mutex poisoned");
        let mut rows: Vec<_> = entries.values().cloned().collect();
        rows.sort_by(|a, b| a.manifest_path.cmp(&b.manifest_path));
        rows
    }

    /// Drop every entry and persist the empty table.
    pub fn clear(&self) -> Result<()> {
        self.entries.lock().expect("env cache mutex poisoned").clear();
        self.persist()
    }

    /// Write the table to disk via temp-and-rename.
    pub fn persist(&self) -> Result<()> {
        let table = PersistedTable { version: FORMAT_VERSION, entries: self.entries() };
        let bytes = serde_json::to_vec_pretty(&table)?;
        atomic_write(&self.file, &bytes)
            .map_err(|e| crate::core::PantryError::Other { message: e.to_string() })?;
        Ok(())
    }
}

/// Manifest mtime in nanoseconds since the epoch; `None` when the file is
/// missing or the clock predates the epoch.
#[must_use]
pub fn mtime_nanos(path: &Path) -> Option<u64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let nanos = modified.duration_since(UNIX_EPOCH).ok()?.as_nanos();
    u64::try_from(nanos).ok()
}
