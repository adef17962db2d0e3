//! Content-addressed package cache.
//!
//! Unpacked package trees are stored once, keyed by `(name, resolved
//! version)`, and shared across every environment that needs them. The
//! on-disk layout is plain:
//!
//! ```text
//! ~/.pantry/cache/packages/
//! ├── node/
//! │   ├── 22.1.0/          # unpacked tree, immutable once inserted
//! │   └── 20.12.2/
//! └── shellcheck/
//!     └── 0.10.0/
//! ```
//!
//! An in-memory index (rebuilt from disk when the cache is opened) backs
//! O(1) stats; the index and the running byte total live behind one mutex,
//! and entry directories are immutable after insertion so readers holding
//! a [`CachedPackage`] need no further synchronization.
//!
//! # Concurrency
//!
//! `get` and `insert` are serialized by the index mutex. Insertion is an
//! atomic rename of a fully-prepared staging directory, so a concurrent
//! reader sees either no entry or a complete one. Re-inserting an existing
//! key returns the existing entry; after any successful insert, `get`
//! returns a usable entry.
//!
//! # Corruption
//!
//! An index entry whose directory has vanished (a user deleted it, a
//! partial `clear`) is treated as absent: `get` evicts it and returns
//! `None`, and the next install re-fetches.
//!
//! # Usage Examples
//!
//! ## Basic Cache Operations
//!
//! ```rust,no_run
//! use pantry_cli::cache::PackageCache;
//! use std::path::PathBuf;
//!
//! # fn example() -> pantry_cli::core::Result<()> {
//! // Open (and create if needed) the cache
//! let cache = PackageCache::open(PathBuf::from("/home/user/.pantry/cache/packages"))?;
//!
//! // Look up a package; never fetches
//! if let Some(hit) = cache.get("node", "22.1.0") {
//!     println!("cached at {}", hit.unpacked_root.display());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Cache Maintenance
//!
//! ```rust,no_run
//! use pantry_cli::cache::PackageCache;
//! use std::path::PathBuf;
//!
//! # fn maintenance() -> pantry_cli::core::Result<()> {
//! let cache = PackageCache::open(PathBuf::from("/home/user/.pantry/cache/packages"))?;
//!
//! // Check cache size
//! let stats = cache.stats();
//! println!("{} packages, {} MB", stats.total_packages, stats.total_bytes / 1024 / 1024);
//!
//! // Complete cache cleanup
//! cache.clear()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Integration with the Install Pipeline
//!
//! The cache sits between the single-package installer and the fetch
//! layer:
//! 1. **Resolution**: the registry resolves a spec to a concrete version
//! 2. **Cache probe**: [`PackageCache::get`] answers from disk when the
//!    `(name, version)` pair was installed before, by any project
//! 3. **Population**: on a miss, the fetched and extracted tree is handed
//!    to [`PackageCache::insert`], which moves it into place atomically
//! 4. **Materialization**: either way, the installer copies the cached
//!    tree into the environment and symlinks its executables
//!
//! See [`crate::installer`] for the batch pipeline and
//! [`crate::registry::fetch`] for how trees are produced.

pub mod env_cache;

pub use env_cache::{EnvCache, EnvCacheEntry};

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::core::{PantryError, Result};
use crate::utils::{copy_dir, dir_size, ensure_dir, remove_dir_if_exists};

/// One cached unpacked package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPackage {
    /// Package name.
    pub name: String,
    /// Concrete resolved version.
    pub version: String,
    /// Directory holding the unpacked tree. Self-contained: no references
    /// into other cache entries.
    pub unpacked_root: PathBuf,
    /// Size of the tree in bytes, measured at insertion.
    pub byte_size: u64,
}

/// O(1) snapshot of cache contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Number of cached packages.
    pub total_packages: usize,
    /// Total bytes across all cached trees.
    pub total_bytes: u64,
}

#[derive(Default)]
struct CacheIndex {
    entries: HashMap<(String, String), CachedPackage>,
    total_bytes: u64,
}

/// Content-addressed store of unpacked package trees.
///
/// The primary interface for package reuse across environments. One
/// instance is shared by all workers of an install batch behind an
/// `Arc`; the index mutex serializes `get`/`insert` while entry
/// directories stay immutable after insertion.
///
/// # Thread Safety
///
/// `PackageCache` is `Send + Sync`. Lookups clone the index entry out of
/// the lock, so a returned [`CachedPackage`] is never invalidated by a
/// concurrent `insert`; at worst a concurrent `clear` removes the
/// directory underneath it and the subsequent copy fails as a
/// per-package error.
///
/// # Examples
///
/// Open the cache at its standard location under the pantry home:
///
/// ```rust,no_run
/// use pantry_cli::cache::PackageCache;
/// use pantry_cli::config;
///
/// # fn example() -> anyhow::Result<()> {
/// let home = config::pantry_home()?;
/// let cache = PackageCache::open(config::package_cache_dir(&home))?;
/// println!("cache at {}", cache.location().display());
/// # Ok(())
/// # }
/// ```
pub struct PackageCache {
    root: PathBuf,
    index: Mutex<CacheIndex>,
}

impl PackageCache {
    /// Open (and create if needed) the cache rooted at `root`, scanning
    /// existing entries into the index.
    ///
    /// The scan walks two directory levels (`<name>/<version>/`) and
    /// measures each tree, so opening is O(cache size); everything after
    /// that is answered from the in-memory index. Callers on the shell
    /// hook's fast path avoid constructing a cache at all.
    ///
    /// # Errors
    ///
    /// Returns an error when the root cannot be created or read.
    pub fn open(root: PathBuf) -> Result<Self> {
        ensure_dir(&root).map_err(|e| PantryError::Other { message: e.to_string() })?;

        let mut index = CacheIndex::default();
        for name_entry in fs::read_dir(&root)? {
            let name_entry = name_entry?;
            if !name_entry.file_type()?.is_dir() {
                continue;
            }
            let name = name_entry.file_name().to_string_lossy().into_owned();
            for version_entry in fs::read_dir(name_entry.path())? {
                let version_entry = version_entry?;
                if !version_entry.file_type()?.is_dir() {
                    continue;
                }
                let version = version_entry.file_name().to_string_lossy().into_owned();
                let unpacked_root = version_entry.path();
                let byte_size = dir_size(&unpacked_root);
                index.total_bytes += byte_size;
                index.entries.insert(
                    (name.clone(), version.clone()),
                    CachedPackage { name: name.clone(), version, unpacked_root, byte_size },
                );
            }
        }

        tracing::debug!(
            "package cache opened: {} entries, {} bytes",
            index.entries.len(),
            index.total_bytes
        );
        Ok(Self { root, index: Mutex::new(index) })
    }

    /// The cache root directory.
    #[must_use]
    pub fn location(&self) -> &Path {
        &self.root
    }

    /// Look up a cached package. Never fetches.
    ///
    /// A corrupt entry (directory missing on disk) is evicted and reported
    /// as absent, so the caller's miss path re-fetches and repairs the
    /// cache as a side effect.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use pantry_cli::cache::PackageCache;
    /// # use std::path::PathBuf;
    /// # fn example() -> pantry_cli::core::Result<()> {
    /// let cache = PackageCache::open(PathBuf::from("/tmp/packages"))?;
    /// match cache.get("node", "22.1.0") {
    ///     Some(hit) => println!("reusing {} bytes", hit.byte_size),
    ///     None => println!("not cached; fetch it"),
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn get(&self, name: &str, version: &str) -> Option<CachedPackage> {
        let key = (name.to_string(), version.to_string());
        let mut index = self.index.lock().expect("package cache mutex poisoned");
        let entry = index.entries.get(&key)?.clone();
        if entry.unpacked_root.is_dir() {
            return Some(entry);
        }
        tracing::warn!("evicting corrupt cache entry {name}@{version}");
        index.total_bytes = index.total_bytes.saturating_sub(entry.byte_size);
        index.entries.remove(&key);
        None
    }

    /// Take ownership of a prepared directory and move it into the cache.
    ///
    /// The staged tree must be complete; it is renamed into place (copied
    /// when the rename crosses filesystems). Inserting an existing key
    /// returns the existing entry and leaves the staged directory for its
    /// owner to clean up, making insertion idempotent per key: after any
    /// successful insert, `get` returns a usable entry.
    ///
    /// # Errors
    ///
    /// Returns [`crate::core::PantryError::CacheInsertFailed`] when the
    /// staged tree cannot be moved or copied into place.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use pantry_cli::cache::PackageCache;
    /// # use std::path::{Path, PathBuf};
    /// # fn example() -> pantry_cli::core::Result<()> {
    /// let cache = PackageCache::open(PathBuf::from("/tmp/packages"))?;
    /// let entry = cache.insert("node", "22.1.0", Path::new("/tmp/staging/unpacked"))?;
    /// assert!(entry.unpacked_root.ends_with("node/22.1.0"));
    /// # Ok(())
    /// # }
    /// ```
    pub fn insert(&self, name: &str, version: &str, staged_root: &Path) -> Result<CachedPackage> {
        let key = (name.to_string(), version.to_string());
        let mut index = self.index.lock().expect("package cache mutex poisoned");

        if let Some(existing) = index.entries.get(&key)
            && existing.unpacked_root.is_dir()
        {
            return Ok(existing.clone());
        }

        let dest = self.root.join(name).join(version);
        let insert_err = |reason: String| PantryError::CacheInsertFailed {
            name: name.to_string(),
            version: version.to_string(),
            reason,
        };

        remove_dir_if_exists(&dest).map_err(|e| insert_err(e.to_string()))?;
        if let Some(parent) = dest.parent() {
            ensure_dir(parent).map_err(|e| insert_err(e.to_string()))?;
        }
        if fs::rename(staged_root, &dest).is_err() {
            // Staging on another filesystem; fall back to a copy
            copy_dir(staged_root, &dest).map_err(|e| insert_err(e.to_string()))?;
        }

        let byte_size = dir_size(&dest);
        let entry = CachedPackage {
            name: name.to_string(),
            version: version.to_string(),
            unpacked_root: dest,
            byte_size,
        };
        index.total_bytes += byte_size;
        index.entries.insert(key, entry.clone());
        Ok(entry)
    }

    /// Current package count and byte total, from the in-memory index.
    ///
    /// O(1): totals are maintained incrementally on insert and eviction
    /// rather than recomputed from disk.
    pub fn stats(&self) -> CacheStats {
        let index = self.index.lock().expect("package cache mutex poisoned");
        CacheStats { total_packages: index.entries.len(), total_bytes: index.total_bytes }
    }

    /// Remove every cached package.
    ///
    /// Environments already materialized keep working (they hold copies,
    /// not links into the cache); the next install of each package
    /// re-fetches. Errors only on I/O failure.
    pub fn clear(&self) -> Result<()> {
        let mut index = self.index.lock().expect("package cache mutex poisoned");
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(entry.path())?;
            }
        }
        index.entries.clear();
        index.total_bytes = 0;
        Ok(())
    }
}
