//! Lockfile management for reproducible environments.
//!
//! The lockfile (`.freezer`) is generated from the manifest during
//! installation and records the exact resolved version of every installed
//! dependency, similar to Cargo's `Cargo.lock`. Where the manifest says
//! `node: "22"`, the lockfile says which `22.x.y` was actually
//! materialized, so a teammate or CI run reproduces the same environment.
//!
//! # Format
//!
//! TOML, insertion-ordered, with a header warning against manual edits:
//!
//! ```toml
//! # Auto-generated lockfile - DO NOT EDIT
//! version = 1
//!
//! [[packages]]
//! name = "node"
//! version = "22.1.0"
//! source = "pkgx"
//! integrity = "sha256:abcdef..."
//!
//! [[packages]]
//! name = "mylib"
//! version = "./vendor/mylib"
//! source = "local"
//! url = "./vendor/mylib"
//! ```
//!
//! Entries appear in manifest order and are uniquely keyed by
//! `<name>@<version>`. Optional fields are omitted rather than written as
//! nulls. Serialization is canonical: two successive writes of an
//! unmutated lockfile produce byte-identical output, and a parse/re-write
//! round trip is byte-stable.
//!
//! # Atomicity
//!
//! [`Lockfile::write`] goes through temp-and-rename so a concurrent reader
//! never observes a partial file.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use crate::core::{PantryError, Result};
use crate::models::PackageSource;
use crate::utils::atomic_write;

/// On-disk file name of the lockfile, relative to the project directory.
pub const LOCKFILE_NAME: &str = ".freezer";

/// Header line written before the TOML body.
const HEADER: &str = "# Auto-generated lockfile - DO NOT EDIT\n";

/// One resolved package pinned in the lockfile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockfileEntry {
    /// Package name, declaration prefix stripped.
    pub name: String,
    /// Resolved version (or the literal path token for local deps).
    pub version: String,
    /// Source classification tag.
    pub source: PackageSource,
    /// For local entries: the literal version string from the manifest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// `sha256:<hex>` of the fetched archive, when one was downloaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
    /// Pinned transitive dependencies, name → resolved version.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
}

impl LockfileEntry {
    /// The unique `<name>@<version>` key for this entry.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

/// Deterministic snapshot of one install batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    /// Schema version of the lockfile format.
    pub version: u32,
    /// Resolved entries, in manifest order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<LockfileEntry>,
}

impl Lockfile {
    /// Schema version written by this build.
    pub const CURRENT_VERSION: u32 = 1;

    /// Create an empty lockfile with the current schema version.
    #[must_use]
    pub fn new() -> Self {
        Self::init(Self::CURRENT_VERSION)
    }

    /// Create an empty lockfile with an explicit schema version.
    #[must_use]
    pub const fn init(version: u32) -> Self {
        Self { version, packages: Vec::new() }
    }

    /// Append an entry, preserving insertion order.
    ///
    /// Fails with [`PantryError::DuplicateLockfileEntry`] when an entry
    /// with the same `<name>@<version>` key is already present.
    pub fn add_entry(&mut self, entry: LockfileEntry) -> Result<()> {
        let key = entry.key();
        if self.packages.iter().any(|e| e.key() == key) {
            return Err(PantryError::DuplicateLockfileEntry { key });
        }
        self.packages.push(entry);
        Ok(())
    }

    /// Look up an entry by its `<name>@<version>` key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&LockfileEntry> {
        self.packages.iter().find(|e| e.key() == key)
    }

    /// Number of pinned entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the lockfile pins nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Canonical serialized form: header comment plus TOML body.
    pub fn to_toml_string(&self) -> Result<String> {
        let mut content = String::from(HEADER);
        content.push_str(&toml::to_string(self)?);
        Ok(content)
    }

    /// Write the lockfile atomically (temp file + rename).
    pub fn write(&self, path: &Path) -> Result<()> {
        let content = self.to_toml_string()?;
        atomic_write(path, content.as_bytes())
            .map_err(|e| PantryError::Other { message: e.to_string() })
    }

    /// Load a lockfile from disk.
    ///
    /// A missing or empty file yields an empty lockfile; a newer schema
    /// version or a duplicate key is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::new());
        }
        let lockfile: Self = toml::from_str(&content)?;

        if lockfile.version > Self::CURRENT_VERSION {
            return Err(PantryError::Other {
                message: format!(
                    "lockfile version {} is newer than supported version {}; update pantry",
                    lockfile.version,
                    Self::CURRENT_VERSION
                ),
            });
        }

        let mut seen = HashSet::new();
        for entry in &lockfile.packages {
            if !seen.insert(entry.key()) {
                return Err(PantryError::DuplicateLockfileEntry { key: entry.key() });
            }
        }
        Ok(lockfile)
    }
}

impl Default for Lockfile {
    fn default() -> Self {
        Self::new()
    }
}
