//! Fetch and extract: turning a resolved package into an unpacked tree.
//!
//! The [`Fetcher`] trait is the network/archive seam of the installer. The
//! default [`HttpFetcher`] downloads the distribution archive with a
//! blocking reqwest client (install workers run on blocking threads, so
//! no async plumbing leaks into this layer), verifies nothing beyond HTTP
//! status, records a sha256 integrity string for the lockfile, and unpacks
//! the tar.gz into the caller's staging directory.
//!
//! Timeouts and retries are deliberately absent here; a failed transfer
//! surfaces as a per-package `FetchFailed` and the batch moves on.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pantry_cli::registry::{Fetcher, HttpFetcher, ResolvedPackage};
//! use std::path::Path;
//!
//! # fn example() -> pantry_cli::core::Result<()> {
//! let resolved = ResolvedPackage {
//!     name: "node".to_string(),
//!     version: "22.1.0".to_string(),
//!     fetch_url: "https://dist.pkgx.dev/nodejs.org/v22.1.0.tar.gz".to_string(),
//!     programs: vec!["node".to_string()],
//! };
//!
//! let fetcher = HttpFetcher::new();
//! let materialized = fetcher.materialize(&resolved, Path::new("/tmp/staging"))?;
//! println!("unpacked to {}", materialized.unpacked_root.display());
//! println!("archive digest: {}", materialized.integrity);
//! # Ok(())
//! # }
//! ```

use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::{PantryError, Result};
use crate::registry::ResolvedPackage;

/// The product of a successful fetch+extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedPackage {
    /// Root of the unpacked package tree, inside the staging directory.
    pub unpacked_root: PathBuf,
    /// `sha256:<hex>` digest of the downloaded archive bytes.
    pub integrity: String,
}

/// Downloads and unpacks one resolved package into a staging directory.
pub trait Fetcher: Send + Sync {
    /// Produce an unpacked tree for `pkg` under `staging_dir`.
    ///
    /// The staging directory is owned by the caller and removed on worker
    /// exit whether or not this call succeeds.
    fn materialize(&self, pkg: &ResolvedPackage, staging_dir: &Path) -> Result<MaterializedPackage>;
}

/// HTTP tar.gz fetcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpFetcher;

impl HttpFetcher {
    /// Create the default fetcher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn download(&self, url: &str) -> Result<Vec<u8>> {
        let fetch_err = |reason: String| PantryError::FetchFailed { url: url.to_string(), reason };

        // Built per call: materialize runs on blocking worker threads, and
        // the blocking client may not be constructed on an async runtime.
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| fetch_err(e.to_string()))?;

        let response = client.get(url).send().map_err(|e| fetch_err(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fetch_err(format!("HTTP {}", response.status())));
        }
        let bytes = response.bytes().map_err(|e| fetch_err(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl Fetcher for HttpFetcher {
    fn materialize(&self, pkg: &ResolvedPackage, staging_dir: &Path) -> Result<MaterializedPackage> {
        let archive = self.download(&pkg.fetch_url)?;
        let integrity = format!("sha256:{}", hex::encode(Sha256::digest(&archive)));

        let unpack_dir = staging_dir.join("unpacked");
        fs::create_dir_all(&unpack_dir)?;
        extract_tar_gz(&archive, &unpack_dir).map_err(|e| PantryError::ExtractFailed {
            name: pkg.name.clone(),
            version: pkg.version.clone(),
            reason: e.to_string(),
        })?;

        Ok(MaterializedPackage { unpacked_root: collapse_single_root(unpack_dir), integrity })
    }
}

/// Unpack gzip-compressed tar bytes into `dest`.
fn extract_tar_gz(archive: &[u8], dest: &Path) -> anyhow::Result<()> {
    let decoder = GzDecoder::new(archive);
    let mut tar = tar::Archive::new(decoder);
    tar.unpack(dest)?;
    Ok(())
}

/// Distribution tarballs usually wrap everything in one top-level
/// directory; descend into it so the unpacked root is the package tree
/// itself.
fn collapse_single_root(unpack_dir: PathBuf) -> PathBuf {
    let entries: Vec<_> = match fs::read_dir(&unpack_dir) {
        Ok(iter) => iter.filter_map(std::result::Result::ok).collect(),
        Err(_) => return unpack_dir,
    };
    if entries.len() == 1 && entries[0].file_type().map(|t| t.is_dir()).unwrap_or(false) {
        entries[0].path()
    } else {
        unpack_dir
    }
}
