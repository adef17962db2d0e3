//! Pantry home layout and configuration.
//!
//! All global state lives under a single base directory, `~/.pantry` by
//! default:
//!
//! ```text
//! ~/.pantry/
//! ├── envs/                    # per-project environment directories
//! │   └── proj_ab12cd34-d0f1e2d3c/
//! │       ├── bin/             # symlinked executables
//! │       └── node-22.1.0/     # per-package subtrees
//! └── cache/
//!     ├── packages/            # content-addressed unpacked packages
//!     ├── staging/             # transient extraction areas
//!     └── envs.cache           # environment cache persistence
//! ```
//!
//! The base can be overridden with the `PANTRY_HOME` environment variable,
//! which tests rely on for isolation.

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Environment variable overriding the pantry base directory.
pub const PANTRY_HOME_ENV: &str = "PANTRY_HOME";

/// Resolve the pantry base directory.
///
/// Checks the `PANTRY_HOME` environment variable first (essential for
/// testing), then falls back to `~/.pantry`.
pub fn pantry_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(PANTRY_HOME_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    Ok(home.join(".pantry"))
}

/// Root directory holding all environment directories.
#[must_use]
pub fn envs_dir(home: &Path) -> PathBuf {
    home.join("envs")
}

/// Root of the content-addressed package cache.
#[must_use]
pub fn package_cache_dir(home: &Path) -> PathBuf {
    home.join("cache").join("packages")
}

/// Directory for transient extraction staging areas.
#[must_use]
pub fn staging_dir(home: &Path) -> PathBuf {
    home.join("cache").join("staging")
}

/// Persistence file for the environment cache.
#[must_use]
pub fn env_cache_file(home: &Path) -> PathBuf {
    home.join("cache").join("envs.cache")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn pantry_home_env_override() {
        // SAFETY: serialized test; no other thread reads the variable
        unsafe { std::env::set_var(PANTRY_HOME_ENV, "/tmp/pantry-test-home") };
        let home = pantry_home().unwrap();
        assert_eq!(home, PathBuf::from("/tmp/pantry-test-home"));
        unsafe { std::env::remove_var(PANTRY_HOME_ENV) };
    }

    #[test]
    #[serial]
    fn pantry_home_defaults_under_home() {
        unsafe { std::env::remove_var(PANTRY_HOME_ENV) };
        let home = pantry_home().unwrap();
        assert!(home.ends_with(".pantry"));
    }

    #[test]
    fn layout_helpers() {
        let home = Path::new("/h/.pantry");
        assert_eq!(envs_dir(home), Path::new("/h/.pantry/envs"));
        assert_eq!(package_cache_dir(home), Path::new("/h/.pantry/cache/packages"));
        assert_eq!(env_cache_file(home), Path::new("/h/.pantry/cache/envs.cache"));
    }
}
