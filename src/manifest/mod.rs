//! Manifest detection and parsing.
//!
//! A project declares its dependencies in a YAML manifest. The detector
//! walks upward from a starting directory looking for a recognized file
//! name; the parser normalizes the YAML sections into
//! [`DependencyRecord`]s, preserving document order. Everything
//! downstream (the results array, the lockfile) is keyed to manifest
//! order.
//!
//! # Manifest format
//!
//! ```yaml
//! dependencies:
//!   node: "22"
//!   github:cli/cli: v2.62.0
//!   local:mylib: ./vendor/mylib
//! devDependencies:
//!   shellcheck: latest
//! peerDependencies:
//!   python: "3.12"
//! ```
//!
//! Values may be written as YAML strings, numbers, or floats; they are all
//! normalized to strings (`node: 22` means version `"22"`).

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::{PantryError, Result};
use crate::models::{DepType, DependencyRecord, GithubRef};

/// Manifest file names recognized by the detector, in match priority order.
pub const MANIFEST_NAMES: &[&str] = &[
    "deps.yaml",
    "deps.yml",
    "dependencies.yaml",
    "dependencies.yml",
    "pantry.yaml",
    "pantry.yml",
];

/// How many parent directories the detector climbs before giving up.
pub const MAX_SEARCH_DEPTH: usize = 10;

/// The format family of a detected manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    /// The YAML dependency-map family (`deps.yaml` and friends).
    Yaml,
}

/// A manifest located by [`find_manifest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestFile {
    /// Absolute path of the manifest file.
    pub path: PathBuf,
    /// Detected format family.
    pub format: ManifestFormat,
}

/// Search for a manifest at `start_dir` or in one of its parents.
///
/// Checks the starting directory plus at most [`MAX_SEARCH_DEPTH`] parent
/// levels; the first recognized name wins. Returns `None` when nothing is
/// found within the bound.
#[must_use]
pub fn find_manifest(start_dir: &Path) -> Option<ManifestFile> {
    let mut dir = start_dir;
    for _ in 0..=MAX_SEARCH_DEPTH {
        for name in MANIFEST_NAMES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(ManifestFile { path: candidate, format: ManifestFormat::Yaml });
            }
        }
        dir = dir.parent()?;
    }
    None
}

/// Parse a manifest file into dependency records, in document order.
pub fn parse_manifest(path: &Path) -> Result<Vec<DependencyRecord>> {
    let content = fs::read_to_string(path)?;
    parse_manifest_str(&content).map_err(|e| PantryError::ManifestParseError {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Parse manifest content. Split out from [`parse_manifest`] for tests.
pub fn parse_manifest_str(content: &str) -> Result<Vec<DependencyRecord>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let doc: serde_yaml::Value = serde_yaml::from_str(content)?;
    if doc.is_null() {
        // A manifest holding only comments
        return Ok(Vec::new());
    }
    if !doc.is_mapping() {
        return Err(PantryError::Other { message: "manifest root must be a mapping".to_string() });
    }

    let mut records = Vec::new();
    for (section, dep_type) in [
        ("dependencies", DepType::Normal),
        ("devDependencies", DepType::Dev),
        ("peerDependencies", DepType::Peer),
    ] {
        let Some(value) = doc.get(section) else { continue };
        if value.is_null() {
            // A bare `dependencies:` line with nothing under it
            continue;
        }
        let Some(map) = value.as_mapping() else {
            return Err(PantryError::Other {
                message: format!("manifest section '{section}' must be a mapping"),
            });
        };
        for (key, value) in map {
            let name = yaml_scalar(key).ok_or_else(|| PantryError::Other {
                message: format!("invalid dependency name in section '{section}'"),
            })?;
            let version = yaml_scalar(value).ok_or_else(|| PantryError::Other {
                message: format!("invalid version for dependency '{name}'"),
            })?;
            records.push(make_record(name, version, dep_type));
        }
    }
    Ok(records)
}

fn make_record(name: String, version: String, dep_type: DepType) -> DependencyRecord {
    let github_ref = name.strip_prefix("github:").and_then(|coord| {
        let (owner, repo) = coord.split_once('/')?;
        Some(GithubRef {
            owner: owner.to_string(),
            repo: repo.to_string(),
            reference: version.clone(),
        })
    });
    DependencyRecord { name, version, dep_type, github_ref }
}

/// Render a YAML scalar as a version/name string; mappings and sequences
/// are rejected.
fn yaml_scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parse_sections_in_document_order() {
        let records = parse_manifest_str(
            "dependencies:\n  node: '22'\n  deno: latest\ndevDependencies:\n  shellcheck: 0.10.0\n",
        )
        .unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].name, "node");
        assert_eq!(records[0].version, "22");
        assert_eq!(records[0].dep_type, DepType::Normal);
        assert_eq!(records[1].name, "deno");
        assert_eq!(records[2].name, "shellcheck");
        assert_eq!(records[2].dep_type, DepType::Dev);
    }

    #[test]
    fn parse_numeric_versions_normalize_to_strings() {
        let records = parse_manifest_str("dependencies:\n  node: 22\n").unwrap();
        assert_eq!(records[0].version, "22");
    }

    #[test]
    fn parse_github_prefix_builds_ref() {
        let records =
            parse_manifest_str("dependencies:\n  github:cli/cli: v2.62.0\n").unwrap();
        let github = records[0].github_ref.as_ref().unwrap();
        assert_eq!(github.owner, "cli");
        assert_eq!(github.repo, "cli");
        assert_eq!(github.reference, "v2.62.0");
    }

    #[test]
    fn parse_peer_section() {
        let records = parse_manifest_str("peerDependencies:\n  python: '3.12'\n").unwrap();
        assert_eq!(records[0].dep_type, DepType::Peer);
    }

    #[test]
    fn parse_empty_manifest() {
        assert!(parse_manifest_str("").unwrap().is_empty());
        assert!(parse_manifest_str("dependencies: {}\n").unwrap().is_empty());
    }

    #[test]
    fn parse_rejects_non_scalar_version() {
        assert!(parse_manifest_str("dependencies:\n  node:\n    version: '22'\n").is_err());
    }

    #[test]
    fn parse_manifest_reports_file_in_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("deps.yaml");
        std::fs::write(&path, "dependencies: [not, a, map]\n").unwrap();
        let err = parse_manifest(&path).unwrap_err();
        match err {
            PantryError::ManifestParseError { file, .. } => {
                assert!(file.contains("deps.yaml"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn find_manifest_in_start_dir() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("deps.yaml"), "dependencies: {}\n").unwrap();
        let found = find_manifest(tmp.path()).unwrap();
        assert_eq!(found.path, tmp.path().join("deps.yaml"));
        assert_eq!(found.format, ManifestFormat::Yaml);
    }

    #[test]
    fn find_manifest_walks_parents() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("pantry.yaml"), "dependencies: {}\n").unwrap();
        let nested = tmp.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        let found = find_manifest(&nested).unwrap();
        assert_eq!(found.path, tmp.path().join("pantry.yaml"));
    }

    #[test]
    fn find_manifest_stops_after_ten_parent_levels() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("deps.yaml"), "dependencies: {}\n").unwrap();

        // 10 levels below the manifest: still found
        let mut within = tmp.path().to_path_buf();
        for i in 0..10 {
            within = within.join(format!("d{i}"));
        }
        std::fs::create_dir_all(&within).unwrap();
        assert!(find_manifest(&within).is_some());

        // 11 levels below: out of range
        let beyond = within.join("d10");
        std::fs::create_dir_all(&beyond).unwrap();
        assert!(find_manifest(&beyond).is_none());
    }

    #[test]
    fn find_manifest_none_when_absent() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("empty");
        std::fs::create_dir_all(&nested).unwrap();
        // May hit a manifest far up the real filesystem only if one exists
        // above the temp root, which test temp dirs do not have.
        assert!(find_manifest(&nested).is_none());
    }
}
