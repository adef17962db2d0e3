//! Shared data models for pantry operations
//!
//! This module provides the data structures that flow between the manifest
//! layer, the registry, and the installer, ensuring consistency and reducing
//! duplication across CLI commands.
//!
//! The lifecycle is: a manifest (or CLI argument) produces
//! [`DependencyRecord`]s; each record is lowered to a [`PackageSpec`] request;
//! the installer turns a spec into an [`InstalledPackage`] result.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::core::PantryError;

/// Where a package comes from.
///
/// The serialized form is the tag written to the lockfile. The default
/// registry serializes as `pkgx`, matching the distribution host it
/// resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageSource {
    /// The built-in package registry (lockfile tag `pkgx`).
    #[serde(rename = "pkgx")]
    Registry,
    /// A GitHub repository release, addressed as `owner/repo` plus a ref.
    Github,
    /// An npm-registry package.
    Npm,
    /// A local filesystem path; installed by symlink, never fetched.
    Local,
    /// A direct HTTP(S) archive URL.
    Http,
    /// A git URL plus ref.
    Git,
}

impl PackageSource {
    /// The lockfile tag for this source.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Registry => "pkgx",
            Self::Github => "github",
            Self::Npm => "npm",
            Self::Local => "local",
            Self::Http => "http",
            Self::Git => "git",
        }
    }
}

impl fmt::Display for PackageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for PackageSource {
    type Err = PantryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            // `registry` accepted as a spelling of the default source
            "pkgx" | "registry" => Ok(Self::Registry),
            "github" => Ok(Self::Github),
            "npm" => Ok(Self::Npm),
            "local" => Ok(Self::Local),
            "http" => Ok(Self::Http),
            "git" => Ok(Self::Git),
            other => Err(PantryError::UnknownSourceTag { tag: other.to_string() }),
        }
    }
}

/// A GitHub coordinate extracted from a `github:owner/repo` dependency name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubRef {
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Git ref: tag, branch, or commit
    #[serde(rename = "ref")]
    pub reference: String,
}

/// How a dependency was declared in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepType {
    /// A regular runtime dependency.
    Normal,
    /// A development-only dependency.
    Dev,
    /// A peer dependency, installed only on request.
    Peer,
}

/// One manifest-derived dependency entry.
///
/// The `name` retains any declaration prefix (`auto:`, `local:`, `github:`,
/// `npm:`); [`DependencyRecord::display_name`] strips it for user-facing
/// output and on-disk directory names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    /// Declared name, prefix included.
    pub name: String,
    /// Declared version: a literal version, a range, a tag like `latest`,
    /// a git ref, or a filesystem path for local dependencies.
    pub version: String,
    /// Which manifest section the record came from.
    pub dep_type: DepType,
    /// GitHub coordinate, present when the name carries a `github:` prefix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_ref: Option<GithubRef>,
}

impl DependencyRecord {
    /// Whether this dependency resolves to a filesystem path rather than a
    /// fetchable package.
    ///
    /// True when the name carries a `local:` or `auto:` prefix, or when the
    /// version is written as a path (`/`, `./`, `../`, `~/`).
    #[must_use]
    pub fn is_local(&self) -> bool {
        if self.name.starts_with("local:") || self.name.starts_with("auto:") {
            return true;
        }
        let v = self.version.as_str();
        v.starts_with('/') || v.starts_with("./") || v.starts_with("../") || v.starts_with("~/")
    }

    /// The name with any declaration prefix stripped.
    #[must_use]
    pub fn display_name(&self) -> &str {
        for prefix in ["auto:", "local:", "github:", "npm:"] {
            if let Some(stripped) = self.name.strip_prefix(prefix) {
                return stripped;
            }
        }
        &self.name
    }

    /// Source classification for lockfile entries and install routing.
    #[must_use]
    pub fn source(&self) -> PackageSource {
        if self.is_local() {
            PackageSource::Local
        } else if self.name.starts_with("github:") || self.github_ref.is_some() {
            PackageSource::Github
        } else if self.name.starts_with("npm:") {
            PackageSource::Npm
        } else {
            PackageSource::Registry
        }
    }

    /// Lower this record to the request shape consumed by the installer.
    #[must_use]
    pub fn to_spec(&self) -> PackageSpec {
        let source = self.source();
        let repo = self.github_ref.as_ref().map(|g| format!("{}/{}", g.owner, g.repo));
        PackageSpec {
            name: self.display_name().to_string(),
            version: self.version.clone(),
            source,
            repo,
        }
    }
}

/// A single installation request, consumed immutably by the installer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    /// Package name, prefix-stripped. Non-empty for real requests.
    pub name: String,
    /// Requested version: literal, range, tag, git ref, or path token.
    pub version: String,
    /// Where to obtain the package.
    pub source: PackageSource,
    /// `owner/repo` coordinate, present for GitHub-sourced specs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// The result of one completed package installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    /// Package name.
    pub name: String,
    /// Concrete resolved version; never a range or tag.
    pub resolved_version: String,
    /// Absolute installation path inside the environment root.
    pub install_path: PathBuf,
    /// Size of the installed tree in bytes.
    pub size_bytes: u64,
    /// Whether the package was served from the package cache.
    pub from_cache: bool,
    /// Wall-clock install duration in milliseconds.
    pub install_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, version: &str) -> DependencyRecord {
        DependencyRecord {
            name: name.to_string(),
            version: version.to_string(),
            dep_type: DepType::Normal,
            github_ref: None,
        }
    }

    #[test]
    fn local_detection_by_prefix() {
        assert!(record("local:mylib", "1.0").is_local());
        assert!(record("auto:tool", "2").is_local());
        assert!(!record("node", "22").is_local());
    }

    #[test]
    fn local_detection_by_path_version() {
        assert!(record("mylib", "./vendor/mylib").is_local());
        assert!(record("mylib", "../sibling").is_local());
        assert!(record("mylib", "/abs/path").is_local());
        assert!(record("mylib", "~/checkouts/mylib").is_local());
        assert!(!record("mylib", "1.2.3").is_local());
    }

    #[test]
    fn display_name_strips_prefixes() {
        assert_eq!(record("local:mylib", "./x").display_name(), "mylib");
        assert_eq!(record("auto:tool", "./x").display_name(), "tool");
        assert_eq!(record("github:cli/cli", "v2").display_name(), "cli/cli");
        assert_eq!(record("npm:typescript", "5").display_name(), "typescript");
        assert_eq!(record("node", "22").display_name(), "node");
    }

    #[test]
    fn source_classification() {
        assert_eq!(record("local:mylib", "./x").source(), PackageSource::Local);
        assert_eq!(record("mylib", "./vendor/mylib").source(), PackageSource::Local);
        assert_eq!(record("github:cli/cli", "v2").source(), PackageSource::Github);
        assert_eq!(record("npm:typescript", "5").source(), PackageSource::Npm);
        assert_eq!(record("node", "22").source(), PackageSource::Registry);
    }

    #[test]
    fn source_tag_round_trip() {
        for source in [
            PackageSource::Registry,
            PackageSource::Github,
            PackageSource::Npm,
            PackageSource::Local,
            PackageSource::Http,
            PackageSource::Git,
        ] {
            assert_eq!(source.tag().parse::<PackageSource>().unwrap(), source);
        }
        assert_eq!("registry".parse::<PackageSource>().unwrap(), PackageSource::Registry);
        assert!("carton".parse::<PackageSource>().is_err());
    }

    #[test]
    fn github_record_to_spec() {
        let rec = DependencyRecord {
            name: "github:cli/cli".to_string(),
            version: "v2.0.0".to_string(),
            dep_type: DepType::Normal,
            github_ref: Some(GithubRef {
                owner: "cli".to_string(),
                repo: "cli".to_string(),
                reference: "v2.0.0".to_string(),
            }),
        };
        let spec = rec.to_spec();
        assert_eq!(spec.source, PackageSource::Github);
        assert_eq!(spec.repo.as_deref(), Some("cli/cli"));
        assert_eq!(spec.version, "v2.0.0");
    }
}
