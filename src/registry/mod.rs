//! Package registry: name → metadata and version resolution.
//!
//! The [`PackageRegistry`] trait is the resolution seam consumed by the
//! installer. The default implementation, [`BuiltinRegistry`], carries a
//! static table of well-known tool packages and resolves a concrete
//! version for a request against that table. There is no constraint
//! solving here: a spec names a literal version, a `latest` tag, or a
//! bare major/minor prefix, and resolution picks the newest known version
//! that matches.

pub mod fetch;

pub use fetch::{Fetcher, HttpFetcher, MaterializedPackage};

use semver::Version;

use crate::core::{PantryError, Result};
use crate::models::{PackageSource, PackageSpec};

/// Registry metadata for one known package.
#[derive(Debug, Clone, Copy)]
pub struct PackageRecord {
    /// Canonical package name.
    pub name: &'static str,
    /// Distribution project the package is fetched from.
    pub project: &'static str,
    /// Download URL template; `{version}` is substituted at resolve time.
    pub dist_url: &'static str,
    /// Known versions, unordered; resolution sorts with semver.
    pub versions: &'static [&'static str],
    /// Executable names the package provides.
    pub programs: &'static [&'static str],
}

/// A request resolved to something fetchable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackage {
    /// Package name.
    pub name: String,
    /// Concrete version; never a range or tag.
    pub version: String,
    /// Download URL for the distribution archive.
    pub fetch_url: String,
    /// Executable names to expose from the environment `bin/`.
    pub programs: Vec<String>,
}

/// Name → metadata lookup and spec → concrete-version resolution.
///
/// Implementations must be shareable across install workers.
pub trait PackageRegistry: Send + Sync {
    /// Look up a package by prefix-stripped name. Never fetches.
    fn lookup(&self, name: &str) -> Option<PackageRecord>;

    /// Resolve a request to a concrete, fetchable package.
    fn resolve(&self, spec: &PackageSpec) -> Result<ResolvedPackage>;
}

/// Distribution table of well-known developer tools.
///
/// Version lists are a snapshot; a literal version outside the table is
/// passed through as-is and left for the fetch layer to accept or reject.
const BUILTIN_PACKAGES: &[PackageRecord] = &[
    PackageRecord {
        name: "node",
        project: "nodejs.org",
        dist_url: "https://dist.pkgx.dev/nodejs.org/v{version}.tar.gz",
        versions: &["22.1.0", "22.0.0", "20.12.2", "18.20.3"],
        programs: &["node", "npx"],
    },
    PackageRecord {
        name: "python",
        project: "python.org",
        dist_url: "https://dist.pkgx.dev/python.org/v{version}.tar.gz",
        versions: &["3.12.3", "3.11.9", "3.10.14"],
        programs: &["python", "pip"],
    },
    PackageRecord {
        name: "go",
        project: "go.dev",
        dist_url: "https://dist.pkgx.dev/go.dev/v{version}.tar.gz",
        versions: &["1.22.3", "1.21.10"],
        programs: &["go", "gofmt"],
    },
    PackageRecord {
        name: "deno",
        project: "deno.land",
        dist_url: "https://dist.pkgx.dev/deno.land/v{version}.tar.gz",
        versions: &["1.43.6", "1.42.4"],
        programs: &["deno"],
    },
    PackageRecord {
        name: "bun",
        project: "bun.sh",
        dist_url: "https://dist.pkgx.dev/bun.sh/v{version}.tar.gz",
        versions: &["1.1.8", "1.0.36"],
        programs: &["bun", "bunx"],
    },
    PackageRecord {
        name: "ruby",
        project: "ruby-lang.org",
        dist_url: "https://dist.pkgx.dev/ruby-lang.org/v{version}.tar.gz",
        versions: &["3.3.1", "3.2.4"],
        programs: &["ruby", "gem"],
    },
    PackageRecord {
        name: "shellcheck",
        project: "shellcheck.net",
        dist_url: "https://dist.pkgx.dev/shellcheck.net/v{version}.tar.gz",
        versions: &["0.10.0", "0.9.0"],
        programs: &["shellcheck"],
    },
    PackageRecord {
        name: "jq",
        project: "jqlang.github.io",
        dist_url: "https://dist.pkgx.dev/jqlang.github.io/v{version}.tar.gz",
        versions: &["1.7.1", "1.6.0"],
        programs: &["jq"],
    },
];

/// The default registry backed by [`BUILTIN_PACKAGES`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinRegistry;

impl BuiltinRegistry {
    /// Create the builtin registry.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl PackageRegistry for BuiltinRegistry {
    fn lookup(&self, name: &str) -> Option<PackageRecord> {
        BUILTIN_PACKAGES.iter().find(|r| r.name == name).copied()
    }

    fn resolve(&self, spec: &PackageSpec) -> Result<ResolvedPackage> {
        match spec.source {
            PackageSource::Registry => {
                let record = self.lookup(&spec.name).ok_or_else(|| {
                    PantryError::PackageNotFoundInRegistry { name: spec.name.clone() }
                })?;
                let version = select_version(record.versions, &spec.version);
                Ok(ResolvedPackage {
                    name: record.name.to_string(),
                    version: version.clone(),
                    fetch_url: record.dist_url.replace("{version}", &version),
                    programs: record.programs.iter().map(ToString::to_string).collect(),
                })
            }
            PackageSource::Github => {
                let repo = spec.repo.clone().unwrap_or_else(|| spec.name.clone());
                let program = repo.rsplit('/').next().unwrap_or(&repo).to_string();
                Ok(ResolvedPackage {
                    name: spec.name.clone(),
                    version: spec.version.clone(),
                    fetch_url: format!(
                        "https://github.com/{repo}/archive/{}.tar.gz",
                        spec.version
                    ),
                    programs: vec![program],
                })
            }
            PackageSource::Npm => Ok(ResolvedPackage {
                name: spec.name.clone(),
                version: spec.version.clone(),
                fetch_url: format!(
                    "https://registry.npmjs.org/{0}/-/{0}-{1}.tgz",
                    spec.name, spec.version
                ),
                programs: vec![spec.name.clone()],
            }),
            // Direct-URL sources carry their location in the version slot
            PackageSource::Http | PackageSource::Git => Ok(ResolvedPackage {
                name: spec.name.clone(),
                version: spec.version.clone(),
                fetch_url: spec.version.clone(),
                programs: vec![spec.name.clone()],
            }),
            PackageSource::Local => Err(PantryError::Other {
                message: format!("local dependency '{}' cannot be resolved", spec.name),
            }),
        }
    }
}

/// Pick a concrete version from the known list for a requested spec.
///
/// `latest`, `*`, and the empty string select the newest known version; an
/// exact match selects itself; a bare prefix like `22` or `3.12` selects
/// the newest version under that prefix. A literal outside the table is
/// passed through unchanged for the fetch layer to judge.
fn select_version(known: &[&str], requested: &str) -> String {
    let newest = |candidates: &[&str]| -> Option<String> {
        candidates
            .iter()
            .filter_map(|v| Version::parse(v).ok().map(|parsed| (parsed, *v)))
            .max_by(|a, b| a.0.cmp(&b.0))
            .map(|(_, raw)| raw.to_string())
    };

    if requested.is_empty() || requested == "latest" || requested == "*" {
        return newest(known).unwrap_or_else(|| requested.to_string());
    }
    if known.contains(&requested) {
        return requested.to_string();
    }
    let prefix = format!("{requested}.");
    let matching: Vec<&str> =
        known.iter().filter(|v| v.starts_with(&prefix)).copied().collect();
    if let Some(version) = newest(&matching) {
        return version;
    }
    requested.to_string()
}
