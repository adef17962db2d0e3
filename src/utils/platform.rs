//! Platform helpers: home lookup and path expansion.

use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};

/// Gets the home directory path for the current user.
pub fn get_home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine home directory.\n\n\
             Check that the HOME environment variable is set"
        )
    })
}

/// Resolve a local-dependency target string to an absolute path.
///
/// `~/...` expands against the user's home; environment variables are
/// expanded with `$VAR`/`${VAR}` syntax; anything still relative is
/// interpreted against `base`.
pub fn resolve_target(raw: &str, base: &Path) -> Result<PathBuf> {
    let expanded = if let Some(stripped) = raw.strip_prefix("~/") {
        get_home_dir()?.join(stripped)
    } else {
        let expanded = shellexpand::env(raw)
            .with_context(|| format!("Failed to expand environment variables in path: {raw}"))?;
        PathBuf::from(expanded.into_owned())
    };

    let joined = if expanded.is_absolute() { expanded } else { base.join(expanded) };
    // Drop `.` segments; `..` is left for the filesystem to interpret
    Ok(joined.components().filter(|c| !matches!(c, Component::CurDir)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_target_relative_joins_base() {
        let base = Path::new("/tmp/proj");
        let resolved = resolve_target("./vendor/mylib", base).unwrap();
        assert_eq!(resolved, PathBuf::from("/tmp/proj/vendor/mylib"));
    }

    #[test]
    fn resolve_target_absolute_passthrough() {
        let resolved = resolve_target("/opt/lib", Path::new("/tmp/proj")).unwrap();
        assert_eq!(resolved, PathBuf::from("/opt/lib"));
    }

    #[test]
    fn resolve_target_tilde_expands_home() {
        let resolved = resolve_target("~/checkouts/lib", Path::new("/tmp/proj")).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("checkouts/lib"));
        assert!(!resolved.to_string_lossy().contains('~'));
    }
}
