//! File system operations with atomic writes and safe copying.
//!
//! Every write that another process may observe (lockfiles, cache
//! persistence) goes through [`atomic_write`] so readers never see a
//! partial file. Symlink helpers replace existing links instead of failing,
//! which keeps repeated installs idempotent.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Create a directory and all parents if missing.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Write a file atomically via temp file + rename.
///
/// The content is written to `<path>.tmp`, synced, then renamed over the
/// target so a reader observes either the old content or the new content,
/// never a partial file.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;
        file.write_all(content)
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;
        file.sync_all().with_context(|| "Failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;

    Ok(())
}

/// Recursively copy a directory tree.
///
/// Symlinks inside the tree are re-created as symlinks pointing at the
/// same target rather than being followed.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    ensure_dir(dst)?;
    for entry in fs::read_dir(src)
        .with_context(|| format!("Failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let target = dst.join(entry.file_name());
        if file_type.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            replace_symlink(&link, &target)?;
        } else {
            fs::copy(entry.path(), &target).with_context(|| {
                format!("Failed to copy {} to {}", entry.path().display(), target.display())
            })?;
        }
    }
    Ok(())
}

/// Total size in bytes of all regular files under a directory.
#[must_use]
pub fn dir_size(path: &Path) -> u64 {
    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Remove a directory tree if it exists; missing is not an error.
pub fn remove_dir_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Remove a file or symlink if it exists; missing is not an error.
pub fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove: {}", path.display())),
    }
}

/// Create a symlink at `link` pointing to `target`, replacing any existing
/// file or link at that path.
///
/// The target is allowed to be dangling; local-dependency links are created
/// before the target's contents necessarily exist.
#[cfg(unix)]
pub fn replace_symlink(target: &Path, link: &Path) -> Result<()> {
    if let Some(parent) = link.parent() {
        ensure_dir(parent)?;
    }
    // symlink_metadata also sees dangling links that `exists` misses
    if fs::symlink_metadata(link).is_ok() {
        remove_stale_link(link)?;
    }
    std::os::unix::fs::symlink(target, link).with_context(|| {
        format!("Failed to link {} -> {}", link.display(), target.display())
    })?;
    Ok(())
}

#[cfg(unix)]
fn remove_stale_link(link: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(link)?;
    if meta.is_dir() {
        fs::remove_dir_all(link)
            .with_context(|| format!("Failed to remove: {}", link.display()))?;
    } else {
        fs::remove_file(link)
            .with_context(|| format!("Failed to remove: {}", link.display()))?;
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn replace_symlink(_target: &Path, _link: &Path) -> Result<()> {
    anyhow::bail!("symlink-based installation is only supported on Unix platforms")
}
