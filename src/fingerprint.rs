//! MD5-based fingerprints for environment addressing.
//!
//! Every identity in the activation pipeline derives from one of three
//! fingerprints:
//!
//! - the **manifest content hash**: MD5 over the manifest's full byte
//!   content; its first 8 hex chars (`manifest_hash8`) suffix the env-dir
//!   name, so editing the manifest produces a new environment directory;
//! - the **project path hash** (`proj_hash8`): the first 4 bytes of
//!   MD5(absolute project path), read as a little-endian u32 and rendered
//!   as 8 lowercase hex chars;
//! - the **manifest path hash**: MD5 over the manifest's absolute path
//!   bytes, keying the environment cache so warm lookups never read the
//!   manifest itself.
//!
//! MD5 is used as a cheap, stable identity hash of the inputs; no security
//! properties are assumed.

use md5::{Digest, Md5};
use std::path::Path;

use crate::core::{PantryError, Result};

/// MD5 digest of arbitrary bytes.
#[must_use]
pub fn content_fingerprint(bytes: &[u8]) -> [u8; 16] {
    Md5::digest(bytes).into()
}

/// Full 32-char lowercase hex form of the content fingerprint.
#[must_use]
pub fn content_hash_hex(bytes: &[u8]) -> String {
    hex::encode(content_fingerprint(bytes))
}

/// First 8 hex chars of the manifest content hash; the `d<hash8>` env-dir
/// suffix component.
#[must_use]
pub fn manifest_hash8(manifest_content: &[u8]) -> String {
    let mut hex = content_hash_hex(manifest_content);
    hex.truncate(8);
    hex
}

/// MD5 digest of a path's byte representation.
///
/// Keys the environment cache: derived from the manifest *path*, not its
/// content, so entries survive manifest edits until the stored mtime no
/// longer matches.
#[must_use]
pub fn path_fingerprint(path: &Path) -> [u8; 16] {
    content_fingerprint(path.as_os_str().as_encoded_bytes())
}

/// Hex form of [`path_fingerprint`], used as the env-cache key.
#[must_use]
pub fn path_hash_hex(path: &Path) -> String {
    hex::encode(path_fingerprint(path))
}

/// Short project-directory hash: first 4 bytes of MD5(absolute path) as a
/// little-endian u32, formatted as 8 lowercase hex chars.
///
/// Errors if the path is not absolute; env addressing must not depend on
/// the working directory.
pub fn project_hash8(project_dir: &Path) -> Result<String> {
    if !project_dir.is_absolute() {
        return Err(PantryError::ProjectPathNotAbsolute {
            path: project_dir.display().to_string(),
        });
    }
    let digest = path_fingerprint(project_dir);
    let word = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]);
    Ok(format!("{word:08x}"))
}

/// The canonical environment directory name for a project + manifest pair:
/// `<project_basename>_<proj_hash8>-d<manifest_hash8>`.
///
/// Depends only on the absolute project path and the manifest's content
/// bytes; edits to project contents that do not move the project, or
/// manifest edits that do not change its bytes, leave the name unchanged.
pub fn env_dir_name(project_dir: &Path, manifest_content: &[u8]) -> Result<String> {
    let proj = project_hash8(project_dir)?;
    let basename = project_dir
        .file_name()
        .map_or_else(|| "root".to_string(), |n| n.to_string_lossy().into_owned());
    Ok(format!("{basename}_{proj}-d{}", manifest_hash8(manifest_content)))
}

/// Validate a user-supplied environment hash: exactly 32 hex characters.
pub fn validate_env_hash(value: &str) -> Result<()> {
    if value.len() == 32 && value.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(PantryError::InvalidEnvHash { value: value.to_string() })
    }
}
