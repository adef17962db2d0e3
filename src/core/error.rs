//! Error handling for pantry
//!
//! This module provides the error types and user-friendly error reporting for
//! the pantry environment manager. The error system is designed around two
//! core principles:
//! 1. **Strongly-typed errors** for precise error handling in code
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Architecture
//!
//! The error system consists of two main types:
//! - [`PantryError`] - Enumerated error types for all failure cases
//! - [`ErrorContext`] - Wrapper that adds user-friendly messages and suggestions
//!
//! # Error Categories
//!
//! - **Not-found**: [`PantryError::ManifestNotFound`],
//!   [`PantryError::PackageNotFoundInRegistry`], [`PantryError::LocalPathMissing`]
//! - **Transient I/O**: [`PantryError::FetchFailed`], [`PantryError::ExtractFailed`],
//!   [`PantryError::CacheInsertFailed`], [`PantryError::SymlinkFailed`]
//! - **Invariant**: [`PantryError::DuplicateLockfileEntry`],
//!   [`PantryError::InvalidEnvHash`], [`PantryError::UnknownSourceTag`]
//! - **Permission**: [`PantryError::PermissionDenied`]
//!
//! Per-package errors (the transient I/O group) are recovered into the batch
//! results and folded into the install summary; only batch-wide setup errors
//! abort an installation. The not-found and invariant groups are fatal for
//! the call that raised them.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pantry_cli::core::{ErrorContext, PantryError};
//!
//! let error = PantryError::ManifestNotFound { dir: "/tmp/proj".to_string() };
//! let context = ErrorContext::new(error)
//!     .with_suggestion("Create a deps.yaml file in your project directory");
//! context.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for pantry operations.
///
/// Each variant represents a specific failure mode and carries the context
/// needed to report it: package names, paths, and underlying reasons. The
/// messages are written for end users, so a bare `{}` rendering of any
/// variant is suitable for CLI display.
#[derive(Error, Debug)]
pub enum PantryError {
    /// No recognized dependency manifest was found at or above a directory.
    ///
    /// The detector walks at most 10 parent levels before giving up, so this
    /// error also fires for projects nested deeper than that below their
    /// manifest.
    #[error("no dependency manifest found at or above: {dir}")]
    ManifestNotFound {
        /// The directory where the upward search started
        dir: String,
    },

    /// A manifest file exists but could not be parsed.
    #[error("failed to parse manifest {file}: {reason}")]
    ManifestParseError {
        /// Path of the manifest file
        file: String,
        /// Parser error detail
        reason: String,
    },

    /// A package name has no entry in the registry.
    ///
    /// This is the only per-package error that can be escalated to abort a
    /// whole batch; all other per-package failures are recorded and the
    /// batch continues.
    #[error("package '{name}' not found in registry")]
    PackageNotFoundInRegistry {
        /// The requested package name
        name: String,
    },

    /// Downloading a package distribution failed.
    #[error("failed to fetch {url}: {reason}")]
    FetchFailed {
        /// The distribution URL that failed
        url: String,
        /// Transport-level failure detail
        reason: String,
    },

    /// Unpacking a downloaded archive failed.
    #[error("failed to extract {name}@{version}: {reason}")]
    ExtractFailed {
        /// Package name
        name: String,
        /// Resolved version being extracted
        version: String,
        /// Extraction failure detail
        reason: String,
    },

    /// Moving an unpacked package into the package cache failed.
    #[error("failed to store {name}@{version} in package cache: {reason}")]
    CacheInsertFailed {
        /// Package name
        name: String,
        /// Resolved version
        version: String,
        /// Filesystem failure detail
        reason: String,
    },

    /// Creating a symlink into an environment directory failed.
    #[error("failed to create symlink {path}: {reason}")]
    SymlinkFailed {
        /// The link path that could not be created
        path: String,
        /// Filesystem failure detail
        reason: String,
    },

    /// The installation was cancelled before this package completed.
    #[error("installation cancelled")]
    Cancelled,

    /// A local dependency points at a directory that does not exist.
    ///
    /// Surfaced as a warning at the batch level; the batch itself continues.
    #[error("local dependency '{name}' target does not exist: {path}")]
    LocalPathMissing {
        /// Display name of the local dependency
        name: String,
        /// The resolved target path that was checked
        path: String,
    },

    /// Two lockfile entries resolved to the same `<name>@<version>` key.
    #[error("duplicate lockfile entry: {key}")]
    DuplicateLockfileEntry {
        /// The colliding `<name>@<version>` key
        key: String,
    },

    /// An environment hash argument was not 32 hex characters.
    #[error("invalid environment hash '{value}': expected 32 hex characters")]
    InvalidEnvHash {
        /// The rejected argument
        value: String,
    },

    /// A lockfile or manifest carried a source tag this build does not know.
    #[error("unknown package source tag: {tag}")]
    UnknownSourceTag {
        /// The unrecognized tag
        tag: String,
    },

    /// An environment or cache directory is not writable.
    ///
    /// Fatal for activation: no shell code is emitted when the environment
    /// cannot be materialized.
    #[error("permission denied: {path}")]
    PermissionDenied {
        /// The path that could not be written
        path: String,
    },

    /// A project path handed to the path-mapping layer was not absolute.
    #[error("project path must be absolute: {path}")]
    ProjectPathNotAbsolute {
        /// The rejected path
        path: String,
    },

    /// No environment is known for the given fingerprint.
    #[error("no environment found for hash {hash}")]
    EnvNotFound {
        /// The fingerprint that was looked up
        hash: String,
    },

    /// IO error wrapper for [`std::io::Error`]
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing error from [`serde_yaml`]
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// JSON error from [`serde_json`]
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML serialization error from [`toml`]
    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    /// TOML parsing error from [`toml`]
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Generic error with a custom message
    #[error("{message}")]
    Other {
        /// The error description
        message: String,
    },
}

impl PantryError {
    /// Whether this error belongs to the per-package group that the batch
    /// recovers from (recorded in the results array) rather than propagates.
    #[must_use]
    pub const fn is_per_package(&self) -> bool {
        matches!(
            self,
            Self::PackageNotFoundInRegistry { .. }
                | Self::FetchFailed { .. }
                | Self::ExtractFailed { .. }
                | Self::CacheInsertFailed { .. }
                | Self::SymlinkFailed { .. }
                | Self::LocalPathMissing { .. }
                | Self::Cancelled
        )
    }
}

/// Error context wrapper providing user-friendly messages and suggestions.
///
/// Wraps a [`PantryError`] with an optional actionable suggestion and
/// additional detail text. Rendered to stderr by [`ErrorContext::display`]
/// with the same shape everywhere: a red `Error:` line, optional dimmed
/// details, and a green suggestion.
pub struct ErrorContext {
    /// The underlying error
    pub error: PantryError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context from a [`PantryError`].
    #[must_use]
    pub const fn new(error: PantryError) -> Self {
        Self { error, suggestion: None, details: None }
    }

    /// Add a suggestion for resolving the error.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add extra detail text shown below the main message.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with color.
    ///
    /// Stdout is reserved for shell-consumable output, so all error
    /// rendering goes to stderr.
    pub fn display(&self) {
        eprintln!("{} {}", "Error:".red().bold(), self.error);
        if let Some(details) = &self.details {
            eprintln!("  {}", details.dimmed());
        }
        if let Some(suggestion) = &self.suggestion {
            eprintln!("  {} {}", "hint:".green().bold(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.error)?;
        if let Some(details) = &self.details {
            write!(f, "\n  {details}")?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n  hint: {suggestion}")?;
        }
        Ok(())
    }
}

/// Convert any error into a user-friendly [`ErrorContext`].
///
/// Recognizes [`PantryError`] variants and attaches an appropriate
/// suggestion; anything else is wrapped as [`PantryError::Other`] using the
/// full anyhow chain so context added with `.context(..)` is preserved.
#[must_use]
pub fn user_friendly_error(err: anyhow::Error) -> ErrorContext {
    match err.downcast::<PantryError>() {
        Ok(error) => {
            let suggestion = match &error {
                PantryError::ManifestNotFound { .. } => {
                    Some("create a deps.yaml listing your dependencies, or cd into a project that has one")
                }
                PantryError::PackageNotFoundInRegistry { .. } => {
                    Some("check the package name; `pantry env:list` shows what is already installed")
                }
                PantryError::FetchFailed { .. } => Some("check your network connection and retry"),
                PantryError::PermissionDenied { .. } => {
                    Some("check ownership of ~/.pantry and the project directory")
                }
                PantryError::InvalidEnvHash { .. } => {
                    Some("pass the 32-character hash printed by `pantry env:list`")
                }
                _ => None,
            };
            let ctx = ErrorContext::new(error);
            match suggestion {
                Some(s) => ctx.with_suggestion(s),
                None => ctx,
            }
        }
        Err(other) => ErrorContext::new(PantryError::Other { message: format!("{other:#}") }),
    }
}
