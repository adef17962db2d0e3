//! pantry - project-scoped developer environments
//!
//! A developer-environment package manager with project-scoped dependency
//! installation, content-addressed caching, deterministic lockfile
//! generation, and transparent shell-driven auto-activation. Given a
//! project directory with a recognized dependency manifest, pantry
//! materializes an isolated environment holding exactly the requested
//! packages and wires that environment's executables onto the shell
//! search path when the user enters the project.
//!
//! # Architecture
//!
//! pantry follows a manifest/lockfile model where:
//! - `deps.yaml` (or a sibling name) declares desired dependencies
//! - `.freezer` records exact resolved versions for reproducibility
//! - Environments live under `~/.pantry/envs/`, one per project+manifest
//! - Unpacked packages are cached once under `~/.pantry/cache/packages/`
//!   and shared across all environments
//!
//! # Core Modules
//!
//! - [`activate`] - The shell-hook entry points: cache lookup, install
//!   fall-through, and eval-safe shell code emission
//! - [`cache`] - The content-addressed package cache and the
//!   fingerprint-indexed environment cache
//! - [`cli`] - Command-line interface implementation
//! - [`config`] - Pantry home layout and overrides
//! - [`core`] - Error types and user-friendly error reporting
//! - [`fingerprint`] - MD5-based identity hashes for environment
//!   addressing
//! - [`installer`] - The batch engine, the single-package installer, and
//!   the shared installing stack
//! - [`lockfile`] - `.freezer` generation, parsing, and validation
//! - [`manifest`] - Manifest detection and YAML parsing
//! - [`models`] - Shared data models for dependency specifications
//! - [`registry`] - Package registry lookup/resolution and the
//!   fetch+extract layer
//! - [`utils`] - Filesystem, platform, and progress helpers
//!
//! # Activation flow
//!
//! Cold: shell hook → [`activate::Activator`] → manifest detection →
//! fingerprint → env-cache miss → [`installer::InstallEngine`] →
//! per-worker [`installer::SingleInstaller`] → package cache hit or fetch
//! → symlinks into the env `bin/` → `.freezer` written → env cache
//! populated → `export PATH=...` emitted.
//!
//! Warm: shell hook → env-cache hit (mtime revalidated) → `export
//! PATH=...` emitted. Nothing else runs.

pub mod activate;
pub mod cache;
pub mod cli;
pub mod config;
pub mod core;
pub mod fingerprint;
pub mod installer;
pub mod lockfile;
pub mod manifest;
pub mod models;
pub mod registry;
pub mod utils;
