//! Core types and error handling shared across the crate.
//!
//! This module hosts the error taxonomy ([`PantryError`], [`ErrorContext`])
//! used by every other module. Domain data models live in [`crate::models`];
//! this module is intentionally small.

pub mod error;

pub use error::{ErrorContext, PantryError, user_friendly_error};

/// Result alias used throughout the crate for pantry-typed failures.
pub type Result<T> = std::result::Result<T, PantryError>;
