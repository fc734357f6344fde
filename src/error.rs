//! Error types for the navstate library
//!
//! This module provides the crate-wide error and result types. Module-level
//! errors such as [`ManifoldError`] convert into [`NavError`] so callers can
//! use `?` across module boundaries.

use crate::manifold::ManifoldError;
use thiserror::Error;

/// Main result type used throughout the navstate library
pub type NavResult<T> = Result<T, NavError>;

/// Main error type for the navstate library
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NavError {
    /// Manifold operations errors
    #[error("Manifold error: {0}")]
    Manifold(String),

    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid navigation configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<ManifoldError> for NavError {
    fn from(err: ManifoldError) -> Self {
        NavError::Manifold(err.to_string())
    }
}
