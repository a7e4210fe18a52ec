//! Error types for parkly.
//!
//! This module defines the crate-level error type. Component-specific failures
//! (`DirectionsError`, `LocationError`) live next to their components and convert
//! into [`Error`] when they need to cross a public boundary.

use thiserror::Error;

use crate::directions::DirectionsError;
use crate::location::LocationError;

/// The main error type for parkly operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Session Errors ===
    /// A directions request could not produce a route.
    #[error("directions unavailable: {0}")]
    Directions(#[from] DirectionsError),

    /// The positioning subsystem could not provide a location.
    #[error("location unavailable: {0}")]
    Location(#[from] LocationError),

    /// Text could not be parsed as a coordinate.
    #[error("invalid coordinate '{input}': {reason}")]
    InvalidCoordinate {
        /// The text that failed to parse.
        input: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// A specialized Result type for parkly operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Create a coordinate parse error.
    #[must_use]
    pub fn invalid_coordinate(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCoordinate {
            input: input.into(),
            reason: reason.into(),
        }
    }
}
