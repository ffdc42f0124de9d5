//! Error types for pulse-hr

use thiserror::Error;

/// Main error type for the heart-rate service
#[derive(Error, Debug)]
pub enum Error {
    /// Errors from shared configuration and wire encoding
    #[error(transparent)]
    Common(#[from] pulse_common::Error),

    /// HTTP server errors (bind, serve)
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Heart rate value outside the supported range
    #[error("Heart rate out of range: {0} bpm")]
    InvalidSample(u8),
}

/// Convenience Result type using pulse-hr Error
pub type Result<T> = std::result::Result<T, Error>;
