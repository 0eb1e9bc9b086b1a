//! Error types for trackpat-core.

use thiserror::Error;

/// Result type alias for trackpat operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for trackpat operations.
///
/// The track finding itself never fails; these errors are raised when
/// configuration or geometry handed to it cannot be used.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration value out of range.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Geometry description is not usable.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
}
