//! Error types shared across the sluice crates

use thiserror::Error;

/// Result type alias for sluice operations
pub type Result<T> = std::result::Result<T, SluiceError>;

/// Main error type for shared sluice functionality
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SluiceError {
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
}
