//! Error types for core type handling.

use thiserror::Error;

/// Errors produced when parsing or converting core types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The input does not have the expected length or format.
    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
