//! VM error types and result handling.

use thiserror::Error;

/// Errors produced by the value model and the canonical serializer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A size or element-count ceiling was crossed.
    #[error("size limit exceeded: {0}")]
    SizeLimitExceeded(String),

    /// A composite item reached itself during traversal.
    #[error("recursive structure: {0}")]
    RecursiveStructure(String),

    /// The item kind has no canonical encoding.
    #[error("unserializable item: {0}")]
    Unserializable(String),

    /// An unknown or unexpected type tag was encountered.
    #[error("invalid type: {0}")]
    InvalidType(String),

    /// The input bytes do not form a valid encoding.
    #[error("malformed data: {0}")]
    Malformed(String),

    /// A stack item could not be converted to the requested type.
    #[error("invalid cast: {0}")]
    InvalidCast(String),
}

/// Result type for VM operations.
pub type Result<T> = std::result::Result<T, Error>;
