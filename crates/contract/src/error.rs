//! Error types for the contract layer.
//!
//! Every variant here is an engine fault: it aborts the current invocation
//! and the enclosing committer discards the invocation's pending writes.
//! Token-level business failures (insufficient funds, negative amount) are
//! deliberately not errors; they surface as a boolean `false` result.

use thiserror::Error;

/// Errors produced by storage access, gas accounting and native dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A mutation was attempted through a read-only storage context.
    #[error("storage context is read-only")]
    ReadOnlyViolation,

    /// A key, value or serialized payload crossed a fixed ceiling.
    #[error("size limit exceeded: {0}")]
    SizeLimitExceeded(String),

    /// The gas meter could not cover a charge.
    #[error("gas limit exceeded: requested {requested}, remaining {remaining}")]
    GasLimitExceeded {
        /// The amount that was requested.
        requested: i64,
        /// The balance that remained before the charge.
        remaining: i64,
    },

    /// A find scan was requested with a forbidden option combination.
    #[error("invalid find options: {0}")]
    InvalidFindOptions(String),

    /// A contract, method or syscall could not be resolved.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller lacks a call flag required by the target.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A deploy collided with a live registry entry.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A method exists under the requested name but not with this arity.
    #[error("arity mismatch: {0}")]
    ArityMismatch(String),

    /// A contract manifest failed validation.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// A NEF payload failed validation.
    #[error("invalid nef: {0}")]
    InvalidNef(String),

    /// An argument could not be interpreted as the expected type.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The backing store could not be accessed.
    #[error("storage error: {0}")]
    StorageError(String),

    /// A value failed canonical (de)serialization.
    #[error("serialization error: {0}")]
    Serialization(#[from] vela_vm::Error),
}

/// Result type for contract layer operations.
pub type Result<T> = std::result::Result<T, Error>;
