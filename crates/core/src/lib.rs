//! Core types and protocol constants for the Vela blockchain.
//!
//! This crate provides the fixed-width identifiers and the protocol-level
//! size constants shared by the virtual machine and the contract layer.

pub mod error;
pub mod hash;
pub mod uint160;

pub use error::{Error, Result};
pub use hash::hash160;
pub use uint160::UInt160;

/// Size of a contract/account address in bytes.
pub const ADDRESS_SIZE: usize = 20;

/// Maximum length of a contract storage key in bytes.
pub const MAX_STORAGE_KEY_SIZE: usize = 64;

/// Maximum length of a contract storage value in bytes.
pub const MAX_STORAGE_VALUE_SIZE: usize = 65535;

/// Default price charged per byte of storage growth, in gas units.
pub const DEFAULT_STORAGE_PRICE: i64 = 100_000;
