//! Execution configuration for a single invocation.

use vela_core::DEFAULT_STORAGE_PRICE;
use vela_vm::ExecutionLimits;

/// Settings governing one invocation of the execution substrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionConfig {
    /// The gas spending limit. Negative means unlimited (diagnostic only).
    pub gas_limit: i64,

    /// The price charged per byte of storage growth.
    pub storage_price: i64,

    /// Serialization ceilings applied to stack item encodings.
    pub limits: ExecutionLimits,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            gas_limit: 10_000_000_000,
            storage_price: DEFAULT_STORAGE_PRICE,
            limits: ExecutionLimits::default(),
        }
    }
}
