//! Execution limits bounding serialization work.

/// Ceilings applied by the serializer and the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Maximum total size of a serialized item in bytes.
    pub max_item_size: usize,

    /// Maximum number of nodes decoded from a single encoding.
    pub max_deserialized_items: usize,

    /// Maximum width of an integer item in bytes.
    pub max_integer_size: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_item_size: 1024 * 1024,
            max_deserialized_items: 2048,
            max_integer_size: 32,
        }
    }
}
