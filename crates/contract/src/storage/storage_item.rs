//! Storage item implementation for contract storage.

use serde::{Deserialize, Serialize};

/// Represents a raw value in the contract storage system.
///
/// An empty value is a valid, present item; absence of a key is a distinct
/// state expressed as `Option::None` at the access layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StorageItem {
    /// The value data.
    pub value: Vec<u8>,
}

impl StorageItem {
    /// Creates a new storage item.
    pub fn new(value: Vec<u8>) -> Self {
        Self { value }
    }

    /// Gets the size of the value in bytes.
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// Returns true if the value is empty.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl From<Vec<u8>> for StorageItem {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_item_is_present() {
        let item = StorageItem::new(Vec::new());
        assert!(item.is_empty());
        assert_eq!(item.len(), 0);
    }
}
