//! Contract storage: keys, items and the layered backing store.

pub mod storage_item;
pub mod storage_key;
pub mod store;

pub use storage_item::StorageItem;
pub use storage_key::StorageKey;
pub use store::{MemoryStore, SharedStore, Store, StoreCache};
