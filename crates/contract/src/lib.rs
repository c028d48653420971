//! # Vela contract layer
//!
//! The deterministic execution substrate of the Vela chain: per-contract
//! storage with byte-proportional pricing, a hard gas limit, the interop
//! syscall surface consumed by the bytecode interpreter, and the native
//! contracts implementing the contract registry and the fungible tokens.
//!
//! Every invocation runs against its own [`context::InteropContext`]: a
//! copy-on-write view over the shared backing store plus a gas meter.
//! Faults and gas exhaustion abort the invocation and its pending writes
//! are discarded; a successful invocation's change set is committed in one
//! atomic step.

pub mod call_flags;
pub mod config;
pub mod context;
pub mod contract_state;
pub mod error;
pub mod gas;
pub mod interop;
pub mod native;
pub mod storage;

pub use call_flags::CallFlags;
pub use config::ExecutionConfig;
pub use context::{InteropContext, NotificationEvent, NullScriptHost, ScriptHost, StorageContext};
pub use contract_state::{AbiMethod, ContractAbi, ContractManifest, ContractState, NefFile};
pub use error::{Error, Result};
pub use gas::GasMeter;
pub use interop::iterator::{FindOptions, StorageIterator};
pub use native::{
    ContractRegistry, FungibleToken, NativeContract, NativeRegistry, SparkToken, VelaToken,
};
pub use storage::{MemoryStore, SharedStore, StorageItem, StorageKey, Store, StoreCache};
