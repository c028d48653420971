//! # Vela Virtual Machine value model
//!
//! The stack item type used on the interpreter evaluation stack and in
//! persisted contract storage, together with its canonical binary
//! serialization.
//!
//! Every node processing a block must produce byte-identical storage, so
//! the encoding defined here is fully deterministic and guarded against
//! unbounded work: serialization enforces a total size ceiling and refuses
//! self-referential graphs, deserialization additionally bounds the number
//! of decoded nodes.

pub mod error;
pub mod limits;
pub mod serializer;
pub mod stack_item;
pub mod stack_item_type;

pub use error::{Error, Result};
pub use limits::ExecutionLimits;
pub use serializer::BinarySerializer;
pub use stack_item::{InteropInterface, Map, StackItem};
pub use stack_item_type::StackItemType;
