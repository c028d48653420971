//! Find options and the storage scan iterator.

use crate::call_flags::CallFlags;
use crate::interop::InteropDescriptor;
use crate::{Error, Result};
use bitflags::bitflags;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use vela_vm::{BinarySerializer, ExecutionLimits, InteropInterface, StackItem};

const NEXT_PRICE: i64 = 1 << 15;
const VALUE_PRICE: i64 = 1 << 4;

bitflags! {
    /// Options shaping the results of a storage prefix scan.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FindOptions: u8 {
        /// Yield keys only.
        const KEYS_ONLY = 0x01;
        /// Strip the scan prefix from yielded keys.
        const REMOVE_PREFIX = 0x02;
        /// Yield values only.
        const VALUES_ONLY = 0x04;
        /// Deserialize values as stack items.
        const DESERIALIZE_VALUES = 0x08;
        /// Reduce each deserialized value to its first element.
        const PICK_FIELD_0 = 0x10;
        /// Reduce each deserialized value to its second element.
        const PICK_FIELD_1 = 0x20;
    }
}

impl FindOptions {
    /// Validates a raw option value, rejecting unknown bits and forbidden
    /// combinations before any scan work happens.
    pub fn validate(raw: &BigInt) -> Result<Self> {
        let byte = raw
            .to_u8()
            .ok_or_else(|| Error::InvalidFindOptions("unknown flag".to_string()))?;
        let options = Self::from_bits(byte)
            .ok_or_else(|| Error::InvalidFindOptions("unknown flag".to_string()))?;
        if options.contains(Self::KEYS_ONLY)
            && options
                .intersects(Self::DESERIALIZE_VALUES | Self::PICK_FIELD_0 | Self::PICK_FIELD_1)
        {
            return Err(Error::InvalidFindOptions(
                "KeysOnly conflicts with value options".to_string(),
            ));
        }
        if options.contains(Self::VALUES_ONLY)
            && options.intersects(Self::KEYS_ONLY | Self::REMOVE_PREFIX)
        {
            return Err(Error::InvalidFindOptions(
                "ValuesOnly conflicts with key options".to_string(),
            ));
        }
        if options.contains(Self::PICK_FIELD_0) && options.contains(Self::PICK_FIELD_1) {
            return Err(Error::InvalidFindOptions(
                "PickField0 conflicts with PickField1".to_string(),
            ));
        }
        if options.intersects(Self::PICK_FIELD_0 | Self::PICK_FIELD_1)
            && !options.contains(Self::DESERIALIZE_VALUES)
        {
            return Err(Error::InvalidFindOptions(
                "PickField requires DeserializeValues".to_string(),
            ));
        }
        Ok(options)
    }
}

/// Iterator over a storage prefix scan.
///
/// The result set is fixed against the state visible when the scan was
/// issued. The iterator is a scoped resource: the owning invocation
/// context releases it on every exit path.
pub struct StorageIterator {
    prefix: Vec<u8>,
    options: FindOptions,
    limits: ExecutionLimits,
    items: Vec<(Vec<u8>, Vec<u8>)>,
    position: Option<usize>,
    released: bool,
}

impl StorageIterator {
    /// Creates an iterator over materialized scan results.
    pub fn new(
        prefix: Vec<u8>,
        options: FindOptions,
        limits: ExecutionLimits,
        items: Vec<(Vec<u8>, Vec<u8>)>,
    ) -> Self {
        Self {
            prefix,
            options,
            limits,
            items,
            position: None,
            released: false,
        }
    }

    /// Advances to the next result, returning false once exhausted.
    pub fn next(&mut self) -> bool {
        if self.released {
            return false;
        }
        let next = match self.position {
            None => 0,
            Some(p) => p + 1,
        };
        if next < self.items.len() {
            self.position = Some(next);
            true
        } else {
            self.position = Some(self.items.len());
            false
        }
    }

    /// Returns the result at the current position, shaped per the scan
    /// options.
    ///
    /// A value that fails to deserialize, or a pick index past the
    /// element's arity, yields `Null` for that single result instead of
    /// aborting the scan.
    pub fn value(&self) -> Result<StackItem> {
        if self.released {
            return Err(Error::InvalidArgument("iterator was released".to_string()));
        }
        let position = self
            .position
            .ok_or_else(|| Error::InvalidArgument("iterator is not positioned".to_string()))?;
        let (key, value) = self
            .items
            .get(position)
            .ok_or_else(|| Error::InvalidArgument("iterator is exhausted".to_string()))?;

        let key_bytes = if self.options.contains(FindOptions::REMOVE_PREFIX) {
            key[self.prefix.len()..].to_vec()
        } else {
            key.clone()
        };

        if self.options.contains(FindOptions::KEYS_ONLY) {
            return Ok(StackItem::from_byte_string(key_bytes));
        }

        let value_item = if self.options.contains(FindOptions::DESERIALIZE_VALUES) {
            match BinarySerializer::deserialize(value, &self.limits) {
                Ok(item) => {
                    if self.options.contains(FindOptions::PICK_FIELD_0) {
                        pick(&item, 0)
                    } else if self.options.contains(FindOptions::PICK_FIELD_1) {
                        pick(&item, 1)
                    } else {
                        item
                    }
                }
                Err(_) => StackItem::Null,
            }
        } else {
            StackItem::from_byte_string(value.clone())
        };

        if self.options.contains(FindOptions::VALUES_ONLY) {
            return Ok(value_item);
        }
        Ok(StackItem::from_struct(vec![
            StackItem::from_byte_string(key_bytes),
            value_item,
        ]))
    }

    /// Releases the iterator's buffered results. Further use yields
    /// nothing; release is idempotent.
    pub fn release(&mut self) {
        self.items.clear();
        self.released = true;
    }

    /// Returns true if the iterator has been released.
    pub fn is_released(&self) -> bool {
        self.released
    }
}

fn pick(item: &StackItem, index: usize) -> StackItem {
    match item {
        StackItem::Array(elements) | StackItem::Struct(elements) => {
            let elements = elements.borrow();
            elements.get(index).cloned().unwrap_or(StackItem::Null)
        }
        _ => StackItem::Null,
    }
}

/// Stack handle wrapping a live scan iterator.
pub struct IteratorHandle {
    /// The shared iterator, also registered with the invocation context.
    pub inner: Rc<RefCell<StorageIterator>>,
}

impl std::fmt::Debug for IteratorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IteratorHandle").finish_non_exhaustive()
    }
}

impl InteropInterface for IteratorHandle {
    fn interface_type(&self) -> &str {
        "StorageIterator"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Returns the iterator syscall descriptors.
pub(crate) fn descriptors() -> Vec<InteropDescriptor> {
    vec![
        InteropDescriptor {
            name: "System.Iterator.Next",
            price: NEXT_PRICE,
            required_flags: CallFlags::NONE,
            handler: iterator_next,
        },
        InteropDescriptor {
            name: "System.Iterator.Value",
            price: VALUE_PRICE,
            required_flags: CallFlags::NONE,
            handler: iterator_value,
        },
    ]
}

fn handle_arg(args: &[StackItem], index: usize) -> Result<Rc<RefCell<StorageIterator>>> {
    match args.get(index) {
        Some(StackItem::InteropInterface(handle)) => handle
            .as_any()
            .downcast_ref::<IteratorHandle>()
            .map(|h| h.inner.clone())
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "argument {} is a {} handle, expected an iterator",
                    index,
                    handle.interface_type()
                ))
            }),
        _ => Err(Error::InvalidArgument(format!(
            "argument {} is not an iterator",
            index
        ))),
    }
}

fn iterator_next(
    _engine: &mut crate::context::InteropContext,
    args: Vec<StackItem>,
) -> Result<StackItem> {
    let iterator = handle_arg(&args, 0)?;
    let advanced = iterator.borrow_mut().next();
    Ok(StackItem::from_bool(advanced))
}

fn iterator_value(
    _engine: &mut crate::context::InteropContext,
    args: Vec<StackItem>,
) -> Result<StackItem> {
    let iterator = handle_arg(&args, 0)?;
    let value = iterator.borrow().value()?;
    Ok(value)
}
