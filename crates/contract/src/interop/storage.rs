//! Storage interop services.

use crate::call_flags::CallFlags;
use crate::context::{InteropContext, StorageContext};
use crate::interop::iterator::{FindOptions, IteratorHandle, StorageIterator};
use crate::interop::{bytes_arg, int_arg, InteropDescriptor};
use crate::native::registry::ContractRegistry;
use crate::storage::{StorageItem, StorageKey};
use crate::{Error, Result};
use std::cell::RefCell;
use std::rc::Rc;
use vela_core::{MAX_STORAGE_KEY_SIZE, MAX_STORAGE_VALUE_SIZE};
use vela_vm::StackItem;

const CONTEXT_PRICE: i64 = 1 << 4;
const ACCESS_PRICE: i64 = 1 << 15;

/// Returns the storage syscall descriptors.
pub(crate) fn descriptors() -> Vec<InteropDescriptor> {
    vec![
        InteropDescriptor {
            name: "System.Storage.GetContext",
            price: CONTEXT_PRICE,
            required_flags: CallFlags::READ_STATES,
            handler: get_context,
        },
        InteropDescriptor {
            name: "System.Storage.GetReadOnlyContext",
            price: CONTEXT_PRICE,
            required_flags: CallFlags::READ_STATES,
            handler: get_read_only_context,
        },
        InteropDescriptor {
            name: "System.Storage.AsReadOnly",
            price: CONTEXT_PRICE,
            required_flags: CallFlags::READ_STATES,
            handler: as_read_only,
        },
        InteropDescriptor {
            name: "System.Storage.Get",
            price: ACCESS_PRICE,
            required_flags: CallFlags::READ_STATES,
            handler: get,
        },
        InteropDescriptor {
            name: "System.Storage.Put",
            price: ACCESS_PRICE,
            required_flags: CallFlags::WRITE_STATES,
            handler: put,
        },
        InteropDescriptor {
            name: "System.Storage.Delete",
            price: ACCESS_PRICE,
            required_flags: CallFlags::WRITE_STATES,
            handler: delete,
        },
        InteropDescriptor {
            name: "System.Storage.Find",
            price: ACCESS_PRICE,
            required_flags: CallFlags::READ_STATES,
            handler: find,
        },
    ]
}

/// Extracts a storage context argument.
pub(crate) fn context_arg(args: &[StackItem], index: usize) -> Result<StorageContext> {
    match args.get(index) {
        Some(StackItem::InteropInterface(handle)) => handle
            .as_any()
            .downcast_ref::<StorageContext>()
            .copied()
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "argument {} is a {} handle, expected a storage context",
                    index,
                    handle.interface_type()
                ))
            }),
        _ => Err(Error::InvalidArgument(format!(
            "argument {} is not a storage context",
            index
        ))),
    }
}

/// Resolves the currently executing contract's storage context.
fn get_context_internal(engine: &mut InteropContext, read_only: bool) -> Result<StackItem> {
    let current = engine.current_script_hash();
    let state = ContractRegistry::contract_state(engine, &current)?
        .ok_or_else(|| Error::NotFound(format!("contract {} is not registered", current)))?;
    Ok(StackItem::from_interface(StorageContext {
        id: state.id,
        read_only,
    }))
}

fn get_context(engine: &mut InteropContext, _args: Vec<StackItem>) -> Result<StackItem> {
    get_context_internal(engine, false)
}

fn get_read_only_context(engine: &mut InteropContext, _args: Vec<StackItem>) -> Result<StackItem> {
    get_context_internal(engine, true)
}

fn as_read_only(_engine: &mut InteropContext, args: Vec<StackItem>) -> Result<StackItem> {
    let context = context_arg(&args, 0)?;
    Ok(StackItem::from_interface(context.as_read_only()))
}

fn get(engine: &mut InteropContext, args: Vec<StackItem>) -> Result<StackItem> {
    let context = context_arg(&args, 0)?;
    let key = bytes_arg(&args, 1)?;
    match engine.get_storage(&StorageKey::new(context.id, key))? {
        Some(item) => Ok(StackItem::from_byte_string(item.value)),
        None => Ok(StackItem::Null),
    }
}

fn put(engine: &mut InteropContext, args: Vec<StackItem>) -> Result<StackItem> {
    let context = context_arg(&args, 0)?;
    let key = bytes_arg(&args, 1)?;
    let value = bytes_arg(&args, 2)?;
    put_with_context(engine, &context, key, value)?;
    Ok(StackItem::Null)
}

/// Writes a key-value pair, pricing the mutation before applying it.
///
/// A fresh key pays for key and value bytes in full. Overwrites that do
/// not grow the stored value pay an amortized quarter of the new length;
/// growing overwrites pay the amortized old length plus the growth.
pub(crate) fn put_with_context(
    engine: &mut InteropContext,
    context: &StorageContext,
    key: Vec<u8>,
    value: Vec<u8>,
) -> Result<()> {
    if key.len() > MAX_STORAGE_KEY_SIZE {
        return Err(Error::SizeLimitExceeded(format!(
            "storage key takes {} bytes, limit is {}",
            key.len(),
            MAX_STORAGE_KEY_SIZE
        )));
    }
    if value.len() > MAX_STORAGE_VALUE_SIZE {
        return Err(Error::SizeLimitExceeded(format!(
            "storage value takes {} bytes, limit is {}",
            value.len(),
            MAX_STORAGE_VALUE_SIZE
        )));
    }
    if context.read_only {
        return Err(Error::ReadOnlyViolation);
    }

    let storage_key = StorageKey::new(context.id, key);
    let existing = engine.get_storage(&storage_key)?;
    let size_increment = match &existing {
        None => storage_key.key.len() + value.len(),
        Some(old) => {
            let old_len = old.len();
            if value.is_empty() {
                0
            } else if value.len() <= old_len {
                (value.len() - 1) / 4 + 1
            } else if old_len == 0 {
                value.len()
            } else {
                (old_len - 1) / 4 + 1 + value.len() - old_len
            }
        }
    };
    engine.charge(size_increment as i64 * engine.config().storage_price)?;

    log::trace!(
        "storage put {} ({} bytes, priced for {})",
        storage_key,
        value.len(),
        size_increment
    );
    engine.put_storage(&storage_key, StorageItem::new(value));
    Ok(())
}

fn delete(engine: &mut InteropContext, args: Vec<StackItem>) -> Result<StackItem> {
    let context = context_arg(&args, 0)?;
    if context.read_only {
        return Err(Error::ReadOnlyViolation);
    }
    let key = bytes_arg(&args, 1)?;
    let storage_key = StorageKey::new(context.id, key);
    log::trace!("storage delete {}", storage_key);
    engine.delete_storage(&storage_key);
    Ok(StackItem::Null)
}

fn find(engine: &mut InteropContext, args: Vec<StackItem>) -> Result<StackItem> {
    let context = context_arg(&args, 0)?;
    let prefix = bytes_arg(&args, 1)?;
    let options = int_arg(&args, 2)?;
    let options = FindOptions::validate(&options)?;

    // Option validation precedes any scan work; the snapshot below
    // reflects state visible at call time only.
    let items = engine.seek_storage(context.id, &prefix)?;
    let iterator = Rc::new(RefCell::new(StorageIterator::new(
        prefix,
        options,
        *engine.limits(),
        items,
    )));
    engine.register_iterator(iterator.clone());
    Ok(StackItem::from_interface(IteratorHandle { inner: iterator }))
}
