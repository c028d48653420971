//! Interop services exposed to the bytecode interpreter.
//!
//! Every syscall is described by a static descriptor carrying its fixed
//! price and required call flags. Dispatch validates flags and charges the
//! price before the handler runs, so a handler never executes on an
//! unauthorized or unpaid call.

pub mod contract;
pub mod iterator;
pub mod runtime;
pub mod storage;

use crate::call_flags::CallFlags;
use crate::context::InteropContext;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use vela_vm::StackItem;

/// Handler signature shared by all syscalls.
pub type InteropHandler = fn(&mut InteropContext, Vec<StackItem>) -> Result<StackItem>;

/// Static description of one syscall.
pub struct InteropDescriptor {
    /// The syscall name as used by the interpreter.
    pub name: &'static str,

    /// The fixed gas price charged before the handler runs.
    pub price: i64,

    /// Call flags the executing context must hold.
    pub required_flags: CallFlags,

    /// The handler implementing the syscall.
    pub handler: InteropHandler,
}

static SYSCALLS: Lazy<HashMap<&'static str, InteropDescriptor>> = Lazy::new(|| {
    let mut table = HashMap::new();
    let descriptors = storage::descriptors()
        .into_iter()
        .chain(iterator::descriptors())
        .chain(runtime::descriptors())
        .chain(contract::descriptors());
    for descriptor in descriptors {
        table.insert(descriptor.name, descriptor);
    }
    table
});

/// Looks up a syscall descriptor by name.
pub fn descriptor(name: &str) -> Option<&'static InteropDescriptor> {
    SYSCALLS.get(name)
}

/// Dispatches a syscall: resolves the descriptor, checks the executing
/// context's call flags, charges the fixed price, then runs the handler.
pub(crate) fn dispatch(
    engine: &mut InteropContext,
    name: &str,
    args: Vec<StackItem>,
) -> Result<StackItem> {
    let descriptor = descriptor(name).ok_or_else(|| Error::NotFound(format!("syscall {}", name)))?;
    if !engine.call_flags().has_flag(descriptor.required_flags) {
        return Err(Error::PermissionDenied(format!(
            "syscall {} requires call flags {:#04x}",
            name, descriptor.required_flags.0
        )));
    }
    engine.charge(descriptor.price)?;
    (descriptor.handler)(engine, args)
}

/// Extracts a byte-string argument.
pub(crate) fn bytes_arg(args: &[StackItem], index: usize) -> Result<Vec<u8>> {
    args.get(index)
        .ok_or_else(|| Error::InvalidArgument(format!("missing argument {}", index)))?
        .as_bytes()
        .map_err(|e| Error::InvalidArgument(e.to_string()))
}

/// Extracts an integer argument.
pub(crate) fn int_arg(args: &[StackItem], index: usize) -> Result<num_bigint::BigInt> {
    args.get(index)
        .ok_or_else(|| Error::InvalidArgument(format!("missing argument {}", index)))?
        .as_int()
        .map_err(|e| Error::InvalidArgument(e.to_string()))
}

/// Extracts a string argument.
pub(crate) fn string_arg(args: &[StackItem], index: usize) -> Result<String> {
    String::from_utf8(bytes_arg(args, index)?)
        .map_err(|_| Error::InvalidArgument(format!("argument {} is not valid utf-8", index)))
}

/// Extracts a 160-bit identifier argument.
pub(crate) fn hash_arg(args: &[StackItem], index: usize) -> Result<vela_core::UInt160> {
    vela_core::UInt160::from_bytes(&bytes_arg(args, index)?)
        .map_err(|e| Error::InvalidArgument(e.to_string()))
}
