//! Contract call interop services.

use crate::call_flags::CallFlags;
use crate::context::InteropContext;
use crate::interop::{hash_arg, int_arg, string_arg, InteropDescriptor};
use crate::{Error, Result};
use num_traits::ToPrimitive;
use vela_vm::StackItem;

const CALL_PRICE: i64 = 1 << 15;

/// Returns the contract syscall descriptors.
pub(crate) fn descriptors() -> Vec<InteropDescriptor> {
    vec![InteropDescriptor {
        name: "System.Contract.Call",
        price: CALL_PRICE,
        required_flags: CallFlags::ALLOW_CALL,
        handler: call,
    }]
}

fn call(engine: &mut InteropContext, args: Vec<StackItem>) -> Result<StackItem> {
    let hash = hash_arg(&args, 0)?;
    let method = string_arg(&args, 1)?;
    let flag_bits = int_arg(&args, 2)?
        .to_u32()
        .ok_or_else(|| Error::InvalidArgument("call flags out of range".to_string()))?;
    let flags = CallFlags::from_bits(flag_bits)
        .ok_or_else(|| Error::InvalidArgument("unknown call flags".to_string()))?;
    let call_args = match args.get(3) {
        Some(StackItem::Array(elements)) => elements.borrow().clone(),
        Some(StackItem::Null) | None => Vec::new(),
        Some(_) => {
            return Err(Error::InvalidArgument(
                "call arguments must be an array".to_string(),
            ))
        }
    };
    engine.call_contract(hash, &method, call_args, flags)
}
