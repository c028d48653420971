//! Runtime interop services.

use crate::call_flags::CallFlags;
use crate::context::InteropContext;
use crate::interop::{hash_arg, string_arg, InteropDescriptor};
use crate::{Error, Result};
use vela_vm::StackItem;

const NOTIFY_PRICE: i64 = 1 << 15;
const CHECK_WITNESS_PRICE: i64 = 1 << 10;
const GAS_LEFT_PRICE: i64 = 1 << 4;

/// Returns the runtime syscall descriptors.
pub(crate) fn descriptors() -> Vec<InteropDescriptor> {
    vec![
        InteropDescriptor {
            name: "System.Runtime.Notify",
            price: NOTIFY_PRICE,
            required_flags: CallFlags::ALLOW_NOTIFY,
            handler: notify,
        },
        InteropDescriptor {
            name: "System.Runtime.CheckWitness",
            price: CHECK_WITNESS_PRICE,
            required_flags: CallFlags::NONE,
            handler: check_witness,
        },
        InteropDescriptor {
            name: "System.Runtime.GasLeft",
            price: GAS_LEFT_PRICE,
            required_flags: CallFlags::NONE,
            handler: gas_left,
        },
    ]
}

fn notify(engine: &mut InteropContext, args: Vec<StackItem>) -> Result<StackItem> {
    let name = string_arg(&args, 0)?;
    let state = match args.get(1) {
        Some(StackItem::Array(elements)) => elements.borrow().clone(),
        Some(other) => vec![other.clone()],
        None => {
            return Err(Error::InvalidArgument(
                "notify requires a state argument".to_string(),
            ))
        }
    };
    let contract = engine.current_script_hash();
    engine.notify(contract, &name, state);
    Ok(StackItem::Null)
}

fn check_witness(engine: &mut InteropContext, args: Vec<StackItem>) -> Result<StackItem> {
    let account = hash_arg(&args, 0)?;
    Ok(StackItem::from_bool(engine.check_witness(&account)))
}

fn gas_left(engine: &mut InteropContext, _args: Vec<StackItem>) -> Result<StackItem> {
    Ok(StackItem::from_int(engine.gas_remaining()))
}
