//! Invocation context threading all execution state explicitly.
//!
//! One [`InteropContext`] exists per invocation. It owns the pending
//! storage layer and the gas meter, carries the executing/calling contract
//! identities and granted call flags, and collects notifications and live
//! scan iterators. Nothing here is a process-wide singleton, so multiple
//! independent chain instances can coexist in one process.

use crate::call_flags::CallFlags;
use crate::config::ExecutionConfig;
use crate::contract_state::{AbiMethod, ContractState};
use crate::gas::GasMeter;
use crate::interop;
use crate::interop::iterator::StorageIterator;
use crate::native::registry::ContractRegistry;
use crate::native::NativeRegistry;
use crate::storage::{SharedStore, StorageItem, StorageKey, StoreCache};
use crate::{Error, Result};
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use vela_core::UInt160;
use vela_vm::{ExecutionLimits, InteropInterface, StackItem};

/// A capability scoping storage access to one contract's keyspace.
///
/// Contexts are created per invocation and never persisted. A context can
/// be narrowed to read-only but never widened back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageContext {
    /// The registry id of the contract whose keyspace is addressed.
    pub id: i32,

    /// Whether mutations through this context are rejected.
    pub read_only: bool,
}

impl StorageContext {
    /// Returns a read-only view of this context. Idempotent.
    pub fn as_read_only(&self) -> Self {
        Self {
            id: self.id,
            read_only: true,
        }
    }
}

impl InteropInterface for StorageContext {
    fn interface_type(&self) -> &str {
        "StorageContext"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An event emitted by a contract during execution.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    /// The contract that emitted the event.
    pub contract: UInt160,

    /// The event name.
    pub name: String,

    /// The event payload.
    pub state: Vec<StackItem>,
}

/// Boundary to the bytecode interpreter.
///
/// Deployed (non-native) contracts execute outside this layer; the engine
/// hands resolved calls to the host and receives the pushed result or a
/// fault back.
pub trait ScriptHost {
    /// Executes a resolved method of a deployed contract.
    fn invoke(
        &self,
        engine: &mut InteropContext,
        contract: &ContractState,
        method: &AbiMethod,
        args: Vec<StackItem>,
    ) -> Result<StackItem>;
}

/// Host used when no interpreter is attached. Every call faults.
pub struct NullScriptHost;

impl ScriptHost for NullScriptHost {
    fn invoke(
        &self,
        _engine: &mut InteropContext,
        contract: &ContractState,
        method: &AbiMethod,
        _args: Vec<StackItem>,
    ) -> Result<StackItem> {
        Err(Error::NotFound(format!(
            "no script host attached to execute {}::{}",
            contract.manifest.name, method.name
        )))
    }
}

/// Execution state for a single invocation.
pub struct InteropContext {
    cache: StoreCache,
    gas: GasMeter,
    natives: Rc<NativeRegistry>,
    host: Rc<dyn ScriptHost>,
    config: ExecutionConfig,
    current: UInt160,
    calling: UInt160,
    flags: CallFlags,
    height: u32,
    signers: Vec<UInt160>,
    notifications: Vec<NotificationEvent>,
    iterators: Vec<Rc<RefCell<StorageIterator>>>,
}

impl InteropContext {
    /// Creates a context over a shared backing store.
    pub fn new(store: SharedStore, natives: Rc<NativeRegistry>, config: ExecutionConfig) -> Self {
        Self {
            cache: StoreCache::new(store),
            gas: GasMeter::new(config.gas_limit),
            natives,
            host: Rc::new(NullScriptHost),
            config,
            current: UInt160::zero(),
            calling: UInt160::zero(),
            flags: CallFlags::ALL,
            height: 0,
            signers: Vec::new(),
            notifications: Vec::new(),
            iterators: Vec::new(),
        }
    }

    /// Attaches the bytecode interpreter boundary.
    pub fn set_script_host(&mut self, host: Rc<dyn ScriptHost>) {
        self.host = host;
    }

    /// Sets the currently executing and calling script hashes.
    pub fn set_executing(&mut self, current: UInt160, calling: UInt160) {
        self.current = current;
        self.calling = calling;
    }

    /// Sets the call flags granted to the executing context.
    pub fn set_call_flags(&mut self, flags: CallFlags) {
        self.flags = flags;
    }

    /// Sets the current block height.
    pub fn set_height(&mut self, height: u32) {
        self.height = height;
    }

    /// Adds a transaction signer whose witness is considered verified.
    pub fn add_signer(&mut self, account: UInt160) {
        self.signers.push(account);
    }

    /// Gets the currently executing contract's script hash.
    pub fn current_script_hash(&self) -> UInt160 {
        self.current
    }

    /// Gets the calling contract's script hash.
    pub fn calling_script_hash(&self) -> UInt160 {
        self.calling
    }

    /// Gets the call flags granted to the executing context.
    pub fn call_flags(&self) -> CallFlags {
        self.flags
    }

    /// Gets the current block height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Gets the execution configuration.
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Gets the serialization ceilings in force.
    pub fn limits(&self) -> &ExecutionLimits {
        &self.config.limits
    }

    /// Gets the native contract registry.
    pub fn natives(&self) -> Rc<NativeRegistry> {
        self.natives.clone()
    }

    /// Checks whether an account's witness is considered verified: either
    /// it is the immediate caller or it signed the transaction.
    pub fn check_witness(&self, account: &UInt160) -> bool {
        *account == self.calling || self.signers.contains(account)
    }

    /// Charges the gas meter, failing before any side effect is applied.
    pub fn charge(&mut self, amount: i64) -> Result<()> {
        self.gas.charge(amount)
    }

    /// Gets the gas consumed so far.
    pub fn gas_consumed(&self) -> i64 {
        self.gas.consumed()
    }

    /// Gets the remaining gas balance.
    pub fn gas_remaining(&self) -> i64 {
        self.gas.remaining()
    }

    /// Gets a storage item from the pending view.
    pub fn get_storage(&self, key: &StorageKey) -> Result<Option<StorageItem>> {
        Ok(self.cache.get(&key.to_store_key())?.map(StorageItem::new))
    }

    /// Writes a storage item into the pending view.
    pub fn put_storage(&mut self, key: &StorageKey, item: StorageItem) {
        self.cache.put(key.to_store_key(), item.value);
    }

    /// Deletes a storage item from the pending view.
    pub fn delete_storage(&mut self, key: &StorageKey) {
        self.cache.delete(key.to_store_key());
    }

    /// Returns all visible entries under a contract-local prefix in
    /// ascending key order. Returned keys have the contract id stripped.
    pub fn seek_storage(&self, id: i32, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let store_prefix = StorageKey::store_prefix(id, prefix);
        Ok(self
            .cache
            .seek_prefix(&store_prefix)?
            .into_iter()
            .map(|(key, value)| (key[4..].to_vec(), value))
            .collect())
    }

    /// Emits a notification event.
    pub fn notify(&mut self, contract: UInt160, name: &str, state: Vec<StackItem>) {
        log::debug!("notification {} from {}", name, contract);
        self.notifications.push(NotificationEvent {
            contract,
            name: name.to_string(),
            state,
        });
    }

    /// Gets the notifications emitted so far.
    pub fn notifications(&self) -> &[NotificationEvent] {
        &self.notifications
    }

    /// Registers a live scan iterator for release at finalization.
    pub(crate) fn register_iterator(&mut self, iterator: Rc<RefCell<StorageIterator>>) {
        self.iterators.push(iterator);
    }

    /// Dispatches a syscall by name, checking flags and charging its price.
    pub fn invoke_syscall(&mut self, name: &str, args: Vec<StackItem>) -> Result<StackItem> {
        interop::dispatch(self, name, args)
    }

    /// Calls a contract method, resolving the callee by hash and the
    /// method by name and arity.
    ///
    /// Native callees dispatch through the native framework; deployed
    /// callees are handed to the attached [`ScriptHost`].
    pub fn call_contract(
        &mut self,
        hash: UInt160,
        method: &str,
        args: Vec<StackItem>,
        flags: CallFlags,
    ) -> Result<StackItem> {
        let mut callee_flags = self.flags.intersect(flags);

        if let Some(native) = self.natives.clone().by_hash(&hash) {
            let descriptor = native.methods().resolve(method, args.len())?.clone();
            if descriptor.safe {
                callee_flags = callee_flags.intersect(CallFlags::READ_STATES | CallFlags::ALLOW_CALL);
            }
            if !callee_flags.has_flag(descriptor.required_flags) {
                return Err(Error::PermissionDenied(format!(
                    "method {} of {} requires call flags {:#04x}",
                    method,
                    native.name(),
                    descriptor.required_flags.0
                )));
            }
            self.charge(descriptor.price)?;
            log::debug!("native call {}::{}/{}", native.name(), method, args.len());

            let saved = (self.current, self.calling, self.flags);
            self.calling = self.current;
            self.current = native.hash();
            self.flags = callee_flags;
            let result = native.invoke(self, method, args);
            (self.current, self.calling, self.flags) = saved;
            result
        } else {
            let state = ContractRegistry::contract_state(self, &hash)?
                .ok_or_else(|| Error::NotFound(format!("contract {}", hash)))?;
            let descriptor = match state.manifest.abi.resolve(method, args.len()) {
                Some(m) => m.clone(),
                None if state.manifest.abi.has_method_named(method) => {
                    return Err(Error::ArityMismatch(format!(
                        "method {} of {} has no {}-argument overload",
                        method,
                        state.manifest.name,
                        args.len()
                    )))
                }
                None => {
                    return Err(Error::NotFound(format!(
                        "method {} of {}",
                        method, state.manifest.name
                    )))
                }
            };
            if descriptor.safe {
                callee_flags = callee_flags.intersect(CallFlags::READ_STATES | CallFlags::ALLOW_CALL);
            }
            log::debug!(
                "contract call {}::{}/{} at offset {}",
                state.manifest.name,
                method,
                args.len(),
                descriptor.offset
            );

            let saved = (self.current, self.calling, self.flags);
            self.calling = self.current;
            self.current = hash;
            self.flags = callee_flags;
            let host = self.host.clone();
            let result = host.invoke(self, &state, &descriptor, args);
            (self.current, self.calling, self.flags) = saved;
            result
        }
    }

    /// Finalizes the invocation: releases every live iterator and returns
    /// the pending change set for the enclosing committer.
    ///
    /// On a fault the caller simply drops the context instead, which
    /// discards the pending writes and releases iterators with it.
    pub fn finalize(self) -> StoreCache {
        let InteropContext {
            cache, iterators, ..
        } = self;
        for iterator in iterators {
            iterator.borrow_mut().release();
        }
        cache
    }

    /// Finalizes and commits the pending change set in one atomic step.
    pub fn commit(self) -> Result<()> {
        self.finalize().commit()
    }
}
