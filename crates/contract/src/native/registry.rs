//! The contract registry native contract.
//!
//! The registry allocates identities for all contracts, native and
//! deployed, and tracks the deploy/update/destroy lifecycle. It is an
//! ordinary tenant of the shared keyspace: its records live under its own
//! fixed negative id.

use crate::call_flags::CallFlags;
use crate::context::InteropContext;
use crate::contract_state::{ContractManifest, ContractState, NefFile};
use crate::interop::{bytes_arg, hash_arg, int_arg};
use crate::native::{
    native_hash, native_manifest, MethodTable, NativeContract, NativeMethod,
};
use crate::storage::{StorageItem, StorageKey};
use crate::{Error, Result};
use num_traits::ToPrimitive;
use vela_core::{hash160, UInt160};
use vela_vm::{BinarySerializer, StackItem};

/// The registry's own fixed contract id.
pub const REGISTRY_ID: i32 = -1;

/// The token standard recorded in the derived token index.
pub const TOKEN_STANDARD: &str = "VTS-1";

const PREFIX_CONTRACT: u8 = 8;
const PREFIX_CONTRACT_HASH: u8 = 12;
const PREFIX_NEXT_ID: u8 = 15;
const PREFIX_TOKEN_INDEX: u8 = 16;

const GET_PRICE: i64 = 1 << 15;
const LIFECYCLE_PRICE: i64 = 1 << 15;

/// The contract registry native contract.
pub struct ContractRegistry {
    hash: UInt160,
    methods: MethodTable,
}

impl ContractRegistry {
    /// Creates the registry native.
    pub fn new() -> Self {
        let methods = MethodTable::new(vec![
            NativeMethod::safe("getContract", 1, GET_PRICE),
            NativeMethod::safe("getContractById", 1, GET_PRICE),
            NativeMethod::unsafe_method(
                "deploy",
                2,
                LIFECYCLE_PRICE,
                CallFlags::STATES | CallFlags::ALLOW_NOTIFY,
            ),
            NativeMethod::unsafe_method(
                "deploy",
                3,
                LIFECYCLE_PRICE,
                CallFlags::STATES | CallFlags::ALLOW_NOTIFY,
            ),
            NativeMethod::unsafe_method(
                "update",
                3,
                LIFECYCLE_PRICE,
                CallFlags::STATES | CallFlags::ALLOW_NOTIFY,
            ),
            NativeMethod::unsafe_method(
                "destroy",
                1,
                LIFECYCLE_PRICE,
                CallFlags::STATES | CallFlags::ALLOW_NOTIFY,
            ),
        ]);
        Self {
            hash: native_hash("ContractRegistry"),
            methods,
        }
    }

    /// Computes the deterministic hash of a deployed contract.
    pub fn compute_contract_hash(deployer: &UInt160, checksum: u32, name: &str) -> UInt160 {
        let mut data = Vec::with_capacity(1 + 20 + 4 + name.len());
        data.push(0xFF);
        data.extend_from_slice(deployer.as_bytes());
        data.extend_from_slice(&checksum.to_le_bytes());
        data.extend_from_slice(name.as_bytes());
        hash160(&data)
    }

    fn contract_key(hash: &UInt160) -> StorageKey {
        StorageKey::from_prefix_and_suffix(REGISTRY_ID, PREFIX_CONTRACT, hash.as_bytes())
    }

    fn id_key(id: i32) -> StorageKey {
        StorageKey::from_prefix_and_suffix(REGISTRY_ID, PREFIX_CONTRACT_HASH, &StorageKey::encode_id(id))
    }

    /// Reads a contract's registry record by hash.
    pub fn contract_state(
        engine: &InteropContext,
        hash: &UInt160,
    ) -> Result<Option<ContractState>> {
        match engine.get_storage(&Self::contract_key(hash))? {
            Some(item) => {
                let decoded = BinarySerializer::deserialize(&item.value, engine.limits())?;
                ContractState::from_stack_item(&decoded).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Reads a contract's registry record by id.
    pub fn contract_state_by_id(engine: &InteropContext, id: i32) -> Result<Option<ContractState>> {
        match engine.get_storage(&Self::id_key(id))? {
            Some(item) => {
                let hash = UInt160::from_bytes(&item.value)
                    .map_err(|e| Error::StorageError(e.to_string()))?;
                Self::contract_state(engine, &hash)
            }
            None => Ok(None),
        }
    }

    fn put_contract(engine: &mut InteropContext, state: &ContractState) -> Result<()> {
        let encoded = BinarySerializer::serialize(&state.to_stack_item()?, engine.limits())?;
        engine.put_storage(&Self::contract_key(&state.hash), StorageItem::new(encoded));
        engine.put_storage(
            &Self::id_key(state.id),
            StorageItem::new(state.hash.as_bytes().to_vec()),
        );
        Ok(())
    }

    /// Allocates the next positive contract id from the persisted counter.
    fn next_id(engine: &mut InteropContext) -> Result<i32> {
        let key = StorageKey::from_prefix(REGISTRY_ID, PREFIX_NEXT_ID);
        let current = match engine.get_storage(&key)? {
            Some(item) => {
                let bytes: [u8; 4] = item.value.as_slice().try_into().map_err(|_| {
                    Error::StorageError("corrupt contract id counter".to_string())
                })?;
                i32::from_le_bytes(bytes)
            }
            None => 1,
        };
        let next = current
            .checked_add(1)
            .ok_or_else(|| Error::StorageError("contract id counter overflow".to_string()))?;
        engine.put_storage(&key, StorageItem::new(next.to_le_bytes().to_vec()));
        Ok(current)
    }

    /// Registers a native contract's state at genesis, bypassing deploy
    /// validation and id allocation.
    pub fn register_native(engine: &mut InteropContext, state: &ContractState) -> Result<()> {
        Self::put_contract(engine, state)
    }

    /// Deploys a new contract.
    pub fn deploy(
        engine: &mut InteropContext,
        deployer: &UInt160,
        nef: NefFile,
        manifest: ContractManifest,
    ) -> Result<ContractState> {
        nef.validate()?;
        manifest.validate()?;

        let hash = Self::compute_contract_hash(deployer, nef.checksum, &manifest.name);
        if Self::contract_state(engine, &hash)?.is_some() {
            return Err(Error::AlreadyExists(format!("contract {}", hash)));
        }

        let id = Self::next_id(engine)?;
        let state = ContractState {
            id,
            update_counter: 0,
            hash,
            nef,
            manifest,
        };
        Self::put_contract(engine, &state)?;
        log::debug!("deployed contract {} as id {}", hash, id);

        let registry_hash = native_hash("ContractRegistry");
        engine.notify(
            registry_hash,
            "Deploy",
            vec![StackItem::from_byte_string(hash.as_bytes().to_vec())],
        );
        Ok(state)
    }

    /// Updates a deployed contract's code and manifest, preserving its id
    /// and incrementing the update counter exactly once.
    pub fn update(
        engine: &mut InteropContext,
        hash: &UInt160,
        nef: NefFile,
        manifest: ContractManifest,
    ) -> Result<ContractState> {
        let mut state = Self::contract_state(engine, hash)?
            .ok_or_else(|| Error::NotFound(format!("contract {}", hash)))?;
        nef.validate()?;
        manifest.validate()?;

        state.update_counter = state.update_counter.checked_add(1).ok_or_else(|| {
            Error::StorageError(format!("update counter overflow for {}", hash))
        })?;
        state.nef = nef;
        state.manifest = manifest;
        Self::put_contract(engine, &state)?;
        log::debug!(
            "updated contract {} (update counter {})",
            hash,
            state.update_counter
        );

        let registry_hash = native_hash("ContractRegistry");
        engine.notify(
            registry_hash,
            "Update",
            vec![StackItem::from_byte_string(hash.as_bytes().to_vec())],
        );
        Ok(state)
    }

    /// Destroys a contract: removes its registry records and clears every
    /// storage key under its id. Terminal; the id is never reused.
    pub fn destroy(engine: &mut InteropContext, hash: &UInt160) -> Result<()> {
        let state = Self::contract_state(engine, hash)?
            .ok_or_else(|| Error::NotFound(format!("contract {}", hash)))?;

        engine.delete_storage(&Self::contract_key(hash));
        engine.delete_storage(&Self::id_key(state.id));
        for (key, _) in engine.seek_storage(state.id, &[])? {
            engine.delete_storage(&StorageKey::new(state.id, key));
        }
        log::debug!("destroyed contract {} (id {})", hash, state.id);

        let registry_hash = native_hash("ContractRegistry");
        engine.notify(
            registry_hash,
            "Destroy",
            vec![StackItem::from_byte_string(hash.as_bytes().to_vec())],
        );
        Ok(())
    }

    /// Reads the derived index of contracts implementing the token
    /// standard.
    pub fn token_contracts(engine: &InteropContext) -> Result<Vec<UInt160>> {
        let key = StorageKey::from_prefix(REGISTRY_ID, PREFIX_TOKEN_INDEX);
        let Some(item) = engine.get_storage(&key)? else {
            return Ok(Vec::new());
        };
        let decoded = BinarySerializer::deserialize(&item.value, engine.limits())?;
        let elements = match &decoded {
            StackItem::Array(elements) => elements.borrow(),
            _ => return Err(Error::StorageError("corrupt token index".to_string())),
        };
        elements
            .iter()
            .map(|element| {
                let bytes = element
                    .as_bytes()
                    .map_err(|e| Error::StorageError(e.to_string()))?;
                UInt160::from_bytes(&bytes).map_err(|e| Error::StorageError(e.to_string()))
            })
            .collect()
    }
}

impl Default for ContractRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeContract for ContractRegistry {
    fn id(&self) -> i32 {
        REGISTRY_ID
    }

    fn hash(&self) -> UInt160 {
        self.hash
    }

    fn name(&self) -> &str {
        "ContractRegistry"
    }

    fn methods(&self) -> &MethodTable {
        &self.methods
    }

    fn invoke(
        &self,
        engine: &mut InteropContext,
        method: &str,
        args: Vec<StackItem>,
    ) -> Result<StackItem> {
        match (method, args.len()) {
            ("getContract", 1) => {
                let hash = hash_arg(&args, 0)?;
                match Self::contract_state(engine, &hash)? {
                    Some(state) => state.to_stack_item(),
                    None => Ok(StackItem::Null),
                }
            }
            ("getContractById", 1) => {
                let id = int_arg(&args, 0)?
                    .to_i32()
                    .ok_or_else(|| Error::InvalidArgument("contract id out of range".to_string()))?;
                match Self::contract_state_by_id(engine, id)? {
                    Some(state) => state.to_stack_item(),
                    None => Ok(StackItem::Null),
                }
            }
            ("deploy", 2) | ("deploy", 3) => {
                let nef = NefFile::from_stack_item(
                    args.first()
                        .ok_or_else(|| Error::InvalidArgument("missing nef argument".to_string()))?,
                )?;
                let manifest_json = String::from_utf8(bytes_arg(&args, 1)?)
                    .map_err(|e| Error::InvalidManifest(e.to_string()))?;
                let manifest = ContractManifest::from_json(&manifest_json)?;
                let deployer = engine.calling_script_hash();
                let state = Self::deploy(engine, &deployer, nef, manifest)?;
                state.to_stack_item()
            }
            ("update", 3) => {
                let hash = hash_arg(&args, 0)?;
                let nef = NefFile::from_stack_item(&args[1])?;
                let manifest_json = String::from_utf8(bytes_arg(&args, 2)?)
                    .map_err(|e| Error::InvalidManifest(e.to_string()))?;
                let manifest = ContractManifest::from_json(&manifest_json)?;
                let state = Self::update(engine, &hash, nef, manifest)?;
                state.to_stack_item()
            }
            ("destroy", 1) => {
                let hash = hash_arg(&args, 0)?;
                Self::destroy(engine, &hash)?;
                Ok(StackItem::Null)
            }
            _ => Err(Error::NotFound(format!("method {}/{}", method, args.len()))),
        }
    }

    fn initialize(&self, engine: &mut InteropContext) -> Result<()> {
        let state = ContractState {
            id: REGISTRY_ID,
            update_counter: 0,
            hash: self.hash,
            nef: NefFile::new("native", "", Vec::new()),
            manifest: native_manifest("ContractRegistry", &[], &self.methods),
        };
        Self::register_native(engine, &state)
    }

    fn post_persist(&self, engine: &mut InteropContext) -> Result<()> {
        // Rebuild the token index from the full registry scan; derived
        // purely from persisted records, so re-running is a no-op.
        let mut hashes = Vec::new();
        for (_, value) in engine.seek_storage(REGISTRY_ID, &[PREFIX_CONTRACT])? {
            let decoded = BinarySerializer::deserialize(&value, engine.limits())?;
            let state = ContractState::from_stack_item(&decoded)?;
            if state
                .manifest
                .supported_standards
                .iter()
                .any(|s| s == TOKEN_STANDARD)
            {
                hashes.push(state.hash);
            }
        }
        hashes.sort();

        let index = StackItem::from_array(
            hashes
                .iter()
                .map(|h| StackItem::from_byte_string(h.as_bytes().to_vec()))
                .collect::<Vec<_>>(),
        );
        let encoded = BinarySerializer::serialize(&index, engine.limits())?;
        engine.put_storage(
            &StorageKey::from_prefix(REGISTRY_ID, PREFIX_TOKEN_INDEX),
            StorageItem::new(encoded),
        );
        log::debug!("token index rebuilt with {} contracts", hashes.len());
        Ok(())
    }
}
