//! Fungible token native contracts.
//!
//! Two concrete natives share the same machinery: the governance token
//! (VELA) and the utility token (SPARK). Balance records are pruned when
//! they reach zero, keeping storage proportional to active holders.
//!
//! Business failures of `transfer` (negative amount, missing witness,
//! insufficient funds) return `false` without aborting the invocation;
//! only engine faults abort.

use crate::call_flags::CallFlags;
use crate::context::InteropContext;
use crate::contract_state::{ContractState, NefFile};
use crate::native::registry::{ContractRegistry, TOKEN_STANDARD};
use crate::native::{native_hash, native_manifest, MethodTable, NativeContract, NativeMethod};
use crate::storage::{StorageItem, StorageKey};
use crate::{Error, Result};
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use vela_core::UInt160;
use vela_vm::{BinarySerializer, StackItem};

/// Fixed registry id of the governance token.
pub const VELA_TOKEN_ID: i32 = -2;

/// Fixed registry id of the utility token.
pub const SPARK_TOKEN_ID: i32 = -3;

const PREFIX_TOTAL_SUPPLY: u8 = 11;
const PREFIX_BALANCE: u8 = 20;

const PROPERTY_PRICE: i64 = 1 << 4;
const READ_PRICE: i64 = 1 << 15;
const TRANSFER_PRICE: i64 = 1 << 17;

/// The name of the callback invoked on a contract receiving tokens.
pub const PAYMENT_CALLBACK: &str = "onTokenPayment";

/// A per-account balance record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountState {
    /// The account balance. Never negative.
    pub balance: BigInt,

    /// Height of the block that last touched this record.
    pub last_updated_height: u32,
}

impl AccountState {
    fn to_stack_item(&self) -> StackItem {
        StackItem::from_struct(vec![
            StackItem::Integer(self.balance.clone()),
            StackItem::from_int(self.last_updated_height),
        ])
    }

    fn from_stack_item(item: &StackItem) -> Result<Self> {
        let fields = match item {
            StackItem::Struct(fields) => fields.borrow(),
            _ => {
                return Err(Error::StorageError(
                    "balance record must be a struct".to_string(),
                ))
            }
        };
        if fields.len() != 2 {
            return Err(Error::StorageError(
                "balance record has wrong field count".to_string(),
            ));
        }
        let balance = fields[0]
            .as_int()
            .map_err(|e| Error::StorageError(e.to_string()))?;
        let last_updated_height = fields[1]
            .as_int()
            .map_err(|e| Error::StorageError(e.to_string()))?
            .to_u32()
            .ok_or_else(|| Error::StorageError("record height out of range".to_string()))?;
        Ok(Self {
            balance,
            last_updated_height,
        })
    }
}

/// Shared implementation of a fungible token native contract.
pub struct FungibleToken {
    id: i32,
    hash: UInt160,
    name: &'static str,
    symbol: &'static str,
    decimals: u8,
    touch_on_zero_transfer: bool,
    methods: MethodTable,
}

impl FungibleToken {
    fn new(
        id: i32,
        name: &'static str,
        symbol: &'static str,
        decimals: u8,
        touch_on_zero_transfer: bool,
    ) -> Self {
        let methods = MethodTable::new(vec![
            NativeMethod::safe("symbol", 0, PROPERTY_PRICE),
            NativeMethod::safe("decimals", 0, PROPERTY_PRICE),
            NativeMethod::safe("totalSupply", 0, READ_PRICE),
            NativeMethod::safe("balanceOf", 1, READ_PRICE),
            NativeMethod::unsafe_method(
                "transfer",
                4,
                TRANSFER_PRICE,
                CallFlags::STATES | CallFlags::ALLOW_CALL | CallFlags::ALLOW_NOTIFY,
            ),
        ]);
        Self {
            id,
            hash: native_hash(name),
            name,
            symbol,
            decimals,
            touch_on_zero_transfer,
            methods,
        }
    }

    /// Gets the token's fixed registry id.
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Gets the token's contract hash.
    pub fn hash(&self) -> UInt160 {
        self.hash
    }

    /// Gets the token symbol.
    pub fn symbol(&self) -> &str {
        self.symbol
    }

    /// Gets the number of decimals.
    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Gets the method table.
    pub fn methods(&self) -> &MethodTable {
        &self.methods
    }

    fn balance_key(&self, account: &UInt160) -> StorageKey {
        StorageKey::from_prefix_and_suffix(self.id, PREFIX_BALANCE, account.as_bytes())
    }

    fn supply_key(&self) -> StorageKey {
        StorageKey::from_prefix(self.id, PREFIX_TOTAL_SUPPLY)
    }

    /// Reads an account's balance record, if one exists.
    pub fn account_state(
        &self,
        engine: &InteropContext,
        account: &UInt160,
    ) -> Result<Option<AccountState>> {
        match engine.get_storage(&self.balance_key(account))? {
            Some(item) => {
                let decoded = BinarySerializer::deserialize(&item.value, engine.limits())?;
                AccountState::from_stack_item(&decoded).map(Some)
            }
            None => Ok(None),
        }
    }

    fn write_account(
        &self,
        engine: &mut InteropContext,
        account: &UInt160,
        state: &AccountState,
    ) -> Result<()> {
        let encoded = BinarySerializer::serialize(&state.to_stack_item(), engine.limits())?;
        engine.put_storage(&self.balance_key(account), StorageItem::new(encoded));
        Ok(())
    }

    /// Returns an account's balance; zero for absent records.
    pub fn balance_of(&self, engine: &InteropContext, account: &UInt160) -> Result<BigInt> {
        Ok(self
            .account_state(engine, account)?
            .map(|state| state.balance)
            .unwrap_or_default())
    }

    /// Returns the total token supply.
    pub fn total_supply(&self, engine: &InteropContext) -> Result<BigInt> {
        Ok(engine
            .get_storage(&self.supply_key())?
            .map(|item| BigInt::from_signed_bytes_le(&item.value))
            .unwrap_or_default())
    }

    fn set_total_supply(&self, engine: &mut InteropContext, supply: &BigInt) {
        let bytes = if supply.is_zero() {
            Vec::new()
        } else {
            supply.to_signed_bytes_le()
        };
        engine.put_storage(&self.supply_key(), StorageItem::new(bytes));
    }

    /// Creates tokens on an account.
    ///
    /// Engine-internal: not present in the dispatch table, so contracts
    /// cannot call it directly.
    pub fn mint(
        &self,
        engine: &mut InteropContext,
        account: &UInt160,
        amount: &BigInt,
    ) -> Result<()> {
        if amount.sign() == num_bigint::Sign::Minus {
            return Err(Error::InvalidArgument(
                "mint amount cannot be negative".to_string(),
            ));
        }
        if !amount.is_zero() {
            let mut state = self
                .account_state(engine, account)?
                .unwrap_or(AccountState {
                    balance: BigInt::from(0),
                    last_updated_height: engine.height(),
                });
            state.balance += amount;
            state.last_updated_height = engine.height();
            self.write_account(engine, account, &state)?;

            let supply = self.total_supply(engine)? + amount;
            self.set_total_supply(engine, &supply);
        }
        engine.notify(
            self.hash,
            "Transfer",
            vec![
                StackItem::Null,
                StackItem::from_byte_string(account.as_bytes().to_vec()),
                StackItem::Integer(amount.clone()),
            ],
        );
        Ok(())
    }

    /// Removes tokens from an account.
    ///
    /// Engine-internal like [`Self::mint`]. Burning more than the balance
    /// is an engine fault, not a business failure.
    pub fn burn(
        &self,
        engine: &mut InteropContext,
        account: &UInt160,
        amount: &BigInt,
    ) -> Result<()> {
        if amount.sign() == num_bigint::Sign::Minus {
            return Err(Error::InvalidArgument(
                "burn amount cannot be negative".to_string(),
            ));
        }
        if !amount.is_zero() {
            let mut state = self.account_state(engine, account)?.ok_or_else(|| {
                Error::InvalidArgument("burn amount exceeds balance".to_string())
            })?;
            if state.balance < *amount {
                return Err(Error::InvalidArgument(
                    "burn amount exceeds balance".to_string(),
                ));
            }
            state.balance -= amount;
            if state.balance.is_zero() {
                engine.delete_storage(&self.balance_key(account));
            } else {
                state.last_updated_height = engine.height();
                self.write_account(engine, account, &state)?;
            }

            let supply = self.total_supply(engine)? - amount;
            self.set_total_supply(engine, &supply);
        }
        engine.notify(
            self.hash,
            "Transfer",
            vec![
                StackItem::from_byte_string(account.as_bytes().to_vec()),
                StackItem::Null,
                StackItem::Integer(amount.clone()),
            ],
        );
        Ok(())
    }

    /// Transfers tokens between accounts.
    ///
    /// Returns `false` without mutating anything on a negative amount, a
    /// missing witness for `from`, or insufficient funds. On success the
    /// sender and recipient records move in the same pending change set, a
    /// `Transfer` notification fires, and a recipient contract receives
    /// the payment callback before this returns.
    pub fn transfer(
        &self,
        engine: &mut InteropContext,
        from: &UInt160,
        to: &UInt160,
        amount: &BigInt,
        data: StackItem,
    ) -> Result<bool> {
        if amount.sign() == num_bigint::Sign::Minus {
            return Ok(false);
        }
        if !engine.check_witness(from) {
            log::debug!("transfer from {} lacks witness", from);
            return Ok(false);
        }
        let from_state = self.account_state(engine, from)?;
        let from_balance = from_state
            .as_ref()
            .map(|state| state.balance.clone())
            .unwrap_or_default();
        if from_balance < *amount {
            return Ok(false);
        }

        // All checks passed; no mutation happened before this point.
        if amount.is_zero() {
            if self.touch_on_zero_transfer {
                if let Some(mut state) = from_state {
                    state.last_updated_height = engine.height();
                    self.write_account(engine, from, &state)?;
                }
            }
        } else if from == to {
            if let Some(mut state) = from_state {
                state.last_updated_height = engine.height();
                self.write_account(engine, from, &state)?;
            }
        } else {
            let mut sender = match from_state {
                Some(state) => state,
                None => return Ok(false),
            };
            sender.balance -= amount;
            if sender.balance.is_zero() {
                engine.delete_storage(&self.balance_key(from));
            } else {
                sender.last_updated_height = engine.height();
                self.write_account(engine, from, &sender)?;
            }

            let mut recipient = self
                .account_state(engine, to)?
                .unwrap_or(AccountState {
                    balance: BigInt::from(0),
                    last_updated_height: engine.height(),
                });
            recipient.balance += amount;
            recipient.last_updated_height = engine.height();
            self.write_account(engine, to, &recipient)?;
        }

        engine.notify(
            self.hash,
            "Transfer",
            vec![
                StackItem::from_byte_string(from.as_bytes().to_vec()),
                StackItem::from_byte_string(to.as_bytes().to_vec()),
                StackItem::Integer(amount.clone()),
            ],
        );
        self.post_transfer(engine, from, to, amount, data)?;
        Ok(true)
    }

    /// Invokes the payment callback on a recipient contract.
    ///
    /// The callback may itself transfer, so this recursion is bounded by
    /// the gas meter alone, not an explicit depth cap.
    fn post_transfer(
        &self,
        engine: &mut InteropContext,
        from: &UInt160,
        to: &UInt160,
        amount: &BigInt,
        data: StackItem,
    ) -> Result<()> {
        if ContractRegistry::contract_state(engine, to)?.is_none() {
            return Ok(());
        }
        engine
            .call_contract(
                *to,
                PAYMENT_CALLBACK,
                vec![
                    StackItem::from_byte_string(from.as_bytes().to_vec()),
                    StackItem::Integer(amount.clone()),
                    data,
                ],
                CallFlags::ALL,
            )
            .map(|_| ())
    }

    fn invoke_handler(
        &self,
        engine: &mut InteropContext,
        method: &str,
        args: Vec<StackItem>,
    ) -> Result<StackItem> {
        match (method, args.len()) {
            ("symbol", 0) => Ok(StackItem::from_byte_string(self.symbol.as_bytes().to_vec())),
            ("decimals", 0) => Ok(StackItem::from_int(self.decimals)),
            ("totalSupply", 0) => Ok(StackItem::Integer(self.total_supply(engine)?)),
            ("balanceOf", 1) => {
                let account = account_arg(&args, 0)?;
                Ok(StackItem::Integer(self.balance_of(engine, &account)?))
            }
            ("transfer", 4) => {
                let from = account_arg(&args, 0)?;
                let to = account_arg(&args, 1)?;
                let amount = args[2]
                    .as_int()
                    .map_err(|e| Error::InvalidArgument(e.to_string()))?;
                let data = args[3].clone();
                let transferred = self.transfer(engine, &from, &to, &amount, data)?;
                Ok(StackItem::from_bool(transferred))
            }
            _ => Err(Error::NotFound(format!("method {}/{}", method, args.len()))),
        }
    }

    fn register_genesis_state(&self, engine: &mut InteropContext) -> Result<()> {
        let state = ContractState {
            id: self.id,
            update_counter: 0,
            hash: self.hash,
            nef: NefFile::new("native", "", Vec::new()),
            manifest: native_manifest(self.name, &[TOKEN_STANDARD], &self.methods),
        };
        ContractRegistry::register_native(engine, &state)
    }
}

fn account_arg(args: &[StackItem], index: usize) -> Result<UInt160> {
    let bytes = args
        .get(index)
        .ok_or_else(|| Error::InvalidArgument(format!("missing argument {}", index)))?
        .as_bytes()
        .map_err(|e| Error::InvalidArgument(e.to_string()))?;
    UInt160::from_bytes(&bytes).map_err(|e| Error::InvalidArgument(e.to_string()))
}

/// The governance token native contract.
///
/// Zero-amount self-transfers still bump the record's height; holder
/// activity feeds reward accounting.
pub struct VelaToken {
    token: FungibleToken,
}

impl VelaToken {
    /// Creates the governance token native.
    pub fn new() -> Self {
        Self {
            token: FungibleToken::new(VELA_TOKEN_ID, "VelaToken", "VELA", 0, true),
        }
    }
}

impl Default for VelaToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for VelaToken {
    type Target = FungibleToken;

    fn deref(&self) -> &FungibleToken {
        &self.token
    }
}

impl NativeContract for VelaToken {
    fn id(&self) -> i32 {
        self.token.id
    }

    fn hash(&self) -> UInt160 {
        self.token.hash
    }

    fn name(&self) -> &str {
        self.token.name
    }

    fn methods(&self) -> &MethodTable {
        &self.token.methods
    }

    fn invoke(
        &self,
        engine: &mut InteropContext,
        method: &str,
        args: Vec<StackItem>,
    ) -> Result<StackItem> {
        self.token.invoke_handler(engine, method, args)
    }

    fn initialize(&self, engine: &mut InteropContext) -> Result<()> {
        self.token.register_genesis_state(engine)
    }
}

/// The utility token native contract.
///
/// Zero-amount transfers are pure no-ops; the balance record is not
/// touched.
pub struct SparkToken {
    token: FungibleToken,
}

impl SparkToken {
    /// Creates the utility token native.
    pub fn new() -> Self {
        Self {
            token: FungibleToken::new(SPARK_TOKEN_ID, "SparkToken", "SPARK", 8, false),
        }
    }
}

impl Default for SparkToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for SparkToken {
    type Target = FungibleToken;

    fn deref(&self) -> &FungibleToken {
        &self.token
    }
}

impl NativeContract for SparkToken {
    fn id(&self) -> i32 {
        self.token.id
    }

    fn hash(&self) -> UInt160 {
        self.token.hash
    }

    fn name(&self) -> &str {
        self.token.name
    }

    fn methods(&self) -> &MethodTable {
        &self.token.methods
    }

    fn invoke(
        &self,
        engine: &mut InteropContext,
        method: &str,
        args: Vec<StackItem>,
    ) -> Result<StackItem> {
        self.token.invoke_handler(engine, method, args)
    }

    fn initialize(&self, engine: &mut InteropContext) -> Result<()> {
        self.token.register_genesis_state(engine)
    }
}
