//! Native contract framework.
//!
//! Native contracts are privileged, non-bytecode contracts implemented
//! directly by the engine and addressed like any other contract. Each one
//! carries a fixed negative registry id assigned at genesis (never reused)
//! and a method table built once at construction, keyed by method name and
//! arity so that overload resolution is a constant-time lookup.

pub mod registry;
pub mod tokens;

pub use registry::ContractRegistry;
pub use tokens::{FungibleToken, SparkToken, VelaToken};

use crate::call_flags::CallFlags;
use crate::context::InteropContext;
use crate::contract_state::{AbiMethod, ContractManifest};
use crate::{Error, Result};
use std::collections::HashMap;
use std::rc::Rc;
use vela_core::{hash160, UInt160};
use vela_vm::StackItem;

/// Represents a method in a native contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeMethod {
    /// The name of the method.
    pub name: &'static str,

    /// The number of arguments the method takes.
    pub arity: usize,

    /// The fixed gas price of the method.
    pub price: i64,

    /// The call flags required to invoke this method.
    pub required_flags: CallFlags,

    /// Whether the method is safe (read-only).
    pub safe: bool,
}

impl NativeMethod {
    /// Creates a new safe (read-only) method.
    pub fn safe(name: &'static str, arity: usize, price: i64) -> Self {
        Self {
            name,
            arity,
            price,
            required_flags: CallFlags::READ_STATES,
            safe: true,
        }
    }

    /// Creates a new state-changing method.
    pub fn unsafe_method(
        name: &'static str,
        arity: usize,
        price: i64,
        required_flags: CallFlags,
    ) -> Self {
        Self {
            name,
            arity,
            price,
            required_flags,
            safe: false,
        }
    }
}

/// Method table of a native contract, resolving by name and arity.
///
/// Declaration order is preserved so that derived artifacts (manifests)
/// are byte-identical across nodes.
pub struct MethodTable {
    methods: Vec<NativeMethod>,
    by_name: HashMap<&'static str, Vec<usize>>,
}

impl MethodTable {
    /// Builds a table from the declared methods.
    pub fn new(methods: Vec<NativeMethod>) -> Self {
        let mut by_name: HashMap<&'static str, Vec<usize>> = HashMap::new();
        for (index, method) in methods.iter().enumerate() {
            by_name.entry(method.name).or_default().push(index);
        }
        Self { methods, by_name }
    }

    /// Resolves a method by exact name and arity.
    ///
    /// A name that exists only with other arities is an arity mismatch; a
    /// name that does not exist at all is not found.
    pub fn resolve(&self, name: &str, arity: usize) -> Result<&NativeMethod> {
        match self.by_name.get(name) {
            None => Err(Error::NotFound(format!("method {}", name))),
            Some(overloads) => overloads
                .iter()
                .map(|index| &self.methods[*index])
                .find(|m| m.arity == arity)
                .ok_or_else(|| {
                    Error::ArityMismatch(format!(
                        "method {} has no {}-argument overload",
                        name, arity
                    ))
                }),
        }
    }

    /// Returns true if any overload carries the given name.
    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Iterates methods in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &NativeMethod> {
        self.methods.iter()
    }
}

/// Trait for native contract implementations.
pub trait NativeContract {
    /// Gets the fixed registry id of the native contract.
    fn id(&self) -> i32;

    /// Gets the hash of the native contract.
    fn hash(&self) -> UInt160;

    /// Gets the name of the native contract.
    fn name(&self) -> &str;

    /// Gets the method table of the native contract.
    fn methods(&self) -> &MethodTable;

    /// Invokes a resolved method on the native contract.
    fn invoke(
        &self,
        engine: &mut InteropContext,
        method: &str,
        args: Vec<StackItem>,
    ) -> Result<StackItem>;

    /// Called once at genesis to set up the contract's state.
    fn initialize(&self, _engine: &mut InteropContext) -> Result<()> {
        Ok(())
    }

    /// Called once per block after all transactions have been processed.
    ///
    /// Must be idempotent and must only derive from committed state.
    fn post_persist(&self, _engine: &mut InteropContext) -> Result<()> {
        Ok(())
    }
}

/// Computes the deterministic hash of a native contract from its name.
pub fn native_hash(name: &str) -> UInt160 {
    hash160(format!("vela.native.{}", name).as_bytes())
}

/// Builds the manifest a native contract registers at genesis.
pub(crate) fn native_manifest(
    name: &str,
    standards: &[&str],
    methods: &MethodTable,
) -> ContractManifest {
    let abi_methods = methods
        .iter()
        .map(|m| AbiMethod {
            name: m.name.to_string(),
            parameters: m.arity,
            offset: 0,
            safe: m.safe,
        })
        .collect();
    let mut manifest = ContractManifest::new(name, abi_methods);
    manifest.supported_standards = standards.iter().map(|s| s.to_string()).collect();
    manifest
}

/// The set of native contracts of one chain instance.
///
/// Threaded explicitly through every invocation context; there is no
/// process-wide registry, so independent chains can coexist in tests.
pub struct NativeRegistry {
    management: Rc<ContractRegistry>,
    vela: Rc<VelaToken>,
    spark: Rc<SparkToken>,
    all: Vec<Rc<dyn NativeContract>>,
}

impl NativeRegistry {
    /// Creates the native contract set.
    pub fn new() -> Self {
        let management = Rc::new(ContractRegistry::new());
        let vela = Rc::new(VelaToken::new());
        let spark = Rc::new(SparkToken::new());
        let all: Vec<Rc<dyn NativeContract>> = vec![
            management.clone() as Rc<dyn NativeContract>,
            vela.clone() as Rc<dyn NativeContract>,
            spark.clone() as Rc<dyn NativeContract>,
        ];
        Self {
            management,
            vela,
            spark,
            all,
        }
    }

    /// Looks up a native contract by hash.
    pub fn by_hash(&self, hash: &UInt160) -> Option<Rc<dyn NativeContract>> {
        self.all.iter().find(|c| c.hash() == *hash).cloned()
    }

    /// Looks up a native contract by registry id.
    pub fn by_id(&self, id: i32) -> Option<Rc<dyn NativeContract>> {
        self.all.iter().find(|c| c.id() == id).cloned()
    }

    /// Returns all native contracts.
    pub fn contracts(&self) -> &[Rc<dyn NativeContract>] {
        &self.all
    }

    /// Gets the contract registry native.
    pub fn management(&self) -> &ContractRegistry {
        &self.management
    }

    /// Gets the governance token native.
    pub fn vela(&self) -> &VelaToken {
        &self.vela
    }

    /// Gets the utility token native.
    pub fn spark(&self) -> &SparkToken {
        &self.spark
    }

    /// Runs genesis initialization for every native contract.
    pub fn genesis(&self, engine: &mut InteropContext) -> Result<()> {
        for contract in &self.all {
            log::debug!("initializing native contract {}", contract.name());
            contract.initialize(engine)?;
        }
        Ok(())
    }

    /// Runs the per-block post-persist pass for every native contract.
    pub fn post_persist(&self, engine: &mut InteropContext) -> Result<()> {
        for contract in &self.all {
            contract.post_persist(engine)?;
        }
        Ok(())
    }
}

impl Default for NativeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_table_resolution() {
        let table = MethodTable::new(vec![
            NativeMethod::safe("get", 1, 100),
            NativeMethod::unsafe_method("set", 2, 1000, CallFlags::WRITE_STATES),
            NativeMethod::safe("get", 2, 100),
        ]);

        assert_eq!(table.resolve("get", 1).unwrap().arity, 1);
        assert_eq!(table.resolve("get", 2).unwrap().arity, 2);
        assert!(matches!(table.resolve("get", 3), Err(Error::ArityMismatch(_))));
        assert!(matches!(table.resolve("missing", 0), Err(Error::NotFound(_))));
        assert!(table.contains_name("set"));
        assert!(!table.contains_name("missing"));
    }

    #[test]
    fn test_method_table_preserves_declaration_order() {
        let table = MethodTable::new(vec![
            NativeMethod::safe("b", 0, 0),
            NativeMethod::safe("a", 0, 0),
        ]);
        let names: Vec<&str> = table.iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_native_ids_are_fixed_and_distinct() {
        let registry = NativeRegistry::new();
        let ids: Vec<i32> = registry.contracts().iter().map(|c| c.id()).collect();
        assert!(ids.iter().all(|id| *id < 0));
        let mut unique = ids.clone();
        unique.dedup();
        assert_eq!(ids.len(), unique.len());

        for contract in registry.contracts() {
            assert_eq!(
                registry.by_hash(&contract.hash()).unwrap().id(),
                contract.id()
            );
            assert_eq!(
                registry.by_id(contract.id()).unwrap().name(),
                contract.name()
            );
        }
    }
}
