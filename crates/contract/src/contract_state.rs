//! Contract state, code container and manifest types.

use crate::{Error, Result};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use vela_core::UInt160;
use vela_vm::StackItem;

/// The code container deployed with a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NefFile {
    /// Name and version of the compiler that produced the script.
    pub compiler: String,

    /// Source location reference, may be empty.
    pub source: String,

    /// The contract bytecode.
    pub script: Vec<u8>,

    /// Checksum over the compiler, source and script fields.
    pub checksum: u32,
}

impl NefFile {
    /// Creates a NEF with a freshly computed checksum.
    pub fn new(compiler: &str, source: &str, script: Vec<u8>) -> Self {
        let mut nef = Self {
            compiler: compiler.to_string(),
            source: source.to_string(),
            script,
            checksum: 0,
        };
        nef.checksum = nef.compute_checksum();
        nef
    }

    /// Computes the checksum over the compiler, source and script fields.
    pub fn compute_checksum(&self) -> u32 {
        let mut hasher = Sha256::new();
        hasher.update(self.compiler.as_bytes());
        hasher.update(self.source.as_bytes());
        hasher.update(&self.script);
        let digest = hasher.finalize();
        u32::from_le_bytes(digest[0..4].try_into().expect("digest is at least 4 bytes"))
    }

    /// Validates the container for deployment.
    pub fn validate(&self) -> Result<()> {
        if self.script.is_empty() {
            return Err(Error::InvalidNef("empty script".to_string()));
        }
        if self.checksum != self.compute_checksum() {
            return Err(Error::InvalidNef("checksum mismatch".to_string()));
        }
        Ok(())
    }

    /// Converts the container into its stack item form.
    pub fn to_stack_item(&self) -> StackItem {
        StackItem::from_struct(vec![
            StackItem::from_byte_string(self.compiler.as_bytes().to_vec()),
            StackItem::from_byte_string(self.source.as_bytes().to_vec()),
            StackItem::from_byte_string(self.script.clone()),
            StackItem::from_int(self.checksum),
        ])
    }

    /// Restores a container from its stack item form.
    pub fn from_stack_item(item: &StackItem) -> Result<Self> {
        let fields = match item {
            StackItem::Struct(fields) => fields.borrow(),
            _ => return Err(Error::InvalidNef("nef must be a struct".to_string())),
        };
        if fields.len() != 4 {
            return Err(Error::InvalidNef("nef has wrong field count".to_string()));
        }
        Ok(Self {
            compiler: string_field(&fields[0], "compiler")?,
            source: string_field(&fields[1], "source")?,
            script: bytes_field(&fields[2], "script")?,
            checksum: int_field(&fields[3], "checksum")?
                .to_u32()
                .ok_or_else(|| Error::InvalidNef("checksum out of range".to_string()))?,
        })
    }
}

/// A method exposed through a contract's ABI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiMethod {
    /// The method name.
    pub name: String,

    /// The number of parameters the method takes.
    pub parameters: usize,

    /// Entry point offset of the method within the script.
    pub offset: u32,

    /// Whether the method is safe (read-only).
    pub safe: bool,
}

/// The ABI section of a contract manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContractAbi {
    /// The methods exposed by the contract.
    pub methods: Vec<AbiMethod>,
}

impl ContractAbi {
    /// Resolves a method by exact name and arity.
    ///
    /// Methods may share a name with different arities; resolution requires
    /// both to match.
    pub fn resolve(&self, name: &str, arity: usize) -> Option<&AbiMethod> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.parameters == arity)
    }

    /// Returns true if any overload carries the given name.
    pub fn has_method_named(&self, name: &str) -> bool {
        self.methods.iter().any(|m| m.name == name)
    }
}

/// A contract manifest: name, declared standards and ABI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractManifest {
    /// The contract name, part of its deterministic hash.
    pub name: String,

    /// Token or interface standards the contract declares support for.
    #[serde(default)]
    pub supported_standards: Vec<String>,

    /// The contract ABI.
    pub abi: ContractAbi,
}

impl ContractManifest {
    /// Creates a manifest with the given name and methods.
    pub fn new(name: &str, methods: Vec<AbiMethod>) -> Self {
        Self {
            name: name.to_string(),
            supported_standards: Vec::new(),
            abi: ContractAbi { methods },
        }
    }

    /// Parses a manifest from its JSON encoding.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidManifest(e.to_string()))
    }

    /// Serializes the manifest to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidManifest(e.to_string()))
    }

    /// Validates the manifest for deployment.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InvalidManifest("empty contract name".to_string()));
        }
        if self.abi.methods.is_empty() {
            return Err(Error::InvalidManifest(
                "contract must expose at least one method".to_string(),
            ));
        }
        Ok(())
    }
}

/// The registry record of a deployed contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractState {
    /// The registry id. Positive for deployed contracts, negative for
    /// native contracts.
    pub id: i32,

    /// Number of successful updates applied to this contract.
    pub update_counter: u16,

    /// The deterministic contract hash.
    pub hash: UInt160,

    /// The deployed code container.
    pub nef: NefFile,

    /// The contract manifest.
    pub manifest: ContractManifest,
}

impl ContractState {
    /// Converts the state into its stack item form for persistence.
    pub fn to_stack_item(&self) -> Result<StackItem> {
        Ok(StackItem::from_struct(vec![
            StackItem::from_int(self.id),
            StackItem::from_int(self.update_counter),
            StackItem::from_byte_string(self.hash.as_bytes().to_vec()),
            self.nef.to_stack_item(),
            StackItem::from_byte_string(self.manifest.to_json()?.into_bytes()),
        ]))
    }

    /// Restores a state from its stack item form.
    pub fn from_stack_item(item: &StackItem) -> Result<Self> {
        let fields = match item {
            StackItem::Struct(fields) => fields.borrow(),
            _ => {
                return Err(Error::InvalidArgument(
                    "contract state must be a struct".to_string(),
                ))
            }
        };
        if fields.len() != 5 {
            return Err(Error::InvalidArgument(format!(
                "contract state has {} fields, expected 5",
                fields.len()
            )));
        }
        let id = int_field(&fields[0], "id")?
            .to_i32()
            .ok_or_else(|| Error::InvalidArgument("contract id out of range".to_string()))?;
        let update_counter = int_field(&fields[1], "update counter")?
            .to_u16()
            .ok_or_else(|| Error::InvalidArgument("update counter out of range".to_string()))?;
        let hash = UInt160::from_bytes(&bytes_field(&fields[2], "hash")?)
            .map_err(|e| Error::InvalidArgument(e.to_string()))?;

        let nef = NefFile::from_stack_item(&fields[3])?;

        let manifest_json = String::from_utf8(bytes_field(&fields[4], "manifest")?)
            .map_err(|e| Error::InvalidManifest(e.to_string()))?;
        let manifest = ContractManifest::from_json(&manifest_json)?;

        Ok(Self {
            id,
            update_counter,
            hash,
            nef,
            manifest,
        })
    }
}

fn int_field(item: &StackItem, what: &str) -> Result<num_bigint::BigInt> {
    item.as_int()
        .map_err(|_| Error::InvalidArgument(format!("{} must be an integer", what)))
}

fn bytes_field(item: &StackItem, what: &str) -> Result<Vec<u8>> {
    item.as_bytes()
        .map_err(|_| Error::InvalidArgument(format!("{} must be a byte string", what)))
}

fn string_field(item: &StackItem, what: &str) -> Result<String> {
    String::from_utf8(bytes_field(item, what)?)
        .map_err(|_| Error::InvalidArgument(format!("{} must be valid utf-8", what)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> ContractState {
        let nef = NefFile::new("velac 0.1", "", vec![0x10, 0x11, 0x12]);
        let manifest = ContractManifest::new(
            "sample",
            vec![
                AbiMethod {
                    name: "add".to_string(),
                    parameters: 2,
                    offset: 0,
                    safe: true,
                },
                AbiMethod {
                    name: "add".to_string(),
                    parameters: 3,
                    offset: 8,
                    safe: true,
                },
            ],
        );
        ContractState {
            id: 7,
            update_counter: 2,
            hash: UInt160::from([0x55; 20]),
            nef,
            manifest,
        }
    }

    #[test]
    fn test_nef_checksum_round_trip() {
        let nef = NefFile::new("velac 0.1", "", vec![1, 2, 3]);
        assert!(nef.validate().is_ok());

        let mut tampered = nef.clone();
        tampered.script.push(4);
        assert!(matches!(tampered.validate(), Err(Error::InvalidNef(_))));

        let empty = NefFile::new("velac 0.1", "", vec![]);
        assert!(matches!(empty.validate(), Err(Error::InvalidNef(_))));
    }

    #[test]
    fn test_abi_overload_resolution() {
        let state = sample_state();
        assert_eq!(state.manifest.abi.resolve("add", 2).unwrap().offset, 0);
        assert_eq!(state.manifest.abi.resolve("add", 3).unwrap().offset, 8);
        assert!(state.manifest.abi.resolve("add", 1).is_none());
        assert!(state.manifest.abi.has_method_named("add"));
        assert!(!state.manifest.abi.has_method_named("sub"));
    }

    #[test]
    fn test_manifest_json_round_trip() {
        let manifest = sample_state().manifest;
        let json = manifest.to_json().unwrap();
        let parsed = ContractManifest::from_json(&json).unwrap();
        assert_eq!(manifest, parsed);
    }

    #[test]
    fn test_manifest_validation() {
        let mut manifest = sample_state().manifest;
        assert!(manifest.validate().is_ok());

        manifest.name.clear();
        assert!(matches!(manifest.validate(), Err(Error::InvalidManifest(_))));

        let empty_abi = ContractManifest::new("x", vec![]);
        assert!(matches!(empty_abi.validate(), Err(Error::InvalidManifest(_))));
    }

    #[test]
    fn test_state_stack_item_round_trip() {
        let state = sample_state();
        let item = state.to_stack_item().unwrap();
        let restored = ContractState::from_stack_item(&item).unwrap();
        assert_eq!(state, restored);
    }
}
