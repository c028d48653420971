//! Contract registry lifecycle tests: deploy, update, destroy and the
//! derived token index.

use std::rc::Rc;
use vela_contract::{
    AbiMethod, CallFlags, ContractManifest, ContractRegistry, ContractState, Error,
    ExecutionConfig, InteropContext, MemoryStore, NativeContract, NativeRegistry, NefFile,
    SharedStore,
};
use vela_core::UInt160;
use vela_vm::StackItem;

fn genesis_store() -> (SharedStore, Rc<NativeRegistry>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = MemoryStore::shared();
    let natives = Rc::new(NativeRegistry::new());
    let mut engine = InteropContext::new(store.clone(), natives.clone(), ExecutionConfig::default());
    natives.genesis(&mut engine).expect("genesis");
    engine.commit().expect("genesis commit");
    (store, natives)
}

fn new_engine(store: &SharedStore, natives: &Rc<NativeRegistry>) -> InteropContext {
    InteropContext::new(store.clone(), natives.clone(), ExecutionConfig::default())
}

fn sample_nef(script: Vec<u8>) -> NefFile {
    NefFile::new("velac 0.1", "", script)
}

fn sample_manifest(name: &str) -> ContractManifest {
    ContractManifest::new(
        name,
        vec![AbiMethod {
            name: "main".to_string(),
            parameters: 0,
            offset: 0,
            safe: false,
        }],
    )
}

fn deployer() -> UInt160 {
    UInt160::from([0x11; 20])
}

fn deploy(engine: &mut InteropContext, name: &str) -> ContractState {
    ContractRegistry::deploy(engine, &deployer(), sample_nef(vec![0x40]), sample_manifest(name))
        .expect("deploy")
}

// ============================================================================
// Deploy
// ============================================================================

#[test]
fn test_deploy_assigns_monotonic_positive_ids() {
    let (store, natives) = genesis_store();
    let mut engine = new_engine(&store, &natives);

    let first = deploy(&mut engine, "first");
    let second = deploy(&mut engine, "second");
    assert!(first.id > 0);
    assert_eq!(second.id, first.id + 1);
    assert_eq!(first.update_counter, 0);
    assert_ne!(first.hash, second.hash);

    let looked_up = ContractRegistry::contract_state(&engine, &first.hash)
        .expect("lookup")
        .expect("present");
    assert_eq!(looked_up, first);
    let by_id = ContractRegistry::contract_state_by_id(&engine, first.id)
        .expect("lookup by id")
        .expect("present");
    assert_eq!(by_id.hash, first.hash);
}

#[test]
fn test_duplicate_deploy_fails_with_already_exists() {
    let (store, natives) = genesis_store();
    let mut engine = new_engine(&store, &natives);

    deploy(&mut engine, "duplicate");
    let err = ContractRegistry::deploy(
        &mut engine,
        &deployer(),
        sample_nef(vec![0x40]),
        sample_manifest("duplicate"),
    )
    .expect_err("same deployer, code and name");
    assert!(matches!(err, Error::AlreadyExists(_)));
}

#[test]
fn test_deploy_validates_nef_and_manifest() {
    let (store, natives) = genesis_store();
    let mut engine = new_engine(&store, &natives);

    let err = ContractRegistry::deploy(
        &mut engine,
        &deployer(),
        sample_nef(Vec::new()),
        sample_manifest("empty-script"),
    )
    .expect_err("empty script");
    assert!(matches!(err, Error::InvalidNef(_)));

    let err = ContractRegistry::deploy(
        &mut engine,
        &deployer(),
        sample_nef(vec![0x40]),
        ContractManifest::new("no-methods", vec![]),
    )
    .expect_err("empty abi");
    assert!(matches!(err, Error::InvalidManifest(_)));
}

#[test]
fn test_contract_hash_depends_on_deployer_checksum_and_name() {
    let a = ContractRegistry::compute_contract_hash(&deployer(), 7, "name");
    assert_eq!(a, ContractRegistry::compute_contract_hash(&deployer(), 7, "name"));
    assert_ne!(a, ContractRegistry::compute_contract_hash(&deployer(), 8, "name"));
    assert_ne!(a, ContractRegistry::compute_contract_hash(&deployer(), 7, "other"));
    let other = UInt160::from([0x22; 20]);
    assert_ne!(a, ContractRegistry::compute_contract_hash(&other, 7, "name"));
}

// ============================================================================
// Update
// ============================================================================

#[test]
fn test_update_preserves_id_and_increments_counter_once() {
    let (store, natives) = genesis_store();
    let mut engine = new_engine(&store, &natives);
    let state = deploy(&mut engine, "updatable");

    let updated = ContractRegistry::update(
        &mut engine,
        &state.hash,
        sample_nef(vec![0x40, 0x41]),
        sample_manifest("updatable"),
    )
    .expect("update");
    assert_eq!(updated.id, state.id);
    assert_eq!(updated.update_counter, 1);
    assert_eq!(updated.nef.script, vec![0x40, 0x41]);

    let again = ContractRegistry::update(
        &mut engine,
        &state.hash,
        sample_nef(vec![0x42]),
        sample_manifest("updatable"),
    )
    .expect("second update");
    assert_eq!(again.update_counter, 2);
    assert_eq!(again.id, state.id);
}

#[test]
fn test_update_unknown_contract_fails_with_not_found() {
    let (store, natives) = genesis_store();
    let mut engine = new_engine(&store, &natives);

    let err = ContractRegistry::update(
        &mut engine,
        &UInt160::from([0xAB; 20]),
        sample_nef(vec![0x40]),
        sample_manifest("ghost"),
    )
    .expect_err("unknown hash");
    assert!(matches!(err, Error::NotFound(_)));
}

// ============================================================================
// Destroy
// ============================================================================

#[test]
fn test_destroy_removes_records_and_clears_storage() {
    let (store, natives) = genesis_store();
    let mut engine = new_engine(&store, &natives);
    let state = deploy(&mut engine, "doomed");
    engine.set_executing(state.hash, state.hash);

    // Give the contract some storage to clear.
    let ctx = engine
        .invoke_syscall("System.Storage.GetContext", vec![])
        .expect("context");
    for key in [b"a".to_vec(), b"b".to_vec()] {
        engine
            .invoke_syscall(
                "System.Storage.Put",
                vec![
                    ctx.clone(),
                    StackItem::from_byte_string(key),
                    StackItem::from_byte_string(b"v".to_vec()),
                ],
            )
            .expect("put");
    }
    assert_eq!(engine.seek_storage(state.id, &[]).expect("seek").len(), 2);

    ContractRegistry::destroy(&mut engine, &state.hash).expect("destroy");
    assert!(ContractRegistry::contract_state(&engine, &state.hash)
        .expect("lookup")
        .is_none());
    assert!(ContractRegistry::contract_state_by_id(&engine, state.id)
        .expect("lookup by id")
        .is_none());
    assert!(engine.seek_storage(state.id, &[]).expect("seek").is_empty());

    let err = ContractRegistry::destroy(&mut engine, &state.hash).expect_err("already gone");
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn test_destroyed_id_is_never_reused() {
    let (store, natives) = genesis_store();
    let mut engine = new_engine(&store, &natives);
    let state = deploy(&mut engine, "phoenix");
    ContractRegistry::destroy(&mut engine, &state.hash).expect("destroy");

    let redeployed = deploy(&mut engine, "phoenix");
    assert_eq!(redeployed.hash, state.hash);
    assert!(redeployed.id > state.id);
}

// ============================================================================
// Native dispatch
// ============================================================================

#[test]
fn test_get_contract_via_native_dispatch() {
    let (store, natives) = genesis_store();
    let mut engine = new_engine(&store, &natives);
    let state = deploy(&mut engine, "queryable");
    let registry_hash = natives.management().hash();

    let result = engine
        .call_contract(
            registry_hash,
            "getContract",
            vec![StackItem::from_byte_string(state.hash.as_bytes().to_vec())],
            CallFlags::ALL,
        )
        .expect("getContract");
    let decoded = ContractState::from_stack_item(&result).expect("decode");
    assert_eq!(decoded, state);

    let absent = engine
        .call_contract(
            registry_hash,
            "getContract",
            vec![StackItem::from_byte_string(vec![0xCD; 20])],
            CallFlags::ALL,
        )
        .expect("absent lookup");
    assert!(absent.is_null());
}

#[test]
fn test_lifecycle_methods_require_write_flags() {
    let (store, natives) = genesis_store();
    let mut engine = new_engine(&store, &natives);
    let registry_hash = natives.management().hash();

    let err = engine
        .call_contract(
            registry_hash,
            "destroy",
            vec![StackItem::from_byte_string(vec![0x00; 20])],
            CallFlags::READ_STATES,
        )
        .expect_err("missing write flags");
    assert!(matches!(err, Error::PermissionDenied(_)));
}

#[test]
fn test_unknown_method_and_arity_resolution() {
    let (store, natives) = genesis_store();
    let mut engine = new_engine(&store, &natives);
    let registry_hash = natives.management().hash();

    let err = engine
        .call_contract(registry_hash, "vanish", vec![], CallFlags::ALL)
        .expect_err("unknown method");
    assert!(matches!(err, Error::NotFound(_)));

    let err = engine
        .call_contract(registry_hash, "getContract", vec![], CallFlags::ALL)
        .expect_err("wrong arity");
    assert!(matches!(err, Error::ArityMismatch(_)));
}

// ============================================================================
// Post-persist token index
// ============================================================================

#[test]
fn test_post_persist_rebuilds_token_index_idempotently() {
    let (store, natives) = genesis_store();
    let mut engine = new_engine(&store, &natives);

    let mut manifest = sample_manifest("my-token");
    manifest.supported_standards.push("VTS-1".to_string());
    let token = ContractRegistry::deploy(
        &mut engine,
        &deployer(),
        sample_nef(vec![0x40]),
        manifest,
    )
    .expect("deploy token");
    deploy(&mut engine, "not-a-token");

    natives.post_persist(&mut engine).expect("post persist");
    let index = ContractRegistry::token_contracts(&engine).expect("index");
    assert!(index.contains(&token.hash));
    assert!(index.contains(&natives.vela().hash()));
    assert!(index.contains(&natives.spark().hash()));
    assert_eq!(index.len(), 3);

    // Re-running derives the same index from the same records.
    natives.post_persist(&mut engine).expect("post persist again");
    assert_eq!(ContractRegistry::token_contracts(&engine).expect("index"), index);

    // A destroyed token drops out on the next pass.
    ContractRegistry::destroy(&mut engine, &token.hash).expect("destroy");
    natives.post_persist(&mut engine).expect("post persist after destroy");
    let index = ContractRegistry::token_contracts(&engine).expect("index");
    assert!(!index.contains(&token.hash));
    assert_eq!(index.len(), 2);
}
