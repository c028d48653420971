//! Property tests for the canonical serializer.

use proptest::prelude::*;
use vela_vm::{BinarySerializer, ExecutionLimits, Map, StackItem};

fn arb_stack_item() -> impl Strategy<Value = StackItem> {
    let leaf = prop_oneof![
        Just(StackItem::Null),
        any::<bool>().prop_map(StackItem::from_bool),
        any::<i64>().prop_map(StackItem::from_int),
        proptest::collection::vec(any::<u8>(), 0..48).prop_map(StackItem::from_byte_string),
        proptest::collection::vec(any::<u8>(), 0..48).prop_map(StackItem::from_buffer),
    ];
    leaf.prop_recursive(3, 48, 6, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..6).prop_map(StackItem::from_array),
            proptest::collection::vec(inner.clone(), 0..6).prop_map(StackItem::from_struct),
            proptest::collection::vec(
                (proptest::collection::vec(any::<u8>(), 0..16), inner),
                0..6
            )
            .prop_map(|pairs| {
                let mut map = Map::new();
                for (key, value) in pairs {
                    map.insert(StackItem::from_byte_string(key), value)
                        .expect("byte string keys are always valid");
                }
                StackItem::from_map(map)
            }),
        ]
    })
}

proptest! {
    // Acyclic graphs under the ceilings always round-trip to an equal value
    // with the original runtime variant.
    #[test]
    fn round_trip_preserves_value_and_variant(item in arb_stack_item()) {
        let limits = ExecutionLimits::default();
        let bytes = BinarySerializer::serialize(&item, &limits).unwrap();
        let restored = BinarySerializer::deserialize(&bytes, &limits).unwrap();
        prop_assert_eq!(item.stack_item_type(), restored.stack_item_type());
        prop_assert_eq!(item, restored);
    }

    // Serialization is a pure function of the value graph.
    #[test]
    fn serialization_is_deterministic(item in arb_stack_item()) {
        let limits = ExecutionLimits::default();
        let first = BinarySerializer::serialize(&item, &limits).unwrap();
        let second = BinarySerializer::serialize(&item, &limits).unwrap();
        prop_assert_eq!(first, second);
    }
}
