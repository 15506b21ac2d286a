mod common;

use changetracker::{CodecError, KeyKind, Kind, List, Map, Object, TrackerError, Value};
use common::{person, tracker};
use proptest::prelude::*;
use serde_json::json;

#[test]
fn register_is_idempotent_per_identity() {
    let mut t = tracker();
    let (_, alice) = person("Alice", 30);
    let (_, bob) = person("Bob", 40);
    let a = t.register_object(&alice).unwrap();
    assert_eq!(t.register_object(&alice.clone()), Some(a));
    let b = t.register_object(&bob).unwrap();
    assert_ne!(a, b);
    assert_eq!(t.lookup_object(&alice), Some(a));
    assert!(t.get_object(b).unwrap().same_identity(&bob));
    assert_eq!(t.register_object(&Value::from("scalar")), None);
    assert_eq!(t.register_object(&Value::from(vec![1i64])), None);
}

#[test]
fn unregister_then_register_allocates_new_id() {
    let mut t = tracker();
    let map = Value::from(Map::new());
    let first = t.register_object(&map).unwrap();
    t.unregister_object(&map);
    t.unregister_object(&map);
    assert_eq!(t.lookup_object(&map), None);
    assert!(t.get_object(first).is_none());
    assert!(t.register_object(&map).unwrap() > first);
}

#[test]
fn object_and_variable_ids_are_independent() {
    let mut t = tracker();
    t.create_root(Value::Int(1)).unwrap();
    t.create_root(Value::Int(2)).unwrap();
    let map = Value::from(Map::new());
    let root = t.create_root(map.clone()).unwrap();
    assert_eq!(root, 3);
    assert_eq!(t.lookup_object(&map), Some(1));
}

#[test]
fn dropped_objects_are_evicted_lazily() {
    let mut t = tracker();
    let id = {
        let (_, alice) = person("Alice", 30);
        t.register_object(&alice).unwrap()
    };
    assert_eq!(t.registry().len(), 1);
    assert!(t.get_object(id).is_none());
    assert!(t.registry().is_empty());
    assert!(matches!(
        t.from_value_json_bytes(format!("{{\"obj\":{id}}}").as_bytes()),
        Err(CodecError::BadObjectReference(bad)) if bad == id
    ));
}

#[test]
fn tracked_values_stay_alive() {
    let mut t = tracker();
    let id = {
        let (_, alice) = person("Alice", 30);
        t.create_root(alice).unwrap()
    };
    let reference = t.variable(id).unwrap().value_json().cloned().unwrap();
    let bytes = serde_json::to_vec(&reference).unwrap();
    let back = t.from_value_json_bytes(&bytes).unwrap();
    assert!(back.same_identity(t.variable(id).unwrap().value()));
}

#[test]
fn round_trip_preserves_scalars_and_identities() {
    let mut t = tracker();
    let (_, alice) = person("Alice", 30);
    let map = Value::from(Map::from_entries([("k", "v")]));
    let list = Value::from(vec![
        Value::Int(7),
        Value::from("s"),
        Value::Bool(false),
        Value::Null,
        Value::Float(2.5),
        alice.clone(),
        map.clone(),
    ]);
    let encoded = t.to_value_json(&list).unwrap();
    assert_eq!(
        encoded,
        json!([7, "s", false, null, 2.5, {"obj": 1}, {"obj": 2}])
    );
    let bytes = t.to_value_json_bytes(&list).unwrap();
    let back = t.from_value_json_bytes(&bytes).unwrap();
    let items = back.as_list().unwrap().to_vec();
    assert_eq!(&items[..5], &list.as_list().unwrap().to_vec()[..5]);
    assert!(items[5].same_identity(&alice));
    assert!(items[6].same_identity(&map));
}

#[test]
fn plain_json_decodes_to_fresh_values() {
    let mut t = tracker();
    let back = t
        .from_value_json_bytes(br#"{"name":"x","nested":{"obj":1}}"#)
        .unwrap();
    let map = back.as_map().unwrap();
    assert_eq!(map.key_kind(), KeyKind::Str);
    assert_eq!(map.get("name"), Some(Value::from("x")));
    // references are only resolved at the top level
    assert_eq!(map.get("nested").map(|v| v.kind()), Some(Kind::Map));
}

#[test]
fn nested_arrays_fail_variable_creation() {
    let mut t = tracker();
    let nested = Value::from(List::from_vec(vec![Value::from(vec![1i64, 2])]));
    assert!(matches!(
        t.create_root(nested),
        Err(TrackerError::Codec(CodecError::NestedArrayNotAllowed { index: 0 }))
    ));
    assert!(t.variables().is_empty());
    assert!(t.root_variables().is_empty());
}

#[test]
fn self_containing_list_fails_instead_of_recursing() {
    let mut t = tracker();
    let list = List::new();
    list.push(list.clone());
    assert!(matches!(
        t.create_root(list.clone()),
        Err(TrackerError::Codec(CodecError::NestedArrayNotAllowed { index: 0 }))
    ));
    assert!(matches!(
        t.to_value_json_bytes(&Value::from(list.clone())),
        Err(CodecError::NestedArrayNotAllowed { index: 0 })
    ));
    assert!(t.variables().is_empty());
    list.clear();
}

#[test]
fn typed_map_keys_navigate_by_index() {
    let mut t = tracker();
    let by_id = Map::typed(KeyKind::Int, Some(Kind::Str));
    by_id.insert(10i64, "ten");
    let root = t.create_root(by_id.clone()).unwrap();
    let ten = t.create_child(root, "10").unwrap();
    assert_eq!(t.get(ten).unwrap(), Value::from("ten"));
    assert!(t.set(ten, Value::Int(10)).is_err());
    t.set(ten, Value::from("TEN")).unwrap();
    assert_eq!(by_id.get(10i64), Some(Value::from("TEN")));
}

#[test]
fn objects_without_registered_type_are_opaque() {
    struct Opaque;
    let mut t = tracker();
    let root = t.create_root(Object::new(Opaque)).unwrap();
    assert_eq!(
        t.variable(root).unwrap().value_json(),
        Some(&json!({"obj": 1}))
    );
    let child = t.create_child(root, "Anything").unwrap();
    assert!(t.get(child).is_err());
}

proptest! {
    #[test]
    fn registry_ids_follow_identity(picks in prop::collection::vec(0usize..5, 1..40)) {
        let mut t = tracker();
        let pool: Vec<Value> = (0..5).map(|_| Value::from(Map::new())).collect();
        let mut seen = std::collections::HashMap::new();
        for pick in picks {
            let id = t.register_object(&pool[pick]).unwrap();
            let expected = *seen.entry(pick).or_insert(id);
            prop_assert_eq!(id, expected);
        }
        let distinct: std::collections::HashSet<i64> = seen.values().copied().collect();
        prop_assert_eq!(distinct.len(), seen.len());
    }

    #[test]
    fn scalar_lists_round_trip(items in prop::collection::vec(
        prop_oneof![
            any::<i64>().prop_map(Value::Int),
            "[a-z]{0,6}".prop_map(Value::from),
            any::<bool>().prop_map(Value::Bool),
        ],
        0..12,
    )) {
        let mut t = tracker();
        let list = Value::from(items.clone());
        let bytes = t.to_value_json_bytes(&list).unwrap();
        let back = t.from_value_json_bytes(&bytes).unwrap();
        prop_assert_eq!(back.as_list().unwrap().to_vec(), items);
    }
}
