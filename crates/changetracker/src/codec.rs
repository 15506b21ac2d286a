//! Value JSON: the wire form of tracked values.
//!
//! Scalars pass through, lists become flat arrays, and every map or object
//! is replaced by a reference `{"obj": id}` into the [`ObjectRegistry`].
//!
//! # Example
//!
//! ```
//! use changetracker::codec::{from_value_json_bytes, to_value_json, to_value_json_bytes};
//! use changetracker::{Map, ObjectRegistry, ReflectResolver, Value};
//! use serde_json::json;
//!
//! let resolver = ReflectResolver::default();
//! let mut registry = ObjectRegistry::new();
//! let map = Value::from(Map::new());
//!
//! let list = Value::from(vec![Value::Int(1), map.clone()]);
//! assert_eq!(
//!     to_value_json(&resolver, &mut registry, &list).unwrap(),
//!     json!([1, {"obj": 1}])
//! );
//!
//! let bytes = to_value_json_bytes(&resolver, &mut registry, &map).unwrap();
//! let back = from_value_json_bytes(&mut registry, &bytes).unwrap();
//! assert!(back.same_identity(&map));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Number, Value as Json};

use crate::error::CodecError;
use crate::registry::ObjectRegistry;
use crate::resolver::Resolver;
use crate::value::{List, Map, Value};

/// Key of the single-entry object that stands for a registered aggregate.
pub const OBJECT_REF_KEY: &str = "obj";

/// `{"obj": id}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub obj: i64,
}

impl ObjectRef {
    pub fn new(obj: i64) -> Self {
        Self { obj }
    }

    pub fn to_json(self) -> Json {
        let mut map = JsonMap::new();
        map.insert(OBJECT_REF_KEY.to_string(), Json::from(self.obj));
        Json::Object(map)
    }

    /// Recognize a single-key object whose `obj` member is an integral number.
    pub fn from_json(json: &Json) -> Option<Self> {
        let map = json.as_object()?;
        if map.len() != 1 {
            return None;
        }
        let raw = map.get(OBJECT_REF_KEY)?;
        let id = raw.as_i64().or_else(|| {
            raw.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        })?;
        Some(Self::new(id))
    }
}

pub fn is_object_ref(json: &Json) -> bool {
    ObjectRef::from_json(json).is_some()
}

pub fn object_ref_id(json: &Json) -> Option<i64> {
    ObjectRef::from_json(json).map(|r| r.obj)
}

/// Encode a host value, registering any aggregates it contains.
///
/// # Errors
///
/// [`CodecError::NestedArrayNotAllowed`] if a list element encodes to an
/// array.
pub fn to_value_json(
    resolver: &dyn Resolver,
    registry: &mut ObjectRegistry,
    value: &Value,
) -> Result<Json, CodecError> {
    if value.is_null() {
        return Ok(Json::Null);
    }
    let value = resolver.convert_to_value_json(registry, value.clone());
    encode_converted(resolver, registry, &value)
}

fn encode_converted(
    resolver: &dyn Resolver,
    registry: &mut ObjectRegistry,
    value: &Value,
) -> Result<Json, CodecError> {
    match value {
        Value::Null => Ok(Json::Null),
        Value::Bool(b) => Ok(Json::Bool(*b)),
        Value::Int(i) => Ok(Json::from(*i)),
        Value::Float(f) => Ok(Number::from_f64(*f).map_or(Json::Null, Json::Number)),
        Value::Str(s) => Ok(Json::String(s.clone())),
        Value::Map(_) | Value::Object(_) => Ok(registry
            .register(value)
            .map_or(Json::Null, |id| ObjectRef::new(id).to_json())),
        Value::List(list) => {
            let items = list.to_vec();
            let mut out = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                if item.is_null() {
                    out.push(Json::Null);
                    continue;
                }
                // rejected before recursing: a list may contain itself
                let item = resolver.convert_to_value_json(registry, item);
                if matches!(item, Value::List(_)) {
                    return Err(CodecError::NestedArrayNotAllowed { index });
                }
                out.push(encode_converted(resolver, registry, &item)?);
            }
            Ok(Json::Array(out))
        }
    }
}

pub fn to_value_json_bytes(
    resolver: &dyn Resolver,
    registry: &mut ObjectRegistry,
    value: &Value,
) -> Result<Vec<u8>, CodecError> {
    let json = to_value_json(resolver, registry, value)?;
    Ok(serde_json::to_vec(&json)?)
}

/// Decode Value JSON bytes.
///
/// Object references at the top level or directly inside a top-level array
/// resolve to the live registered value. Everything else becomes fresh host
/// values.
///
/// # Errors
///
/// [`CodecError::BadObjectReference`] for an unknown or reclaimed id, and
/// [`CodecError::Json`] for malformed input.
pub fn from_value_json_bytes(registry: &mut ObjectRegistry, bytes: &[u8]) -> Result<Value, CodecError> {
    let json: Json = serde_json::from_slice(bytes)?;
    match json {
        Json::Array(items) => {
            let values = items
                .into_iter()
                .map(|item| resolve_reference(registry, item))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::List(List::from_vec(values)))
        }
        other => resolve_reference(registry, other),
    }
}

fn resolve_reference(registry: &mut ObjectRegistry, json: Json) -> Result<Value, CodecError> {
    match ObjectRef::from_json(&json) {
        Some(r) => registry.get(r.obj).ok_or(CodecError::BadObjectReference(r.obj)),
        None => Ok(json_to_value(json)),
    }
}

fn json_to_value(json: Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => n.as_f64().map_or(Value::Null, Value::Float),
        },
        Json::String(s) => Value::Str(s),
        Json::Array(items) => Value::List(List::from_vec(items.into_iter().map(json_to_value).collect())),
        Json::Object(members) => {
            let map = Map::new();
            for (key, member) in members {
                map.insert(key, json_to_value(member));
            }
            Value::Map(map)
        }
    }
}

/// Equality of two encodings: canonical serialization first, structural
/// comparison if either side fails to serialize.
pub fn json_equal(a: &Json, b: &Json) -> bool {
    match (serde_json::to_string(a), serde_json::to_string(b)) {
        (Ok(x), Ok(y)) => x == y,
        _ => deep_equal(a, b),
    }
}

fn deep_equal(a: &Json, b: &Json) -> bool {
    match (a, b) {
        (Json::Null, Json::Null) => true,
        (Json::Bool(x), Json::Bool(y)) => x == y,
        (Json::Number(x), Json::Number(y)) => x == y,
        (Json::String(x), Json::String(y)) => x == y,
        (Json::Array(xs), Json::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| deep_equal(x, y))
        }
        (Json::Object(xs), Json::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| deep_equal(x, y)))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ReflectResolver;
    use crate::value::Object;
    use serde_json::json;

    fn encode(registry: &mut ObjectRegistry, value: &Value) -> Result<Json, CodecError> {
        to_value_json(&ReflectResolver::default(), registry, value)
    }

    #[test]
    fn test_scalars() {
        let mut registry = ObjectRegistry::new();
        assert_eq!(encode(&mut registry, &Value::Null).unwrap(), Json::Null);
        assert_eq!(encode(&mut registry, &Value::from(true)).unwrap(), json!(true));
        assert_eq!(encode(&mut registry, &Value::from(-3)).unwrap(), json!(-3));
        assert_eq!(encode(&mut registry, &Value::from(1.5)).unwrap(), json!(1.5));
        assert_eq!(encode(&mut registry, &Value::from(f64::NAN)).unwrap(), Json::Null);
        assert_eq!(encode(&mut registry, &Value::from("hi")).unwrap(), json!("hi"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_aggregates_become_references() {
        let mut registry = ObjectRegistry::new();
        let obj = Value::from(Object::new(5u8));
        assert_eq!(encode(&mut registry, &obj).unwrap(), json!({"obj": 1}));
        assert_eq!(encode(&mut registry, &obj).unwrap(), json!({"obj": 1}));
        let map = Value::from(Map::new());
        assert_eq!(
            encode(&mut registry, &Value::from(vec![obj, map, Value::from("x")])).unwrap(),
            json!([{"obj": 1}, {"obj": 2}, "x"])
        );
    }

    #[test]
    fn test_nested_array_rejected() {
        let mut registry = ObjectRegistry::new();
        let nested = Value::from(vec![Value::Int(1), Value::from(vec![2i64])]);
        assert!(matches!(
            encode(&mut registry, &nested),
            Err(CodecError::NestedArrayNotAllowed { index: 1 })
        ));
    }

    #[test]
    fn test_self_containing_list_rejected() {
        let mut registry = ObjectRegistry::new();
        let list = List::new();
        list.push(list.clone());
        assert!(matches!(
            encode(&mut registry, &Value::from(list.clone())),
            Err(CodecError::NestedArrayNotAllowed { index: 0 })
        ));
        // break the cycle so the allocation is freed
        list.clear();
    }

    #[test]
    fn test_convert_hook_runs_first() {
        struct Stringify;
        impl Resolver for Stringify {
            fn get(&self, _: &Value, _: &changetracker_path::PathElement) -> Result<Value, crate::ResolveError> {
                Ok(Value::Null)
            }
            fn set(&self, _: &Value, _: &changetracker_path::PathElement, _: Value) -> Result<(), crate::ResolveError> {
                Ok(())
            }
            fn call(&self, _: &Value, _: &str) -> Result<Value, crate::ResolveError> {
                Ok(Value::Null)
            }
            fn call_with(&self, _: &Value, _: &str, _: Value) -> Result<(), crate::ResolveError> {
                Ok(())
            }
            fn convert_to_value_json(&self, _: &ObjectRegistry, value: Value) -> Value {
                match value {
                    Value::Object(_) => Value::from("<object>"),
                    other => other,
                }
            }
        }
        let mut registry = ObjectRegistry::new();
        let json = to_value_json(&Stringify, &mut registry, &Value::from(Object::new(1u8))).unwrap();
        assert_eq!(json, json!("<object>"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_decode() {
        let mut registry = ObjectRegistry::new();
        let map = Value::from(Map::new());
        let id = registry.register(&map).unwrap();

        let top = from_value_json_bytes(&mut registry, format!("{{\"obj\":{id}}}").as_bytes()).unwrap();
        assert!(top.same_identity(&map));

        let list = from_value_json_bytes(&mut registry, format!("[{{\"obj\":{id}}},2]").as_bytes()).unwrap();
        let items = list.as_list().unwrap().to_vec();
        assert!(items[0].same_identity(&map));
        assert_eq!(items[1], Value::Int(2));

        let fresh = from_value_json_bytes(&mut registry, br#"{"a":1,"b":[true]}"#).unwrap();
        let fresh = fresh.as_map().unwrap();
        assert_eq!(fresh.get("a"), Some(Value::Int(1)));
        assert_eq!(fresh.get("b"), Some(Value::from(vec![true])));
    }

    #[test]
    fn test_decode_bad_reference() {
        let mut registry = ObjectRegistry::new();
        assert!(matches!(
            from_value_json_bytes(&mut registry, br#"{"obj":99}"#),
            Err(CodecError::BadObjectReference(99))
        ));
        assert!(matches!(
            from_value_json_bytes(&mut registry, br#"[1,{"obj":4}]"#),
            Err(CodecError::BadObjectReference(4))
        ));
        assert!(matches!(
            from_value_json_bytes(&mut registry, b"{"),
            Err(CodecError::Json(_))
        ));
    }

    #[test]
    fn test_object_ref_recognition() {
        assert_eq!(object_ref_id(&json!({"obj": 3})), Some(3));
        assert_eq!(object_ref_id(&json!({"obj": 3.0})), Some(3));
        assert!(!is_object_ref(&json!({"obj": 3, "x": 1})));
        assert!(!is_object_ref(&json!({"obj": "3"})));
        assert!(!is_object_ref(&json!([3])));
        let parsed: ObjectRef = serde_json::from_value(json!({"obj": 8})).unwrap();
        assert_eq!(parsed, ObjectRef::new(8));
    }

    #[test]
    fn test_json_equal() {
        assert!(json_equal(&json!({"a": [1, 2]}), &json!({"a": [1, 2]})));
        assert!(!json_equal(&json!({"a": [1, 2]}), &json!({"a": [2, 1]})));
        assert!(!json_equal(&json!(1), &json!(1.0)));
        assert!(deep_equal(&json!({"x": null}), &json!({"x": null})));
        assert!(!deep_equal(&json!({"x": null}), &json!({"y": null})));
    }
}
