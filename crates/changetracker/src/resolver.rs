//! Navigation capability used by the tracker.

use changetracker_path::PathElement;

use crate::error::ResolveError;
use crate::reflect::{TypeInfo, TypeRegistry};
use crate::registry::ObjectRegistry;
use crate::value::{KeyKind, List, Map, MapKey, Object, Value};
use crate::variable::Variable;

/// Navigates into and mutates host values, and supplies the optional
/// creation, wrapper and type hooks.
///
/// Only the four navigation operations are required; the hooks default to
/// "no customization".
pub trait Resolver {
    /// Read the value at `element` within `value`.
    fn get(&self, value: &Value, element: &PathElement) -> Result<Value, ResolveError>;

    /// Assign `new_value` at `element` within `value`.
    fn set(&self, value: &Value, element: &PathElement, new_value: Value) -> Result<(), ResolveError>;

    /// Invoke a zero-argument method and return its first result.
    fn call(&self, value: &Value, method: &str) -> Result<Value, ResolveError>;

    /// Invoke a one-argument method, ignoring any results.
    fn call_with(&self, value: &Value, method: &str, arg: Value) -> Result<(), ResolveError>;

    /// Invoke a zero-argument method for its side effects.
    fn trigger(&self, value: &Value, method: &str) -> Result<(), ResolveError> {
        self.call(value, method).map(|_| ())
    }

    /// Build the value for a variable carrying a `create` property.
    fn create_value(&self, _variable: &Variable, _type_tag: &str, seed: Value) -> Value {
        seed
    }

    /// Build a wrapper for a variable carrying a `wrapper` property.
    fn create_wrapper(&self, _variable: &Variable) -> Option<Value> {
        None
    }

    /// Infer the `type` property of a variable holding an object reference.
    fn get_type(&self, _variable: &Variable, _value: &Value) -> Option<String> {
        None
    }

    /// Substitute a value before it is encoded.
    fn convert_to_value_json(&self, _registry: &ObjectRegistry, value: Value) -> Value {
        value
    }
}

/// Default resolver: navigates maps and lists directly and objects through
/// their registered [`TypeInfo`].
#[derive(Default)]
pub struct ReflectResolver {
    types: TypeRegistry,
}

impl ReflectResolver {
    pub fn new(types: TypeRegistry) -> Self {
        Self { types }
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeRegistry {
        &mut self.types
    }

    fn type_info(&self, object: &Object, element: &PathElement) -> Result<&TypeInfo, ResolveError> {
        self.types
            .info_for(object)
            .ok_or_else(|| ResolveError::UnsupportedContainer {
                element: element.to_string(),
                container: "unregistered object".to_string(),
            })
    }

    fn method_target<'a>(&'a self, value: &'a Value, method: &str) -> Result<(&'a Object, &'a TypeInfo), ResolveError> {
        match value {
            Value::Null => Err(ResolveError::NilNavigation),
            Value::Object(object) => {
                let info = self
                    .types
                    .info_for(object)
                    .ok_or_else(|| ResolveError::MethodNotFound(method.to_string()))?;
                Ok((object, info))
            }
            _ => Err(ResolveError::MethodNotFound(method.to_string())),
        }
    }
}

fn unsupported(element: &PathElement, value: &Value) -> ResolveError {
    ResolveError::UnsupportedContainer {
        element: element.to_string(),
        container: value.kind().to_string(),
    }
}

fn map_key(key_kind: KeyKind, element: &PathElement) -> Result<MapKey, ResolveError> {
    match (key_kind, element) {
        (KeyKind::Str, PathElement::Name(name)) => Ok(MapKey::Str(name.clone())),
        (KeyKind::Int, PathElement::Index(idx)) => i64::try_from(*idx)
            .map(MapKey::Int)
            .map_err(|_| ResolveError::KeyTypeMismatch {
                key: element.to_string(),
                expected: KeyKind::Int,
            }),
        (expected, _) => Err(ResolveError::KeyTypeMismatch {
            key: element.to_string(),
            expected,
        }),
    }
}

fn map_get(map: &Map, element: &PathElement) -> Result<Value, ResolveError> {
    let inner = map.cell().try_borrow().map_err(|_| ResolveError::AlreadyBorrowed)?;
    let key = map_key(inner.key_kind, element)?;
    inner
        .entries
        .get(&key)
        .cloned()
        .ok_or_else(|| ResolveError::KeyNotFound(key.to_string()))
}

fn map_set(map: &Map, element: &PathElement, new_value: Value) -> Result<(), ResolveError> {
    let mut inner = map
        .cell()
        .try_borrow_mut()
        .map_err(|_| ResolveError::AlreadyBorrowed)?;
    let key = map_key(inner.key_kind, element)?;
    if !inner.accepts(&new_value) {
        return Err(ResolveError::ValueTypeMismatch {
            expected: inner.value_kind.unwrap_or(new_value.kind()),
            found: new_value.kind(),
        });
    }
    inner.entries.insert(key, new_value);
    Ok(())
}

fn list_get(list: &List, index: usize) -> Result<Value, ResolveError> {
    let items = list.cell().try_borrow().map_err(|_| ResolveError::AlreadyBorrowed)?;
    items.get(index).cloned().ok_or(ResolveError::IndexOutOfRange {
        index,
        len: items.len(),
    })
}

fn list_set(list: &List, index: usize, new_value: Value) -> Result<(), ResolveError> {
    let mut items = list
        .cell()
        .try_borrow_mut()
        .map_err(|_| ResolveError::AlreadyBorrowed)?;
    let len = items.len();
    match items.get_mut(index) {
        Some(slot) => {
            *slot = new_value;
            Ok(())
        }
        None => Err(ResolveError::IndexOutOfRange { index, len }),
    }
}

impl Resolver for ReflectResolver {
    fn get(&self, value: &Value, element: &PathElement) -> Result<Value, ResolveError> {
        match element {
            PathElement::Getter(method) => return self.call(value, method),
            PathElement::Setter(_) => return Err(ResolveError::WriteOnlyElement(element.to_string())),
            PathElement::Name(_) | PathElement::Index(_) => {}
        }
        match (value, element) {
            (Value::Null, _) => Err(ResolveError::NilNavigation),
            (Value::Object(object), PathElement::Name(name)) => {
                let field = self
                    .type_info(object, element)?
                    .field(name)
                    .ok_or_else(|| ResolveError::FieldNotFound(name.clone()))?;
                field.get(object.cell())
            }
            (Value::Map(map), _) => map_get(map, element),
            (Value::List(list), PathElement::Index(index)) => list_get(list, *index),
            _ => Err(unsupported(element, value)),
        }
    }

    fn set(&self, value: &Value, element: &PathElement, new_value: Value) -> Result<(), ResolveError> {
        match element {
            PathElement::Setter(method) => return self.call_with(value, method, new_value),
            PathElement::Getter(_) => return Err(ResolveError::NotSettable(element.to_string())),
            PathElement::Name(_) | PathElement::Index(_) => {}
        }
        match (value, element) {
            (Value::Null, _) => Err(ResolveError::NilNavigation),
            (Value::Object(object), PathElement::Name(name)) => {
                let field = self
                    .type_info(object, element)?
                    .field(name)
                    .ok_or_else(|| ResolveError::FieldNotFound(name.clone()))?;
                field.set(object.cell(), new_value)
            }
            (Value::Map(map), _) => map_set(map, element, new_value),
            (Value::List(list), PathElement::Index(index)) => list_set(list, *index, new_value),
            _ => Err(unsupported(element, value)),
        }
    }

    fn call(&self, value: &Value, method: &str) -> Result<Value, ResolveError> {
        let (object, info) = self.method_target(value, method)?;
        let info = info
            .method(method)
            .ok_or_else(|| ResolveError::MethodNotFound(method.to_string()))?;
        if info.params() != 0 {
            return Err(ResolveError::MethodArity {
                method: method.to_string(),
                expected: 0,
                found: info.params(),
            });
        }
        if info.returns() == 0 {
            return Err(ResolveError::NoReturnValue(method.to_string()));
        }
        info.invoke(object.cell(), Vec::new())?
            .into_iter()
            .next()
            .ok_or_else(|| ResolveError::NoReturnValue(method.to_string()))
    }

    fn call_with(&self, value: &Value, method: &str, arg: Value) -> Result<(), ResolveError> {
        let (object, info) = self.method_target(value, method)?;
        let info = info
            .method(method)
            .ok_or_else(|| ResolveError::MethodNotFound(method.to_string()))?;
        if info.params() != 1 {
            return Err(ResolveError::MethodArity {
                method: method.to_string(),
                expected: 1,
                found: info.params(),
            });
        }
        info.invoke(object.cell(), vec![arg])?;
        Ok(())
    }

    /// Unlike [`call`](Resolver::call), methods without results are accepted.
    fn trigger(&self, value: &Value, method: &str) -> Result<(), ResolveError> {
        let (object, info) = self.method_target(value, method)?;
        let info = info
            .method(method)
            .ok_or_else(|| ResolveError::MethodNotFound(method.to_string()))?;
        if info.params() != 0 {
            return Err(ResolveError::MethodArity {
                method: method.to_string(),
                expected: 0,
                found: info.params(),
            });
        }
        info.invoke(object.cell(), Vec::new())?;
        Ok(())
    }
}
