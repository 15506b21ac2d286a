//! Host value model.
//!
//! Tracked objects live outside the tracker. They are shared with it through
//! [`Value`], a dynamic value whose aggregates (`Map`, `Object`) are
//! reference-counted so the tracker can observe them, mutate them through
//! paths, and hold weak handles for identity.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// A host value.
///
/// Scalars compare by value, lists element-wise, maps and objects by
/// identity.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(List),
    Map(Map),
    Object(Object),
}

/// Coarse type of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Bool,
    Int,
    Float,
    Str,
    List,
    Map,
    Object,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Null => "null",
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::Str => "string",
            Kind::List => "list",
            Kind::Map => "map",
            Kind::Object => "object",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Float(_) => Kind::Float,
            Value::Str(_) => Kind::Str,
            Value::List(_) => Kind::List,
            Value::Map(_) => Kind::Map,
            Value::Object(_) => Kind::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Pointer/map-like values: the ones the object registry accepts.
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Value::Map(_) | Value::Object(_))
    }

    /// Identity comparison: aggregates and lists by allocation, scalars by value.
    pub fn same_identity(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => a.ptr_eq(b),
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::List(_) | Value::Map(_) | Value::Object(_), _)
            | (_, Value::List(_) | Value::Map(_) | Value::Object(_)) => false,
            (a, b) => a == b,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Allocation address of an aggregate, used as its identity token.
    pub(crate) fn identity(&self) -> Option<usize> {
        match self {
            Value::Map(map) => Some(map.addr()),
            Value::Object(obj) => Some(obj.addr()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a.ptr_eq(b) || a.to_vec() == b.to_vec(),
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::List(list) => list.fmt(f),
            Value::Map(map) => map.fmt(f),
            Value::Object(obj) => obj.fmt(f),
        }
    }
}

/// A shared, type-erased host object.
///
/// The payload is a `RefCell<T>` behind an `Rc`; navigation into it goes
/// through the fields and methods registered for `T` in a
/// [`TypeRegistry`](crate::TypeRegistry).
#[derive(Clone)]
pub struct Object(Rc<dyn Any>);

impl Object {
    pub fn new<T: Any>(value: T) -> Self {
        Object(Rc::new(RefCell::new(value)))
    }

    /// Share an existing host cell without copying it.
    pub fn from_rc<T: Any>(cell: Rc<RefCell<T>>) -> Self {
        Object(cell)
    }

    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<RefCell<T>>()
    }

    pub fn downcast<T: Any>(&self) -> Option<Rc<RefCell<T>>> {
        Rc::clone(&self.0).downcast::<RefCell<T>>().ok()
    }

    /// Borrow the payload as `T` for the duration of `f`.
    pub fn with<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let cell = self.0.downcast_ref::<RefCell<T>>()?;
        let guard = cell.try_borrow().ok()?;
        Some(f(&guard))
    }

    /// Mutably borrow the payload as `T` for the duration of `f`.
    pub fn with_mut<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let cell = self.0.downcast_ref::<RefCell<T>>()?;
        let mut guard = cell.try_borrow_mut().ok()?;
        Some(f(&mut guard))
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        self.addr() == other.addr()
    }

    pub fn strong_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// The erased `RefCell<T>`.
    pub(crate) fn cell(&self) -> &dyn Any {
        &*self.0
    }

    pub(crate) fn cell_type_id(&self) -> TypeId {
        (*self.0).type_id()
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn downgrade(&self) -> Weak<dyn Any> {
        Rc::downgrade(&self.0)
    }

    pub(crate) fn from_any(rc: Rc<dyn Any>) -> Self {
        Object(rc)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object(@{:#x})", self.addr())
    }
}

/// Key kind accepted by a [`Map`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Str,
    Int,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Str => f.write_str("string"),
            KeyKind::Int => f.write_str("int"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    Str(String),
    Int(i64),
}

impl MapKey {
    pub fn kind(&self) -> KeyKind {
        match self {
            MapKey::Str(_) => KeyKind::Str,
            MapKey::Int(_) => KeyKind::Int,
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Str(s) => f.write_str(s),
            MapKey::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for MapKey {
    fn from(value: &str) -> Self {
        MapKey::Str(value.to_string())
    }
}

impl From<String> for MapKey {
    fn from(value: String) -> Self {
        MapKey::Str(value)
    }
}

impl From<i64> for MapKey {
    fn from(value: i64) -> Self {
        MapKey::Int(value)
    }
}

/// Storage behind a [`Map`]: entries plus the declared key and value kinds.
#[derive(Debug)]
pub struct HostMap {
    pub(crate) key_kind: KeyKind,
    pub(crate) value_kind: Option<Kind>,
    pub(crate) entries: BTreeMap<MapKey, Value>,
}

impl HostMap {
    /// Whether `value` may be stored under this map's declared value kind.
    /// Null is accepted wherever an aggregate is expected.
    pub(crate) fn accepts(&self, value: &Value) -> bool {
        match self.value_kind {
            None => true,
            Some(kind) if kind == value.kind() => true,
            Some(Kind::List | Kind::Map | Kind::Object) => value.is_null(),
            Some(_) => false,
        }
    }
}

/// A shared, map-like host value.
#[derive(Clone)]
pub struct Map(Rc<RefCell<HostMap>>);

impl Map {
    /// String-keyed map accepting any value.
    pub fn new() -> Self {
        Self::typed(KeyKind::Str, None)
    }

    pub fn typed(key_kind: KeyKind, value_kind: Option<Kind>) -> Self {
        Map(Rc::new(RefCell::new(HostMap {
            key_kind,
            value_kind,
            entries: BTreeMap::new(),
        })))
    }

    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<MapKey>,
        V: Into<Value>,
    {
        let map = Self::new();
        for (key, value) in entries {
            map.insert(key, value);
        }
        map
    }

    pub fn key_kind(&self) -> KeyKind {
        self.0.borrow().key_kind
    }

    pub fn value_kind(&self) -> Option<Kind> {
        self.0.borrow().value_kind
    }

    pub fn get(&self, key: impl Into<MapKey>) -> Option<Value> {
        self.0.borrow().entries.get(&key.into()).cloned()
    }

    /// Host-side insert; bypasses the declared kinds.
    pub fn insert(&self, key: impl Into<MapKey>, value: impl Into<Value>) -> Option<Value> {
        self.0.borrow_mut().entries.insert(key.into(), value.into())
    }

    pub fn remove(&self, key: impl Into<MapKey>) -> Option<Value> {
        self.0.borrow_mut().entries.remove(&key.into())
    }

    pub fn len(&self) -> usize {
        self.0.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ptr_eq(&self, other: &Map) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn cell(&self) -> &RefCell<HostMap> {
        &self.0
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn downgrade(&self) -> Weak<RefCell<HostMap>> {
        Rc::downgrade(&self.0)
    }

    pub(crate) fn from_rc(rc: Rc<RefCell<HostMap>>) -> Self {
        Map(rc)
    }
}

impl Default for Map {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(inner) => f
                .debug_map()
                .entries(inner.entries.iter().map(|(k, v)| (k.to_string(), v)))
                .finish(),
            Err(_) => write!(f, "Map(@{:#x}, borrowed)", self.addr()),
        }
    }
}

/// A shared sequence. Sequences are never registered; they encode
/// element-wise.
#[derive(Clone, Default)]
pub struct List(Rc<RefCell<Vec<Value>>>);

impl List {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        List(Rc::new(RefCell::new(items)))
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.0.borrow_mut().push(value.into());
    }

    /// Replace the element at `index`; returns false when out of range.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> bool {
        match self.0.borrow_mut().get_mut(index) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => false,
        }
    }

    /// Remove every element. Elements are dropped after the borrow ends, so
    /// a list holding itself can be cleared.
    pub fn clear(&self) {
        let items = std::mem::take(&mut *self.0.borrow_mut());
        drop(items);
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }

    pub fn ptr_eq(&self, other: &List) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn cell(&self) -> &RefCell<Vec<Value>> {
        &self.0
    }
}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(items) => f.debug_list().entries(items.iter()).finish(),
            Err(_) => f.write_str("List(borrowed)"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Str(value.clone())
    }
}

impl From<List> for Value {
    fn from(value: List) -> Self {
        Value::List(value)
    }
}

impl From<Map> for Value {
    fn from(value: Map) -> Self {
        Value::Map(value)
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Value::Object(value)
    }
}

impl<T: Any> From<Rc<RefCell<T>>> for Value {
    fn from(value: Rc<RefCell<T>>) -> Self {
        Value::Object(Object::from_rc(value))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::List(List::from_vec(value.into_iter().map(Into::into).collect()))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Checked conversion out of a [`Value`], used wherever a host field or
/// method parameter has a concrete Rust type.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Option<Self>;

    /// Label used in type mismatch errors.
    fn type_label() -> String {
        std::any::type_name::<Self>().to_string()
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Option<Self> {
        Some(value)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Option<Self> {
        value.as_i64().and_then(|i| i32::try_from(i).ok())
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Float(f) => Some(f),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl FromValue for List {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::List(list) => Some(list),
            _ => None,
        }
    }
}

impl FromValue for Map {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl FromValue for Object {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

impl<T: Any> FromValue for Rc<RefCell<T>> {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(obj) => obj.downcast::<T>(),
            _ => None,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::List(list) => list.to_vec().into_iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}
