//! Per-type capability tables.
//!
//! Host types opt into navigation by registering their fields and methods
//! with a [`TypeRegistry`]. The registry stores type-erased accessors keyed
//! by the `TypeId` of the `RefCell<T>` an [`Object`] wraps.
//!
//! # Example
//!
//! ```
//! use changetracker::{Object, TypeRegistry};
//!
//! struct Person {
//!     name: String,
//!     age: i64,
//! }
//!
//! let mut types = TypeRegistry::new();
//! types
//!     .register::<Person>("Person")
//!     .field_mut("Name", |p| p.name.clone(), |p, v: String| p.name = v)
//!     .field("Age", |p| p.age)
//!     .getter("GetName", |p| p.name.clone())
//!     .setter("SetAge", |p, age: i64| p.age = age);
//!
//! let alice = Object::new(Person { name: "Alice".into(), age: 30 });
//! let info = types.info_for(&alice).unwrap();
//! assert_eq!(info.name(), "Person");
//! assert!(info.field("Name").is_some());
//! assert!(info.method("SetAge").is_some());
//! ```

use std::any::{Any, TypeId};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;

use crate::error::ResolveError;
use crate::value::{FromValue, Object, Value};

type FieldGetter = Box<dyn Fn(&dyn Any) -> Result<Value, ResolveError>>;
type FieldSetter = Box<dyn Fn(&dyn Any, Value) -> Result<(), ResolveError>>;
type MethodInvoker = Box<dyn Fn(&dyn Any, Vec<Value>) -> Result<Vec<Value>, ResolveError>>;

/// Receiver form a method is declared on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiver {
    /// Callable on the value itself (`&T`).
    Shared,
    /// Callable only through the addressable form (`&mut T`).
    Exclusive,
}

enum FieldAccess {
    Hidden,
    ReadOnly(FieldGetter),
    ReadWrite(FieldGetter, FieldSetter),
}

pub struct FieldInfo {
    name: String,
    access: FieldAccess,
}

impl FieldInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_accessible(&self) -> bool {
        !matches!(self.access, FieldAccess::Hidden)
    }

    pub fn is_settable(&self) -> bool {
        matches!(self.access, FieldAccess::ReadWrite(..))
    }

    pub(crate) fn get(&self, cell: &dyn Any) -> Result<Value, ResolveError> {
        match &self.access {
            FieldAccess::Hidden => Err(ResolveError::NotAccessible(self.name.clone())),
            FieldAccess::ReadOnly(get) | FieldAccess::ReadWrite(get, _) => get(cell),
        }
    }

    pub(crate) fn set(&self, cell: &dyn Any, value: Value) -> Result<(), ResolveError> {
        match &self.access {
            FieldAccess::Hidden => Err(ResolveError::NotAccessible(self.name.clone())),
            FieldAccess::ReadOnly(_) => Err(ResolveError::NotSettable(self.name.clone())),
            FieldAccess::ReadWrite(_, set) => set(cell, value),
        }
    }
}

pub struct MethodInfo {
    name: String,
    receiver: Receiver,
    params: usize,
    returns: usize,
    invoke: MethodInvoker,
}

impl MethodInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn receiver(&self) -> Receiver {
        self.receiver
    }

    pub fn params(&self) -> usize {
        self.params
    }

    pub fn returns(&self) -> usize {
        self.returns
    }

    pub(crate) fn invoke(&self, cell: &dyn Any, args: Vec<Value>) -> Result<Vec<Value>, ResolveError> {
        (self.invoke)(cell, args)
    }
}

/// Fields and methods of one registered host type.
pub struct TypeInfo {
    name: String,
    fields: BTreeMap<String, FieldInfo>,
    shared_methods: BTreeMap<String, MethodInfo>,
    exclusive_methods: BTreeMap<String, MethodInfo>,
}

impl TypeInfo {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: BTreeMap::new(),
            shared_methods: BTreeMap::new(),
            exclusive_methods: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.get(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Look up a method, preferring the shared receiver over the exclusive one.
    pub fn method(&self, name: &str) -> Option<&MethodInfo> {
        self.shared_methods
            .get(name)
            .or_else(|| self.exclusive_methods.get(name))
    }

    fn add_field(&mut self, name: &str, access: FieldAccess) {
        self.fields.insert(
            name.to_string(),
            FieldInfo {
                name: name.to_string(),
                access,
            },
        );
    }

    fn add_method(&mut self, name: &str, receiver: Receiver, params: usize, returns: usize, invoke: MethodInvoker) {
        let info = MethodInfo {
            name: name.to_string(),
            receiver,
            params,
            returns,
            invoke,
        };
        let table = match receiver {
            Receiver::Shared => &mut self.shared_methods,
            Receiver::Exclusive => &mut self.exclusive_methods,
        };
        table.insert(name.to_string(), info);
    }
}

/// Capability tables for every navigable host type.
#[derive(Default)]
pub struct TypeRegistry {
    types: HashMap<TypeId, TypeInfo>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the table for `T`. Re-registering replaces the
    /// previous table.
    pub fn register<T: Any>(&mut self, name: &str) -> TypeBuilder<'_, T> {
        let id = TypeId::of::<RefCell<T>>();
        let info = self.types.entry(id).or_insert_with(|| TypeInfo::new(name));
        *info = TypeInfo::new(name);
        TypeBuilder {
            info,
            _marker: PhantomData,
        }
    }

    pub fn contains<T: Any>(&self) -> bool {
        self.types.contains_key(&TypeId::of::<RefCell<T>>())
    }

    pub fn info_for(&self, object: &Object) -> Option<&TypeInfo> {
        self.types.get(&object.cell_type_id())
    }

    pub fn type_name_of(&self, object: &Object) -> Option<&str> {
        self.info_for(object).map(TypeInfo::name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

fn cell<T: Any>(any: &dyn Any) -> Result<&RefCell<T>, ResolveError> {
    any.downcast_ref::<RefCell<T>>()
        .ok_or_else(|| ResolveError::UnsupportedContainer {
            element: String::new(),
            container: std::any::type_name::<T>().to_string(),
        })
}

fn read<T: Any>(any: &dyn Any) -> Result<Ref<'_, T>, ResolveError> {
    cell::<T>(any)?
        .try_borrow()
        .map_err(|_| ResolveError::AlreadyBorrowed)
}

fn write<T: Any>(any: &dyn Any) -> Result<RefMut<'_, T>, ResolveError> {
    cell::<T>(any)?
        .try_borrow_mut()
        .map_err(|_| ResolveError::AlreadyBorrowed)
}

fn field_getter<F>(f: F) -> FieldGetter
where
    F: Fn(&dyn Any) -> Result<Value, ResolveError> + 'static,
{
    Box::new(f)
}

fn field_setter<F>(f: F) -> FieldSetter
where
    F: Fn(&dyn Any, Value) -> Result<(), ResolveError> + 'static,
{
    Box::new(f)
}

fn invoker<F>(f: F) -> MethodInvoker
where
    F: Fn(&dyn Any, Vec<Value>) -> Result<Vec<Value>, ResolveError> + 'static,
{
    Box::new(f)
}

fn convert<A: FromValue>(value: Value) -> Result<A, ResolveError> {
    let found = value.kind();
    A::from_value(value).ok_or_else(|| ResolveError::TypeMismatch {
        expected: A::type_label(),
        found,
    })
}

fn single_arg(method: &str, args: Vec<Value>) -> Result<Value, ResolveError> {
    let found = args.len();
    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (Some(arg), None) => Ok(arg),
        _ => Err(ResolveError::MethodArity {
            method: method.to_string(),
            expected: 1,
            found,
        }),
    }
}

/// Typed builder returned by [`TypeRegistry::register`].
pub struct TypeBuilder<'a, T> {
    info: &'a mut TypeInfo,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Any> TypeBuilder<'a, T> {
    /// Read-only field.
    pub fn field<F, G>(self, name: &str, get: G) -> Self
    where
        F: Into<Value>,
        G: Fn(&T) -> F + 'static,
    {
        let getter = field_getter(move |any| Ok(get(&*read::<T>(any)?).into()));
        self.info.add_field(name, FieldAccess::ReadOnly(getter));
        self
    }

    /// Readable and assignable field.
    pub fn field_mut<F, G, S>(self, name: &str, get: G, set: S) -> Self
    where
        F: Into<Value> + FromValue,
        G: Fn(&T) -> F + 'static,
        S: Fn(&mut T, F) + 'static,
    {
        let getter = field_getter(move |any| Ok(get(&*read::<T>(any)?).into()));
        let setter = field_setter(move |any, value| {
            let value = convert::<F>(value)?;
            set(&mut *write::<T>(any)?, value);
            Ok(())
        });
        self.info.add_field(name, FieldAccess::ReadWrite(getter, setter));
        self
    }

    /// Field that exists but cannot be navigated into.
    pub fn hidden_field(self, name: &str) -> Self {
        self.info.add_field(name, FieldAccess::Hidden);
        self
    }

    /// Zero-argument method on the shared receiver.
    pub fn getter<R, M>(self, name: &str, method: M) -> Self
    where
        R: Into<Value>,
        M: Fn(&T) -> R + 'static,
    {
        let invoke = invoker(move |any, _| Ok(vec![method(&*read::<T>(any)?).into()]));
        self.info.add_method(name, Receiver::Shared, 0, 1, invoke);
        self
    }

    /// Zero-argument method on the exclusive receiver.
    pub fn getter_mut<R, M>(self, name: &str, method: M) -> Self
    where
        R: Into<Value>,
        M: Fn(&mut T) -> R + 'static,
    {
        let invoke = invoker(move |any, _| Ok(vec![method(&mut *write::<T>(any)?).into()]));
        self.info.add_method(name, Receiver::Exclusive, 0, 1, invoke);
        self
    }

    /// One-argument method without a result.
    pub fn setter<A, M>(self, name: &str, method: M) -> Self
    where
        A: FromValue,
        M: Fn(&mut T, A) + 'static,
    {
        let method_name = name.to_string();
        let invoke = invoker(move |any, args| {
            let arg = convert::<A>(single_arg(&method_name, args)?)?;
            method(&mut *write::<T>(any)?, arg);
            Ok(Vec::new())
        });
        self.info.add_method(name, Receiver::Exclusive, 1, 0, invoke);
        self
    }

    /// One-argument method with a result.
    pub fn setter_returning<A, R, M>(self, name: &str, method: M) -> Self
    where
        A: FromValue,
        R: Into<Value>,
        M: Fn(&mut T, A) -> R + 'static,
    {
        let method_name = name.to_string();
        let invoke = invoker(move |any, args| {
            let arg = convert::<A>(single_arg(&method_name, args)?)?;
            Ok(vec![method(&mut *write::<T>(any)?, arg).into()])
        });
        self.info.add_method(name, Receiver::Exclusive, 1, 1, invoke);
        self
    }

    /// Zero-argument method without a result.
    pub fn action<M>(self, name: &str, method: M) -> Self
    where
        M: Fn(&mut T) + 'static,
    {
        let invoke = invoker(move |any, _| {
            method(&mut *write::<T>(any)?);
            Ok(Vec::new())
        });
        self.info.add_method(name, Receiver::Exclusive, 0, 0, invoke);
        self
    }

    /// Untyped method with an explicit signature. The payload is always
    /// borrowed mutably while `method` runs.
    pub fn method<M>(self, name: &str, receiver: Receiver, params: usize, returns: usize, method: M) -> Self
    where
        M: Fn(&mut T, Vec<Value>) -> Result<Vec<Value>, ResolveError> + 'static,
    {
        let invoke = invoker(move |any, args| method(&mut *write::<T>(any)?, args));
        self.info.add_method(name, receiver, params, returns, invoke);
        self
    }
}
