//! Change tracking for in-memory host objects.
//!
//! A [`Tracker`] holds a forest of variables. Roots are bound to host values;
//! children reach into their parent's value through a path such as
//! `Address.City`, `Tags.0` or `GetName()`. Each round of
//! [`Tracker::detect_changes`] re-resolves the readable variables, encodes
//! them to Value JSON (aggregates become `{"obj": id}` references) and
//! compares against the cached encoding. [`Tracker::get_changes`] then
//! returns the deltas ordered high, medium, low priority.
//!
//! # Example
//!
//! ```
//! use changetracker::{Object, Priority, ReflectResolver, Tracker, TypeRegistry, Value};
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
//!     .field_mut("Age", |p| p.age, |p, v: i64| p.age = v)
//!     .getter("GetName", |p| p.name.clone());
//!
//! let mut tracker = Tracker::with_resolver(ReflectResolver::new(types));
//! let alice = Object::new(Person { name: "Alice".into(), age: 30 });
//! let root = tracker.create_root(alice.clone()).unwrap();
//! let age = tracker.create_child(root, "Age?priority=high").unwrap();
//! let name = tracker.create_child(root, "GetName()?access=r").unwrap();
//! assert_eq!(tracker.get(name).unwrap(), Value::from("Alice"));
//!
//! alice.with_mut(|p: &mut Person| p.age = 31);
//! assert!(tracker.detect_changes().unwrap());
//!
//! let changes = tracker.get_changes();
//! assert_eq!(changes.len(), 1);
//! assert_eq!(changes[0].variable_id, age);
//! assert_eq!(changes[0].priority, Priority::High);
//! assert!(changes[0].value_changed);
//! ```

pub mod change;
pub use change::Change;

pub mod codec;
pub use codec::ObjectRef;

mod detect;

pub mod error;
pub use error::{CodecError, ResolveError, TrackerError};

pub mod priority;
pub use priority::{parse_property_name, Priority};

pub mod reflect;
pub use reflect::{FieldInfo, MethodInfo, Receiver, TypeBuilder, TypeInfo, TypeRegistry};

pub mod registry;
pub use registry::ObjectRegistry;

pub mod resolver;
pub use resolver::{ReflectResolver, Resolver};

pub mod tracker;
pub use tracker::Tracker;

pub mod value;
pub use value::{FromValue, KeyKind, Kind, List, Map, MapKey, Object, Value};

pub mod variable;
pub use variable::{Properties, Variable};

pub use changetracker_path::{Access, Path, PathElement, PathError};
