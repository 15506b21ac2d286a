use std::collections::BTreeMap;

use changetracker_path::{Access, Path};
use serde_json::Value as Json;

use crate::priority::Priority;
use crate::value::Value;

/// String properties attached to a variable.
pub type Properties = BTreeMap<String, String>;

/// A tracked node: either a root bound to a host value, or a child whose
/// value is derived from its parent through a path.
#[derive(Debug, Clone)]
pub struct Variable {
    pub(crate) id: i64,
    pub(crate) parent_id: i64,
    pub(crate) child_ids: Vec<i64>,
    pub(crate) active: bool,
    pub(crate) access: Access,
    pub(crate) properties: Properties,
    pub(crate) property_priorities: BTreeMap<String, Priority>,
    pub(crate) path: Path,
    pub(crate) value_priority: Priority,
    pub(crate) value: Value,
    pub(crate) value_json: Option<Json>,
    pub(crate) wrapper_value: Option<Value>,
    pub(crate) wrapper_json: Option<Json>,
}

impl Variable {
    pub(crate) fn new(id: i64, parent_id: i64) -> Self {
        Self {
            id,
            parent_id,
            child_ids: Vec::new(),
            active: true,
            access: Access::ReadWrite,
            properties: Properties::new(),
            property_priorities: BTreeMap::new(),
            path: Path::new(),
            value_priority: Priority::Medium,
            value: Value::Null,
            value_json: None,
            wrapper_value: None,
            wrapper_json: None,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    /// Parent id, `0` for roots.
    pub fn parent_id(&self) -> i64 {
        self.parent_id
    }

    pub fn is_root(&self) -> bool {
        self.parent_id == 0
    }

    /// Child ids in creation order.
    pub fn child_ids(&self) -> &[i64] {
        &self.child_ids
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn is_readable(&self) -> bool {
        self.access.is_readable()
    }

    pub fn is_writable(&self) -> bool {
        self.access.is_writable()
    }

    pub fn is_action(&self) -> bool {
        self.access == Access::Action
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn property_priority(&self, name: &str) -> Priority {
        self.property_priorities.get(name).copied().unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn value_priority(&self) -> Priority {
        self.value_priority
    }

    /// Cached value from the last resolution.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Cached Value JSON encoding; `None` until a readable variable is encoded.
    pub fn value_json(&self) -> Option<&Json> {
        self.value_json.as_ref()
    }

    pub fn wrapper_value(&self) -> Option<&Value> {
        self.wrapper_value.as_ref()
    }

    pub fn wrapper_json(&self) -> Option<&Json> {
        self.wrapper_json.as_ref()
    }

    /// Value children navigate from: the wrapper when present, else the value.
    pub fn navigation_value(&self) -> &Value {
        self.wrapper_value.as_ref().unwrap_or(&self.value)
    }
}
