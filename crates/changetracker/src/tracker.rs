//! The variable tree and its lifecycle.

use std::collections::{BTreeMap, BTreeSet};

use changetracker_path::{
    parse_valid_path, split_query, validate_access_path, Access, PathElement,
};
use serde_json::Value as Json;
use tracing::{debug, trace};

use crate::change::{Change, PendingChanges};
use crate::codec::{self, is_object_ref};
use crate::error::{CodecError, ResolveError, TrackerError};
use crate::priority::{parse_property_name, Priority};
use crate::registry::ObjectRegistry;
use crate::resolver::{ReflectResolver, Resolver};
use crate::value::Value;
use crate::variable::{Properties, Variable};

/// Tracks a forest of variables bound to host values and reports what
/// changed between detection rounds.
///
/// Single-threaded: host values are `Rc`-shared, so a tracker never crosses
/// threads.
pub struct Tracker {
    pub(crate) variables: BTreeMap<i64, Variable>,
    pub(crate) root_ids: BTreeSet<i64>,
    pub(crate) pending: PendingChanges,
    registry: ObjectRegistry,
    resolver: Box<dyn Resolver>,
    next_id: i64,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracker {
    /// Tracker with a [`ReflectResolver`] over an empty type registry.
    pub fn new() -> Self {
        Self::with_resolver(ReflectResolver::default())
    }

    pub fn with_resolver(resolver: impl Resolver + 'static) -> Self {
        Self {
            variables: BTreeMap::new(),
            root_ids: BTreeSet::new(),
            pending: PendingChanges::default(),
            registry: ObjectRegistry::new(),
            resolver: Box::new(resolver),
            next_id: 1,
        }
    }

    pub fn resolver(&self) -> &dyn Resolver {
        self.resolver.as_ref()
    }

    /// Create a variable.
    ///
    /// With `parent_id == 0` the variable is a root bound to `value`.
    /// Otherwise `value` must be null and the variable's value is derived
    /// from the parent through `path`. A `?key=value&...` suffix on `path`
    /// adds properties, overriding `properties`.
    ///
    /// # Errors
    ///
    /// Fails without touching the tree if the parent is unknown, a child is
    /// given a value, the path or access is invalid, or the access does not
    /// fit the path's last element. A codec failure while caching the
    /// initial encoding removes the half-built variable and is returned.
    pub fn create_variable(
        &mut self,
        value: Value,
        parent_id: i64,
        path: &str,
        properties: &Properties,
    ) -> Result<i64, TrackerError> {
        if parent_id != 0 {
            if !self.variables.contains_key(&parent_id) {
                return Err(TrackerError::InvalidArgument(format!(
                    "parent variable {parent_id} does not exist"
                )));
            }
            if !value.is_null() {
                return Err(TrackerError::InvalidArgument(
                    "a child variable derives its value from its parent and cannot be given one"
                        .to_string(),
                ));
            }
        }

        let (path_part, query) = split_query(path);
        let mut props = Properties::new();
        let mut priorities = BTreeMap::new();
        for (name, prop) in properties.iter().chain(query.iter().map(|(k, v)| (k, v))) {
            let (base, priority) = parse_property_name(name);
            props.insert(base.to_string(), prop.clone());
            priorities.insert(base.to_string(), priority);
        }
        let path_text = if path_part.is_empty() {
            props.get("path").cloned().unwrap_or_default()
        } else {
            path_part.to_string()
        };
        let parsed = parse_valid_path(&path_text)?;
        let access = match props.get("access") {
            Some(access) => access.parse::<Access>()?,
            None => Access::ReadWrite,
        };
        validate_access_path(access, &parsed)?;
        if !path_text.is_empty() {
            props.insert("path".to_string(), path_text);
        }
        let value_priority = props
            .get("priority")
            .map_or(Priority::Medium, |p| Priority::parse(p));
        let create_tag = props.get("create").cloned();
        let had_type = props.get("type").is_some_and(|t| !t.is_empty());

        let id = self.next_id;
        self.next_id += 1;
        let mut variable = Variable::new(id, parent_id);
        variable.access = access;
        variable.properties = props;
        variable.property_priorities = priorities;
        variable.path = parsed;
        variable.value_priority = value_priority;
        if parent_id == 0 {
            variable.value = value.clone();
            self.root_ids.insert(id);
        } else if let Some(parent) = self.variables.get_mut(&parent_id) {
            parent.child_ids.push(id);
        }
        let computes = parent_id != 0 && !variable.is_action();
        self.variables.insert(id, variable);

        if computes {
            match self.compute_value(id) {
                Ok(resolved) => self.variable_mut(id)?.value = resolved,
                Err(err) => trace!(id, error = %err, "initial value unresolved"),
            }
        }

        if let Err(err) = self.finish_create(id, value, create_tag.as_deref(), had_type) {
            self.destroy_variable(id);
            return Err(err);
        }
        debug!(id, parent_id, path = %path_part, access = %access, "created variable");
        Ok(id)
    }

    fn finish_create(
        &mut self,
        id: i64,
        seed: Value,
        create_tag: Option<&str>,
        had_type: bool,
    ) -> Result<(), TrackerError> {
        if let Some(tag) = create_tag {
            let created = {
                let variable = self.variable_ref(id)?;
                self.resolver.create_value(variable, tag, seed)
            };
            if !created.is_null() {
                self.set_property(id, "type", tag)?;
                self.variable_mut(id)?.value = created;
            }
        }
        if self.variable_ref(id)?.is_readable() {
            let current = self.variable_ref(id)?.value.clone();
            let json = self.encode(&current)?;
            self.variable_mut(id)?.value_json = Some(json);
        }
        self.update_wrapper(id)?;
        self.refresh_type(id)?;
        let variable = self.variable_ref(id)?;
        if !had_type && variable.property("type").is_some_and(|t| !t.is_empty()) {
            self.pending.record_property(id, "type");
        }
        Ok(())
    }

    /// Root bound directly to `value`.
    pub fn create_root(&mut self, value: impl Into<Value>) -> Result<i64, TrackerError> {
        self.create_variable(value.into(), 0, "", &Properties::new())
    }

    /// Child of `parent_id` at `path` (which may carry a query suffix).
    pub fn create_child(&mut self, parent_id: i64, path: &str) -> Result<i64, TrackerError> {
        self.create_variable(Value::Null, parent_id, path, &Properties::new())
    }

    /// Remove a variable. Unknown ids are ignored; children stay in place.
    pub fn destroy_variable(&mut self, id: i64) {
        let Some(variable) = self.variables.remove(&id) else {
            return;
        };
        if variable.is_root() {
            self.root_ids.remove(&id);
        } else if let Some(parent) = self.variables.get_mut(&variable.parent_id) {
            parent.child_ids.retain(|child| *child != id);
        }
        if let Some(wrapper) = &variable.wrapper_value {
            self.registry.unregister(wrapper);
        }
        self.registry.unregister(&variable.value);
        self.pending.forget(id);
        debug!(id, "destroyed variable");
    }

    pub fn variable(&self, id: i64) -> Option<&Variable> {
        self.variables.get(&id)
    }

    /// All variables in ascending id order.
    pub fn variables(&self) -> Vec<&Variable> {
        self.variables.values().collect()
    }

    /// Root variables in ascending id order.
    pub fn root_variables(&self) -> Vec<&Variable> {
        self.root_ids
            .iter()
            .filter_map(|id| self.variables.get(id))
            .collect()
    }

    /// Children of `parent_id` in creation order.
    pub fn children(&self, parent_id: i64) -> Vec<&Variable> {
        self.variables.get(&parent_id).map_or_else(Vec::new, |parent| {
            parent
                .child_ids
                .iter()
                .filter_map(|id| self.variables.get(id))
                .collect()
        })
    }

    pub fn parent(&self, id: i64) -> Option<&Variable> {
        let variable = self.variables.get(&id)?;
        if variable.is_root() {
            return None;
        }
        self.variables.get(&variable.parent_id)
    }

    /// Enable or disable change detection for a variable and its subtree.
    pub fn set_active(&mut self, id: i64, active: bool) -> Result<(), TrackerError> {
        self.variable_mut(id)?.active = active;
        Ok(())
    }

    /// Mark the value and every current property as changed.
    pub fn change_all(&mut self, id: i64) -> Result<(), TrackerError> {
        let names: Vec<String> = self.variable_ref(id)?.properties.keys().cloned().collect();
        self.pending.record_value(id);
        for name in names {
            self.pending.record_property(id, &name);
        }
        Ok(())
    }

    pub fn record_property_change(&mut self, id: i64, name: &str) {
        self.pending.record_property(id, name);
    }

    /// Read the variable's current value through its path.
    ///
    /// # Errors
    ///
    /// [`TrackerError::NotReadable`] for write-only and action variables and
    /// for paths ending in a setter call; navigation errors otherwise.
    pub fn get(&self, id: i64) -> Result<Value, TrackerError> {
        let variable = self.variable_ref(id)?;
        if !variable.is_readable() || variable.path.last().is_some_and(PathElement::is_setter) {
            return Err(TrackerError::NotReadable(id));
        }
        self.compute_value(id)
    }

    /// Write `value` through the variable's path.
    ///
    /// Roots and path-less variables replace their cached value. Otherwise
    /// the last path element decides: a setter call receives `value`, an
    /// action ending in a getter call invokes the method, anything else is
    /// assigned. On success the cached value and encoding follow the write,
    /// so detection does not report the host's own assignment.
    pub fn set(&mut self, id: i64, value: Value) -> Result<(), TrackerError> {
        let variable = self.variable_ref(id)?;
        if !variable.is_writable() {
            return Err(TrackerError::NotWritable(id));
        }
        let json = self.encode(&value)?;

        let variable = self.variable_ref(id)?;
        if let Some((last, prefix)) = variable.path.split_last().filter(|_| !variable.is_root()) {
            if last.is_getter() && !variable.is_action() {
                return Err(ResolveError::NotSettable(last.to_string()).into());
            }
            let parent = self
                .variables
                .get(&variable.parent_id)
                .ok_or(TrackerError::ParentNotFound {
                    id,
                    parent_id: variable.parent_id,
                })?;
            let container = self.walk(parent.navigation_value(), prefix)?;
            match last {
                PathElement::Setter(method) => self.resolver.call_with(&container, method, value.clone())?,
                PathElement::Getter(method) => self.resolver.trigger(&container, method)?,
                element => self.resolver.set(&container, element, value.clone())?,
            }
        }

        let variable = self.variable_mut(id)?;
        variable.value = value;
        variable.value_json = Some(json);
        self.update_wrapper(id)?;
        self.refresh_type(id)
    }

    /// Set a property; an empty `value` removes it.
    ///
    /// `name` may carry a `:low`, `:medium` or `:high` suffix. The `path`,
    /// `access`, `priority` and `wrapper` properties also update the
    /// variable. Invalid `path` or `access` values are rejected before
    /// anything changes.
    pub fn set_property(&mut self, id: i64, name: &str, value: &str) -> Result<(), TrackerError> {
        let (base, priority) = parse_property_name(name);
        let variable = self.variable_ref(id)?;
        let mut new_path = None;
        let mut new_access = None;
        match base {
            "path" => {
                let path = parse_valid_path(value)?;
                validate_access_path(variable.access, &path)?;
                new_path = Some(path);
            }
            "access" => {
                let access = if value.is_empty() {
                    Access::ReadWrite
                } else {
                    value.parse::<Access>()?
                };
                validate_access_path(access, &variable.path)?;
                new_access = Some(access);
            }
            _ => {}
        }

        let variable = self.variable_mut(id)?;
        if value.is_empty() {
            variable.properties.remove(base);
            variable.property_priorities.remove(base);
        } else {
            variable.properties.insert(base.to_string(), value.to_string());
            variable.property_priorities.insert(base.to_string(), priority);
        }
        if let Some(path) = new_path {
            variable.path = path;
        }
        if let Some(access) = new_access {
            variable.access = access;
        }
        if base == "priority" {
            variable.value_priority = Priority::parse(value);
        }
        self.pending.record_property(id, base);

        if base == "wrapper" {
            self.update_wrapper(id)?;
            self.refresh_type(id)?;
        }
        Ok(())
    }

    /// Take the pending changes as a priority-ordered report and clear them.
    pub fn get_changes(&mut self) -> Vec<Change> {
        self.pending.take_sorted(&self.variables)
    }

    pub fn register_object(&mut self, value: &Value) -> Option<i64> {
        self.registry.register(value)
    }

    pub fn unregister_object(&mut self, value: &Value) {
        self.registry.unregister(value);
    }

    pub fn lookup_object(&mut self, value: &Value) -> Option<i64> {
        self.registry.lookup(value)
    }

    pub fn get_object(&mut self, id: i64) -> Option<Value> {
        self.registry.get(id)
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ObjectRegistry {
        &mut self.registry
    }

    pub fn to_value_json(&mut self, value: &Value) -> Result<Json, CodecError> {
        self.encode(value)
    }

    pub fn to_value_json_bytes(&mut self, value: &Value) -> Result<Vec<u8>, CodecError> {
        codec::to_value_json_bytes(self.resolver.as_ref(), &mut self.registry, value)
    }

    pub fn from_value_json_bytes(&mut self, bytes: &[u8]) -> Result<Value, CodecError> {
        codec::from_value_json_bytes(&mut self.registry, bytes)
    }

    pub(crate) fn encode(&mut self, value: &Value) -> Result<Json, CodecError> {
        codec::to_value_json(self.resolver.as_ref(), &mut self.registry, value)
    }

    pub(crate) fn variable_ref(&self, id: i64) -> Result<&Variable, TrackerError> {
        self.variables.get(&id).ok_or(TrackerError::UnknownVariable(id))
    }

    pub(crate) fn variable_mut(&mut self, id: i64) -> Result<&mut Variable, TrackerError> {
        self.variables
            .get_mut(&id)
            .ok_or(TrackerError::UnknownVariable(id))
    }

    /// Current value without access checks: the cached value for roots,
    /// otherwise the parent's navigation value walked through the path.
    pub(crate) fn compute_value(&self, id: i64) -> Result<Value, TrackerError> {
        let variable = self.variable_ref(id)?;
        if variable.is_root() {
            return Ok(variable.value.clone());
        }
        let parent = self
            .variables
            .get(&variable.parent_id)
            .ok_or(TrackerError::ParentNotFound {
                id,
                parent_id: variable.parent_id,
            })?;
        Ok(self.walk(parent.navigation_value(), &variable.path)?)
    }

    fn walk(&self, start: &Value, path: &[PathElement]) -> Result<Value, ResolveError> {
        let mut current = start.clone();
        for element in path {
            current = match element {
                PathElement::Getter(method) => self.resolver.call(&current, method)?,
                other => self.resolver.get(&current, other)?,
            };
        }
        Ok(current)
    }

    /// Create, reuse, replace or clear the wrapper after the cached encoding
    /// changed.
    pub(crate) fn update_wrapper(&mut self, id: i64) -> Result<(), TrackerError> {
        let variable = self.variable_ref(id)?;
        let wanted = variable.property("wrapper").is_some_and(|w| !w.is_empty())
            && variable.value_json.as_ref().is_some_and(|json| !json.is_null());
        let next = if wanted {
            self.resolver
                .create_wrapper(variable)
                .filter(|wrapper| !wrapper.is_null())
        } else {
            None
        };
        let previous = variable.wrapper_value.clone();

        match (previous, next) {
            (Some(previous), Some(next)) if previous.same_identity(&next) => {}
            (previous, Some(next)) => {
                let json = self.encode(&next)?;
                if let Some(previous) = previous {
                    self.registry.unregister(&previous);
                }
                let variable = self.variable_mut(id)?;
                variable.wrapper_value = Some(next);
                variable.wrapper_json = Some(json);
            }
            (Some(previous), None) => {
                self.registry.unregister(&previous);
                let variable = self.variable_mut(id)?;
                variable.wrapper_value = None;
                variable.wrapper_json = None;
            }
            (None, None) => {}
        }
        Ok(())
    }

    /// Set the `type` property from the resolver when the navigation value
    /// encodes to an object reference.
    pub(crate) fn refresh_type(&mut self, id: i64) -> Result<(), TrackerError> {
        let variable = self.variable_ref(id)?;
        let (json, value) = match &variable.wrapper_json {
            Some(json) => (Some(json), variable.wrapper_value.as_ref()),
            None => (variable.value_json.as_ref(), Some(&variable.value)),
        };
        let (Some(json), Some(value)) = (json, value) else {
            return Ok(());
        };
        if !is_object_ref(json) {
            return Ok(());
        }
        let inferred = self
            .resolver
            .get_type(variable, value)
            .filter(|t| !t.is_empty() && variable.property("type") != Some(t.as_str()));
        match inferred {
            Some(type_name) => self.set_property(id, "type", &type_name),
            None => Ok(()),
        }
    }
}
