//! Weak identity registry for aggregate host values.
//!
//! Each registered map or object gets a stable integer id that stands in for
//! it in Value JSON (`{"obj": id}`). The registry never keeps its targets
//! alive: entries hold `Weak` handles and are evicted lazily once the target
//! is dropped.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Weak;

use tracing::trace;

use crate::value::{HostMap, Map, Object, Value};

enum WeakHandle {
    Object(Weak<dyn Any>),
    Map(Weak<RefCell<HostMap>>),
}

impl WeakHandle {
    fn new(value: &Value) -> Option<Self> {
        match value {
            Value::Object(object) => Some(WeakHandle::Object(object.downgrade())),
            Value::Map(map) => Some(WeakHandle::Map(map.downgrade())),
            _ => None,
        }
    }

    fn upgrade(&self) -> Option<Value> {
        match self {
            WeakHandle::Object(weak) => weak.upgrade().map(|rc| Value::Object(Object::from_any(rc))),
            WeakHandle::Map(weak) => weak.upgrade().map(|rc| Value::Map(Map::from_rc(rc))),
        }
    }

    fn is_alive(&self) -> bool {
        match self {
            WeakHandle::Object(weak) => weak.strong_count() > 0,
            WeakHandle::Map(weak) => weak.strong_count() > 0,
        }
    }
}

struct Entry {
    id: i64,
    handle: WeakHandle,
}

/// Maps aggregate identities to ids and back.
///
/// Identity is the address of the shared allocation. While an entry exists
/// its `Weak` keeps the allocation reserved, so the address cannot be reused
/// by another value until the entry is removed.
pub struct ObjectRegistry {
    by_addr: HashMap<usize, Entry>,
    by_id: HashMap<i64, usize>,
    next_id: i64,
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self {
            by_addr: HashMap::new(),
            by_id: HashMap::new(),
            next_id: 1,
        }
    }

    /// Register an aggregate and return its id.
    ///
    /// Idempotent for the same identity. Returns `None` for values that are
    /// not maps or objects.
    pub fn register(&mut self, value: &Value) -> Option<i64> {
        let addr = value.identity()?;
        if let Some(entry) = self.by_addr.get(&addr) {
            return Some(entry.id);
        }
        let handle = WeakHandle::new(value)?;
        let id = self.next_id;
        self.next_id += 1;
        self.by_addr.insert(addr, Entry { id, handle });
        self.by_id.insert(id, addr);
        trace!(id, kind = %value.kind(), "registered object");
        Some(id)
    }

    /// Remove a value's entry if present.
    pub fn unregister(&mut self, value: &Value) -> bool {
        let Some(addr) = value.identity() else {
            return false;
        };
        match self.by_addr.remove(&addr) {
            Some(entry) => {
                self.by_id.remove(&entry.id);
                true
            }
            None => false,
        }
    }

    /// Id of a registered value, evicting the entry if its target is gone.
    pub fn lookup(&mut self, value: &Value) -> Option<i64> {
        let addr = value.identity()?;
        let entry = self.by_addr.get(&addr)?;
        if entry.handle.is_alive() {
            Some(entry.id)
        } else {
            self.evict(addr);
            None
        }
    }

    /// Live value for an id, evicting the entry if its target is gone.
    pub fn get(&mut self, id: i64) -> Option<Value> {
        let addr = *self.by_id.get(&id)?;
        let value = self.by_addr.get(&addr).and_then(|entry| entry.handle.upgrade());
        if value.is_none() {
            self.evict(addr);
        }
        value
    }

    /// Number of entries, including ones not yet evicted.
    pub fn len(&self) -> usize {
        self.by_addr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_addr.is_empty()
    }

    /// Evict every entry whose target has been dropped. Returns the count.
    pub fn purge(&mut self) -> usize {
        let dead: Vec<usize> = self
            .by_addr
            .iter()
            .filter(|(_, entry)| !entry.handle.is_alive())
            .map(|(addr, _)| *addr)
            .collect();
        for addr in &dead {
            self.evict(*addr);
        }
        dead.len()
    }

    fn evict(&mut self, addr: usize) {
        if let Some(entry) = self.by_addr.remove(&addr) {
            self.by_id.remove(&entry.id);
            trace!(id = entry.id, "evicted reclaimed object");
        }
    }
}
