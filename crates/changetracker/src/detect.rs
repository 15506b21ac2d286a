//! Change detection over the variable tree.

use tracing::{debug, trace, warn};

use crate::codec::json_equal;
use crate::error::TrackerError;
use crate::tracker::Tracker;

impl Tracker {
    /// Re-resolve every active readable variable and record the ones whose
    /// encoding changed.
    ///
    /// Roots are visited in ascending id order, children depth-first in
    /// creation order. An inactive variable hides its whole subtree. A
    /// variable that fails to resolve counts as unchanged. Pending changes
    /// accumulate until [`get_changes`](Tracker::get_changes). Registry
    /// entries whose targets were dropped are swept at the end of the round.
    ///
    /// # Errors
    ///
    /// A codec failure aborts the round.
    pub fn detect_changes(&mut self) -> Result<bool, TrackerError> {
        let roots: Vec<i64> = self.root_ids.iter().copied().collect();
        let mut changed = false;
        for id in roots {
            changed |= self.check_variable(id)?;
        }
        self.registry_mut().purge();
        if changed {
            debug!("detected changes");
        }
        Ok(changed)
    }

    fn check_variable(&mut self, id: i64) -> Result<bool, TrackerError> {
        let Some(variable) = self.variables.get(&id) else {
            return Ok(false);
        };
        if !variable.is_active() {
            return Ok(false);
        }
        let children = variable.child_ids.clone();
        let mut changed = false;

        if variable.is_readable() {
            match self.compute_value(id) {
                Ok(current) => changed = self.compare_and_store(id, current)?,
                Err(err) => trace!(id, error = %err, "navigation failed, treating as unchanged"),
            }
        }

        for child in children {
            changed |= self.check_variable(child)?;
        }
        Ok(changed)
    }

    fn compare_and_store(&mut self, id: i64, current: crate::Value) -> Result<bool, TrackerError> {
        let json = self.encode(&current).map_err(|err| {
            warn!(id, error = %err, "encoding failed, aborting change detection");
            err
        })?;
        let variable = self.variable_mut(id)?;
        if variable
            .value_json
            .as_ref()
            .is_some_and(|cached| json_equal(cached, &json))
        {
            return Ok(false);
        }
        variable.value = current;
        variable.value_json = Some(json);
        self.pending.record_value(id);
        self.update_wrapper(id)?;
        self.refresh_type(id)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::{List, Map, Properties, Tracker, Value};

    #[test]
    fn test_root_list_mutation_is_detected() {
        let mut t = Tracker::new();
        let list = List::from_vec(vec![Value::Int(1)]);
        let root = t.create_root(list.clone()).unwrap();
        assert!(!t.detect_changes().unwrap());
        list.push(2i64);
        assert!(t.detect_changes().unwrap());
        let changes = t.get_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].variable_id, root);
        assert!(changes[0].value_changed);
    }

    #[test]
    fn test_changes_accumulate_until_taken() {
        let mut t = Tracker::new();
        let list = List::new();
        let root = t
            .create_variable(Value::from(list.clone()), 0, "", &Properties::new())
            .unwrap();
        list.push("a");
        t.detect_changes().unwrap();
        list.push("b");
        t.detect_changes().unwrap();
        let changes = t.get_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].variable_id, root);
        assert!(t.get_changes().is_empty());
    }

    #[test]
    fn test_nested_array_aborts_detection() {
        let mut t = Tracker::new();
        let list = List::new();
        t.create_root(list.clone()).unwrap();
        list.push(vec![1i64]);
        assert!(matches!(
            t.detect_changes(),
            Err(crate::TrackerError::Codec(crate::CodecError::NestedArrayNotAllowed { index: 0 }))
        ));
    }

    #[test]
    fn test_replaced_aggregates_are_swept() {
        let mut t = Tracker::new();
        let outer = Map::new();
        outer.insert("inner", Map::new());
        let root = t.create_root(outer.clone()).unwrap();
        let inner = t.create_child(root, "inner").unwrap();
        assert_eq!(t.registry().len(), 2);

        outer.insert("inner", Map::new());
        assert!(t.detect_changes().unwrap());
        assert_eq!(t.get_changes()[0].variable_id, inner);
        assert_eq!(t.registry().len(), 2);
    }
}
