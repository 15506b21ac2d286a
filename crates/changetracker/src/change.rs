use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::priority::Priority;
use crate::variable::Variable;

/// One entry of a change report: a variable's value and/or properties that
/// changed at a given priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub variable_id: i64,
    pub priority: Priority,
    pub value_changed: bool,
    pub properties_changed: Vec<String>,
}

/// Pending change markers, cleared when a report is taken.
#[derive(Debug, Default)]
pub(crate) struct PendingChanges {
    values: BTreeSet<i64>,
    properties: BTreeMap<i64, BTreeSet<String>>,
}

impl PendingChanges {
    pub(crate) fn record_value(&mut self, id: i64) {
        self.values.insert(id);
    }

    pub(crate) fn record_property(&mut self, id: i64, name: &str) {
        self.properties.entry(id).or_default().insert(name.to_string());
    }

    pub(crate) fn forget(&mut self, id: i64) {
        self.values.remove(&id);
        self.properties.remove(&id);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.values.is_empty() && self.properties.is_empty()
    }

    /// Build the priority-ordered report and clear all markers.
    ///
    /// Changed properties are grouped by their own priority. The value
    /// change joins the group at the variable's value priority. Blocks are
    /// emitted high, medium, low; within a block variables ascend by id.
    pub(crate) fn take_sorted(&mut self, variables: &BTreeMap<i64, Variable>) -> Vec<Change> {
        let values = std::mem::take(&mut self.values);
        let mut properties = std::mem::take(&mut self.properties);
        let ids: BTreeSet<i64> = values.iter().chain(properties.keys()).copied().collect();

        let mut blocks: [Vec<Change>; 3] = Default::default();
        for id in ids {
            let Some(variable) = variables.get(&id) else {
                continue;
            };
            let mut groups: BTreeMap<Priority, Vec<String>> = BTreeMap::new();
            for name in properties.remove(&id).unwrap_or_default() {
                groups.entry(variable.property_priority(&name)).or_default().push(name);
            }
            let value_changed = values.contains(&id);
            for (block, priority) in blocks.iter_mut().zip(Priority::REPORT_ORDER) {
                let value_changed = value_changed && variable.value_priority == priority;
                let properties_changed = groups.remove(&priority).unwrap_or_default();
                if value_changed || !properties_changed.is_empty() {
                    block.push(Change {
                        variable_id: id,
                        priority,
                        value_changed,
                        properties_changed,
                    });
                }
            }
        }
        blocks.concat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variable(id: i64, value_priority: Priority, props: &[(&str, Priority)]) -> Variable {
        let mut v = Variable::new(id, 0);
        v.value_priority = value_priority;
        for (name, priority) in props {
            v.properties.insert(name.to_string(), "x".into());
            v.property_priorities.insert(name.to_string(), *priority);
        }
        v
    }

    #[test]
    fn test_value_merges_with_same_priority_properties() {
        let mut vars = BTreeMap::new();
        vars.insert(
            1,
            variable(1, Priority::High, &[("a", Priority::High), ("b", Priority::Low)]),
        );
        let mut pending = PendingChanges::default();
        pending.record_value(1);
        pending.record_property(1, "b");
        pending.record_property(1, "a");
        let report = pending.take_sorted(&vars);
        assert_eq!(
            report,
            vec![
                Change {
                    variable_id: 1,
                    priority: Priority::High,
                    value_changed: true,
                    properties_changed: vec!["a".into()],
                },
                Change {
                    variable_id: 1,
                    priority: Priority::Low,
                    value_changed: false,
                    properties_changed: vec!["b".into()],
                },
            ]
        );
        assert!(pending.is_empty());
    }

    #[test]
    fn test_blocks_ordered_by_priority_then_id() {
        let mut vars = BTreeMap::new();
        vars.insert(1, variable(1, Priority::Low, &[]));
        vars.insert(2, variable(2, Priority::High, &[]));
        vars.insert(3, variable(3, Priority::High, &[]));
        vars.insert(4, variable(4, Priority::Medium, &[]));
        let mut pending = PendingChanges::default();
        for id in [4, 3, 2, 1] {
            pending.record_value(id);
        }
        let order: Vec<(i64, Priority)> = pending
            .take_sorted(&vars)
            .iter()
            .map(|c| (c.variable_id, c.priority))
            .collect();
        assert_eq!(
            order,
            vec![
                (2, Priority::High),
                (3, Priority::High),
                (4, Priority::Medium),
                (1, Priority::Low)
            ]
        );
    }

    #[test]
    fn test_removed_property_reports_medium() {
        let mut vars = BTreeMap::new();
        vars.insert(1, variable(1, Priority::Medium, &[]));
        let mut pending = PendingChanges::default();
        pending.record_property(1, "gone");
        let report = pending.take_sorted(&vars);
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].priority, Priority::Medium);
        assert!(!report[0].value_changed);
    }

    #[test]
    fn test_unknown_ids_are_dropped() {
        let mut pending = PendingChanges::default();
        pending.record_value(9);
        assert!(pending.take_sorted(&BTreeMap::new()).is_empty());
        assert!(pending.is_empty());
    }

    #[test]
    fn test_serialize() {
        let change = Change {
            variable_id: 5,
            priority: Priority::Low,
            value_changed: true,
            properties_changed: vec![],
        };
        assert_eq!(
            serde_json::to_value(&change).unwrap(),
            serde_json::json!({
                "variable_id": 5,
                "priority": "low",
                "value_changed": true,
                "properties_changed": []
            })
        );
    }
}
