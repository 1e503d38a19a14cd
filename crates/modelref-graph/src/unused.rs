//! Unused object detection
//!
//! An object is used when anything in the model or report refers to it:
//!
//! - measures: referenced by a measure or calculated column, or bound in a visual
//! - columns: referenced by an expression, a relationship endpoint, or a visual
//! - tables: own a measure, are named by a table or column reference, or own a used column
//!
//! Hidden, key and reserved-prefix columns are skipped according to the
//! column rules. Lists are capped; totals are not.

use modelref_core::{fold, ObjectRef};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::graph::{DependencyGraph, NodeKind};

/// Unused measures, columns and tables, capped per kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnusedObjects {
    pub unused_measures: Vec<ObjectRef>,
    pub unused_columns: Vec<ObjectRef>,
    pub unused_tables: Vec<String>,
    pub total_unused_measures: usize,
    pub total_unused_columns: usize,
    pub total_unused_tables: usize,
}

impl UnusedObjects {
    pub fn is_empty(&self) -> bool {
        self.total_unused_measures == 0 && self.total_unused_columns == 0 && self.total_unused_tables == 0
    }

    /// Whether any list was cut short
    pub fn is_truncated(&self) -> bool {
        self.unused_measures.len() < self.total_unused_measures
            || self.unused_columns.len() < self.total_unused_columns
            || self.unused_tables.len() < self.total_unused_tables
    }
}

/// Normalized keys of everything referenced anywhere
#[derive(Debug, Default)]
struct UsedSet {
    measures: HashSet<String>,
    columns: HashSet<String>,
    tables: HashSet<String>,
}

impl UsedSet {
    fn column(&mut self, object: &ObjectRef) {
        self.columns.insert(object.normalized());
        self.tables.insert(fold(&object.table));
    }
}

impl DependencyGraph {
    /// Measures, columns and tables nothing refers to, in catalog order
    pub fn unused_objects(&self) -> UnusedObjects {
        let used = self.used_set();
        let rules = &self.rules;

        let measures: Vec<ObjectRef> = self
            .measure_order
            .iter()
            .filter_map(|key| self.nodes.get(key))
            .filter(|node| !used.measures.contains(&node.object.normalized()))
            .map(|node| node.object.clone())
            .collect();

        let columns: Vec<ObjectRef> = self
            .column_order
            .iter()
            .filter_map(|key| self.nodes.get(key))
            .filter(|node| !(rules.columns.exclude_hidden && node.is_hidden))
            .filter(|node| !(rules.columns.exclude_key && node.is_key))
            .filter(|node| !rules.columns.is_reserved(&node.object.name))
            .filter(|node| !used.columns.contains(&node.object.normalized()))
            .map(|node| node.object.clone())
            .collect();

        let tables: Vec<String> = self
            .tables
            .iter()
            .filter(|table| !used.tables.contains(&fold(table)))
            .cloned()
            .collect();

        tracing::debug!(
            measures = measures.len(),
            columns = columns.len(),
            tables = tables.len(),
            "found unused objects"
        );

        UnusedObjects {
            total_unused_measures: measures.len(),
            total_unused_columns: columns.len(),
            total_unused_tables: tables.len(),
            unused_measures: measures.into_iter().take(rules.limits.unused_measures).collect(),
            unused_columns: columns.into_iter().take(rules.limits.unused_columns).collect(),
            unused_tables: tables.into_iter().take(rules.limits.unused_tables).collect(),
        }
    }

    fn used_set(&self) -> UsedSet {
        let mut used = UsedSet::default();

        for key in &self.measure_order {
            if let Some(node) = self.nodes.get(key) {
                used.tables.insert(fold(&node.object.table));
            }
        }

        for refs in self.resolved.values() {
            used.measures.extend(refs.measures.iter().map(ObjectRef::normalized));
            for column in &refs.columns {
                used.column(column);
            }
        }

        for relationship in &self.relationships {
            used.column(&relationship.from_ref());
            used.column(&relationship.to_ref());
        }

        for usage in &self.visual_usage {
            if usage.via_filter && !self.rules.include_filters {
                continue;
            }
            match usage.kind {
                NodeKind::Measure => {
                    used.measures.insert(usage.object.normalized());
                }
                NodeKind::Column => used.column(&usage.object),
            }
        }

        used
    }
}
