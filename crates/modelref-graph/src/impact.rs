//! Impact and column usage queries

use modelref_core::{CrossFilterDirection, ObjectRef};
use serde::{Deserialize, Serialize};

use crate::graph::{DependencyGraph, NodeId, NodeKind};

/// A visual that binds the analysed object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualRef {
    pub visual_id: String,
    pub visual_type: String,
    pub page: String,

    #[serde(default)]
    pub via_filter: bool,
}

/// Everything that depends on one measure or column
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub key: NodeId,

    /// Measures referencing the object directly
    pub used_by_measures: Vec<NodeId>,

    /// Calculated columns referencing the object directly
    pub used_by_calculated_columns: Vec<NodeId>,

    pub used_in_visuals: Vec<VisualRef>,

    /// Pages hosting those visuals, in first-seen order
    pub used_in_pages: Vec<String>,

    /// Transitive dependents
    pub downstream: Vec<NodeId>,
}

impl ImpactReport {
    pub fn is_empty(&self) -> bool {
        self.used_by_measures.is_empty()
            && self.used_by_calculated_columns.is_empty()
            && self.used_in_visuals.is_empty()
    }
}

/// A relationship touching the analysed column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipRef {
    pub name: String,
    pub from: NodeId,
    pub to: NodeId,
    pub is_active: bool,
    pub cross_filter: CrossFilterDirection,
}

/// Where a column is referenced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnUsage {
    pub table: String,
    pub column: String,
    pub used_in_measures: Vec<NodeId>,
    pub used_in_calculated_columns: Vec<NodeId>,
    pub used_in_relationships: Vec<RelationshipRef>,
    pub is_used: bool,
}

impl DependencyGraph {
    /// Direct dependents, visuals and transitive dependents of a key
    ///
    /// Unknown keys produce an empty report.
    pub fn impact(&self, key: &str) -> ImpactReport {
        let canonical = self.canonical(key);
        let (used_by_measures, used_by_calculated_columns) = self.dependents(&canonical);

        let mut report = ImpactReport {
            key: canonical.clone(),
            used_by_measures,
            used_by_calculated_columns,
            downstream: self.downstream(&canonical),
            ..ImpactReport::default()
        };

        if let Some(object) = ObjectRef::parse_key(&canonical) {
            for usage in self.visual_usage.iter().filter(|u| u.refers_to(&object)) {
                let visual = VisualRef {
                    visual_id: usage.visual_id.clone(),
                    visual_type: usage.visual_type.clone(),
                    page: usage.page.clone(),
                    via_filter: usage.via_filter,
                };
                if !report.used_in_visuals.contains(&visual) {
                    report.used_in_visuals.push(visual);
                }
                if !report.used_in_pages.contains(&usage.page) {
                    report.used_in_pages.push(usage.page.clone());
                }
            }
        }

        report
    }

    /// Measures, calculated columns and relationships referencing a column
    ///
    /// Scans every resolved column reference, so a column reached through
    /// an ambiguous name counts for each owner it fanned out to.
    pub fn column_usage(&self, table: &str, column: &str) -> ColumnUsage {
        let mut used_in_measures = Vec::new();
        let mut used_in_calculated_columns = Vec::new();

        for (owner, refs) in &self.resolved {
            if !refs.columns.iter().any(|c| c.matches(table, column)) {
                continue;
            }
            match self.nodes.get(owner).map(|n| n.kind) {
                Some(NodeKind::Column) => used_in_calculated_columns.push(owner.clone()),
                _ => used_in_measures.push(owner.clone()),
            }
        }
        used_in_measures.sort();
        used_in_calculated_columns.sort();

        let used_in_relationships: Vec<RelationshipRef> = self
            .relationships
            .iter()
            .filter(|r| r.touches(table, column))
            .map(|r| RelationshipRef {
                name: r.name.clone(),
                from: r.from_ref().key(),
                to: r.to_ref().key(),
                is_active: r.is_active,
                cross_filter: r.cross_filter,
            })
            .collect();

        let is_used = !used_in_measures.is_empty()
            || !used_in_calculated_columns.is_empty()
            || !used_in_relationships.is_empty();

        let (table, column) = match self.find(table, column) {
            Some(node) => (node.object.table.clone(), node.object.name.clone()),
            None => (table.to_string(), column.to_string()),
        };

        ColumnUsage {
            table,
            column,
            used_in_measures,
            used_in_calculated_columns,
            used_in_relationships,
            is_used,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::tests::{graph_for, sales_catalog};
    use crate::visuals::visual_field_usage;
    use modelref_core::{Column, Relationship, Table};
    use modelref_report::ReportVisual;
    use pretty_assertions::assert_eq;

    #[test]
    fn impact_lists_direct_and_transitive_dependents() {
        let graph = graph_for(&sales_catalog());
        let impact = graph.impact("sales[revenue]");

        assert_eq!(impact.key, "Sales[Revenue]");
        assert_eq!(impact.used_by_measures, vec!["Sales[Profit %]", "Sales[Profit]"]);
        assert!(impact.used_by_calculated_columns.is_empty());
        assert_eq!(impact.downstream.len(), 2);
    }

    #[test]
    fn impact_includes_visuals_and_pages() {
        let visuals = [
            ReportVisual::new("v1", "card", "Overview").with_measure("Sales", "Revenue"),
            ReportVisual::new("v2", "table", "Details").with_measure("Sales", "Profit"),
            ReportVisual::new("v3", "lineChart", "Overview").with_measure("SALES", "revenue"),
        ];
        let graph = graph_for(&sales_catalog()).with_visual_usage(visual_field_usage(&visuals));

        let impact = graph.impact("Sales[Revenue]");
        let ids: Vec<_> = impact.used_in_visuals.iter().map(|v| v.visual_id.as_str()).collect();
        assert_eq!(ids, vec!["v1", "v3"]);
        assert_eq!(impact.used_in_pages, vec!["Overview"]);
    }

    #[test]
    fn unknown_key_has_empty_impact() {
        let graph = graph_for(&sales_catalog());
        let impact = graph.impact("Nope[Nothing]");
        assert!(impact.is_empty());
        assert!(impact.downstream.is_empty());
    }

    #[test]
    fn column_usage_covers_expressions_and_relationships() {
        let catalog = sales_catalog()
            .with_table(Table::new("Date").with_column(Column::new("", "Date")))
            .with_relationship(Relationship::new("r1", ("Sales", "Amount"), ("Date", "Date")));
        let graph = graph_for(&catalog);

        let usage = graph.column_usage("sales", "AMOUNT");
        assert_eq!(usage.table, "Sales");
        assert_eq!(usage.column, "Amount");
        assert_eq!(usage.used_in_measures, vec!["Sales[Revenue]"]);
        assert_eq!(usage.used_in_calculated_columns, vec!["Sales[Margin]"]);
        assert_eq!(usage.used_in_relationships.len(), 1);
        assert_eq!(usage.used_in_relationships[0].to, "Date[Date]");
        assert!(usage.is_used);

        let date = graph.column_usage("Date", "Date");
        assert!(date.is_used);
        assert!(date.used_in_measures.is_empty());
    }

    #[test]
    fn column_usage_is_symmetric_with_impact() {
        let graph = graph_for(&sales_catalog());
        let usage = graph.column_usage("Sales", "Cost");
        let impact = graph.impact("Sales[Cost]");

        assert_eq!(usage.used_in_measures, impact.used_by_measures);
        assert_eq!(usage.used_in_calculated_columns, impact.used_by_calculated_columns);
    }
}
