//! Dependency graph construction and traversal
//!
//! Builds forward and reverse adjacency over measures and columns from the
//! references each measure and calculated column expression resolves to.
//! Nodes are keyed `Table[Name]`; lookups by user input are case-insensitive.

use modelref_core::{
    normalize_key, ColumnRules, Config, Diagnostic, DiagnosticCode, ModelCatalog, ObjectKey,
    ObjectRef, OutputLimits, Relationship, Severity,
};
use modelref_dax::{resolve, ReferenceIndex, ResolvedReferences};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::info;

use crate::visuals::VisualUsage;

/// Node identifier (`Table[Name]`)
pub type NodeId = ObjectKey;

/// What a node stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Measure,
    Column,
}

/// A measure or column known to the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub object: ObjectRef,
    pub kind: NodeKind,
    pub expression: Option<String>,
    pub is_hidden: bool,
    pub is_key: bool,
}

impl Node {
    pub fn key(&self) -> NodeId {
        self.object.key()
    }

    pub fn is_calculated(&self) -> bool {
        self.kind == NodeKind::Column && self.expression.is_some()
    }
}

/// Forward and reverse edges of one relation
#[derive(Debug, Clone, Default)]
pub(crate) struct Adjacency {
    /// node -> nodes it depends on
    forward: HashMap<NodeId, BTreeSet<NodeId>>,

    /// node -> nodes that depend on it
    reverse: HashMap<NodeId, BTreeSet<NodeId>>,
}

impl Adjacency {
    fn insert(&mut self, from: &str, to: &str) {
        self.forward
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        self.reverse
            .entry(to.to_string())
            .or_default()
            .insert(from.to_string());
    }

    pub(crate) fn depends_on(&self, node: &str) -> impl Iterator<Item = &NodeId> {
        self.forward.get(node).into_iter().flatten()
    }

    pub(crate) fn dependents(&self, node: &str) -> impl Iterator<Item = &NodeId> {
        self.reverse.get(node).into_iter().flatten()
    }

    fn edge_count(&self) -> usize {
        self.forward.values().map(BTreeSet::len).sum()
    }
}

/// Settings for usage analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRules {
    pub limits: OutputLimits,
    pub columns: ColumnRules,

    /// Count fields used only in visual filters as used
    pub include_filters: bool,
}

impl Default for UsageRules {
    fn default() -> Self {
        Self {
            limits: OutputLimits::default(),
            columns: ColumnRules::default(),
            include_filters: true,
        }
    }
}

impl UsageRules {
    pub fn from_config(config: &Config) -> Self {
        Self {
            limits: config.limits,
            columns: config.columns.clone(),
            include_filters: config.visuals.include_filters,
        }
    }
}

/// Edge and node counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub measures: usize,
    pub columns: usize,
    pub measure_to_measure: usize,
    pub measure_to_column: usize,
    pub column_to_column: usize,
    pub column_to_measure: usize,
    pub visual_fields: usize,
}

/// Dependency graph over a model catalog
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Every measure and column, by key
    pub(crate) nodes: HashMap<NodeId, Node>,

    /// Normalized `table|name` -> key
    lookup: HashMap<String, NodeId>,

    /// Catalog enumeration order
    pub(crate) measure_order: Vec<NodeId>,
    pub(crate) column_order: Vec<NodeId>,
    pub(crate) tables: Vec<String>,

    pub(crate) measure_measures: Adjacency,
    pub(crate) measure_columns: Adjacency,
    pub(crate) column_columns: Adjacency,
    pub(crate) column_measures: Adjacency,

    /// Resolved references per measure / calculated column, self-references removed
    pub(crate) resolved: HashMap<NodeId, ResolvedReferences>,

    pub(crate) relationships: Vec<Relationship>,

    /// Usage harvested from report visuals
    pub(crate) visual_usage: Vec<VisualUsage>,

    pub(crate) rules: UsageRules,
}

impl DependencyGraph {
    /// Build the graph for a catalog
    pub fn build(catalog: &ModelCatalog, index: &ReferenceIndex) -> Self {
        let mut graph = Self {
            nodes: HashMap::new(),
            lookup: HashMap::new(),
            measure_order: Vec::new(),
            column_order: Vec::new(),
            tables: catalog.tables.iter().map(|t| t.name.clone()).collect(),
            measure_measures: Adjacency::default(),
            measure_columns: Adjacency::default(),
            column_columns: Adjacency::default(),
            column_measures: Adjacency::default(),
            resolved: HashMap::new(),
            relationships: catalog.relationships.clone(),
            visual_usage: Vec::new(),
            rules: UsageRules::default(),
        };

        for measure in catalog.measures() {
            let key = graph.add_node(Node {
                object: measure.object_ref(),
                kind: NodeKind::Measure,
                expression: Some(measure.expression.clone()).filter(|e| !e.trim().is_empty()),
                is_hidden: measure.is_hidden,
                is_key: false,
            });
            graph.measure_order.push(key);
        }

        for column in catalog.columns() {
            let key = graph.add_node(Node {
                object: column.object_ref(),
                kind: NodeKind::Column,
                expression: column.expression.clone(),
                is_hidden: column.is_hidden,
                is_key: column.is_key,
            });
            graph.column_order.push(key);
        }

        for measure in catalog.measures() {
            graph.add_expression_edges(&measure.object_ref(), NodeKind::Measure, &measure.expression, index);
        }

        for column in catalog.calculated_columns() {
            if let Some(expression) = &column.expression {
                graph.add_expression_edges(&column.object_ref(), NodeKind::Column, expression, index);
            }
        }

        let stats = graph.stats();
        info!(
            measures = stats.measures,
            columns = stats.columns,
            measure_edges = stats.measure_to_measure + stats.measure_to_column,
            column_edges = stats.column_to_column + stats.column_to_measure,
            "built dependency graph"
        );

        graph
    }

    /// Replace usage settings
    pub fn with_rules(mut self, rules: UsageRules) -> Self {
        self.rules = rules;
        self
    }

    /// Merge usage edges from report visuals
    ///
    /// Visual usage is additive: model edges are never replaced.
    pub fn with_visual_usage(mut self, usage: Vec<VisualUsage>) -> Self {
        self.visual_usage.extend(usage);
        self
    }

    fn add_node(&mut self, node: Node) -> NodeId {
        let key = node.key();
        self.lookup.entry(node.object.normalized()).or_insert_with(|| key.clone());
        self.nodes.entry(key.clone()).or_insert(node);
        key
    }

    fn add_expression_edges(
        &mut self,
        owner: &ObjectRef,
        kind: NodeKind,
        expression: &str,
        index: &ReferenceIndex,
    ) {
        if expression.trim().is_empty() {
            return;
        }

        let mut refs = resolve(expression, index);
        let own = owner.normalized();
        refs.measures.retain(|m| m.normalized() != own);
        refs.columns.retain(|c| c.normalized() != own);

        let from = owner.key();
        for measure in &refs.measures {
            let to = measure.key();
            match kind {
                NodeKind::Measure => self.measure_measures.insert(&from, &to),
                NodeKind::Column => self.column_measures.insert(&from, &to),
            }
        }
        for column in &refs.columns {
            let to = self.canonical_key(column).unwrap_or_else(|| column.key());
            match kind {
                NodeKind::Measure => self.measure_columns.insert(&from, &to),
                NodeKind::Column => self.column_columns.insert(&from, &to),
            }
        }

        self.resolved.insert(from, refs);
    }

    fn canonical_key(&self, object: &ObjectRef) -> Option<NodeId> {
        self.lookup.get(&object.normalized()).cloned()
    }

    /// Find a node by table and name (case-insensitive)
    pub fn find(&self, table: &str, name: &str) -> Option<&Node> {
        self.lookup
            .get(&normalize_key(table, name))
            .and_then(|key| self.nodes.get(key))
    }

    /// Find a node by `Table[Name]` key (case-insensitive)
    pub fn find_key(&self, key: &str) -> Option<&Node> {
        self.nodes.get(key).or_else(|| {
            let object = ObjectRef::parse_key(key)?;
            self.find(&object.table, &object.name)
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.find_key(key).is_some()
    }

    /// All nodes in the graph
    pub fn all_nodes(&self) -> Vec<&NodeId> {
        self.nodes.keys().collect()
    }

    /// Resolved references of a measure or calculated column
    pub fn references(&self, key: &str) -> Option<&ResolvedReferences> {
        let key = self.canonical(key);
        self.resolved.get(&key)
    }

    /// Canonical key for user input, or the input unchanged when unknown
    pub(crate) fn canonical(&self, key: &str) -> NodeId {
        self.find_key(key)
            .map(Node::key)
            .unwrap_or_else(|| key.to_string())
    }

    /// Immediate dependencies (measures first, then columns)
    pub fn depends_on(&self, key: &str) -> Vec<(NodeId, NodeKind)> {
        let key = self.canonical(key);
        let (measures, columns) = match self.nodes.get(&key).map(|n| n.kind) {
            Some(NodeKind::Column) => (&self.column_measures, &self.column_columns),
            _ => (&self.measure_measures, &self.measure_columns),
        };

        measures
            .depends_on(&key)
            .map(|k| (k.clone(), NodeKind::Measure))
            .chain(columns.depends_on(&key).map(|k| (k.clone(), NodeKind::Column)))
            .collect()
    }

    /// Immediate dependents as `(measures, calculated columns)`
    pub fn dependents(&self, key: &str) -> (Vec<NodeId>, Vec<NodeId>) {
        let key = self.canonical(key);

        let measures: BTreeSet<NodeId> = self
            .measure_measures
            .dependents(&key)
            .chain(self.measure_columns.dependents(&key))
            .cloned()
            .collect();
        let columns: BTreeSet<NodeId> = self
            .column_columns
            .dependents(&key)
            .chain(self.column_measures.dependents(&key))
            .cloned()
            .collect();

        (measures.into_iter().collect(), columns.into_iter().collect())
    }

    fn all_forward<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a NodeId> {
        self.measure_measures
            .depends_on(key)
            .chain(self.measure_columns.depends_on(key))
            .chain(self.column_columns.depends_on(key))
            .chain(self.column_measures.depends_on(key))
    }

    fn all_reverse<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a NodeId> {
        self.measure_measures
            .dependents(key)
            .chain(self.measure_columns.dependents(key))
            .chain(self.column_columns.dependents(key))
            .chain(self.column_measures.dependents(key))
    }

    /// Get all downstream nodes (transitive closure of dependents)
    ///
    /// Everything that changes meaning if this node changes.
    pub fn downstream(&self, key: &str) -> Vec<NodeId> {
        let start = self.canonical(key);
        self.breadth_first(&start, |k| self.all_reverse(k).cloned().collect())
    }

    /// Get all upstream nodes (transitive closure of dependencies)
    pub fn upstream(&self, key: &str) -> Vec<NodeId> {
        let start = self.canonical(key);
        self.breadth_first(&start, |k| self.all_forward(k).cloned().collect())
    }

    fn breadth_first(&self, start: &str, next: impl Fn(&str) -> Vec<NodeId>) -> Vec<NodeId> {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<NodeId> = next(start).into();
        let mut result = Vec::new();

        while let Some(current) = queue.pop_front() {
            if current == start || !visited.insert(current.clone()) {
                continue;
            }
            result.push(current.clone());

            for n in next(&current) {
                if !visited.contains(&n) {
                    queue.push_back(n);
                }
            }
        }

        result
    }

    /// Check if `target` depends on `source`, directly or transitively
    pub fn has_path(&self, source: &str, target: &str) -> bool {
        let target = self.canonical(target);
        self.downstream(source).contains(&target)
    }

    /// Groups of nodes that depend on each other in a cycle
    ///
    /// Each group is sorted; groups are ordered by their first key.
    pub fn cycles(&self) -> Vec<Vec<NodeId>> {
        // Kosaraju: finish order on forward edges, then components on reverse edges
        let mut keys: Vec<&NodeId> = self.nodes.keys().collect();
        keys.sort();

        let mut visited: HashSet<&str> = HashSet::new();
        let mut order: Vec<&str> = Vec::new();
        for &root in &keys {
            if visited.contains(root.as_str()) {
                continue;
            }
            visited.insert(root.as_str());
            let mut stack: Vec<(&str, Vec<&NodeId>)> =
                vec![(root.as_str(), self.all_forward(root).collect())];
            while let Some((node, pending)) = stack.last_mut() {
                if let Some(next) = pending.pop() {
                    if self.nodes.contains_key(next) && visited.insert(next.as_str()) {
                        stack.push((next.as_str(), self.all_forward(next).collect()));
                    }
                } else {
                    order.push(*node);
                    stack.pop();
                }
            }
        }

        let mut assigned: HashSet<&str> = HashSet::new();
        let mut groups = Vec::new();
        for &root in order.iter().rev() {
            if !assigned.insert(root) {
                continue;
            }
            let mut group = vec![root.to_string()];
            let mut stack = vec![root];
            while let Some(node) = stack.pop() {
                for prev in self.all_reverse(node) {
                    if self.nodes.contains_key(prev) && assigned.insert(prev.as_str()) {
                        group.push(prev.clone());
                        stack.push(prev.as_str());
                    }
                }
            }
            if group.len() > 1 {
                group.sort();
                groups.push(group);
            }
        }

        groups.sort();
        groups
    }

    /// One diagnostic per dependency cycle
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.cycles()
            .into_iter()
            .map(|group| {
                Diagnostic::new(
                    DiagnosticCode::GraphCircularReference,
                    Severity::Warn,
                    format!("circular dependency between {}", group.join(", ")),
                )
                .with_object(group[0].clone())
                .with_related(group[1..].to_vec())
            })
            .collect()
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            measures: self.measure_order.len(),
            columns: self.column_order.len(),
            measure_to_measure: self.measure_measures.edge_count(),
            measure_to_column: self.measure_columns.edge_count(),
            column_to_column: self.column_columns.edge_count(),
            column_to_measure: self.column_measures.edge_count(),
            visual_fields: self.visual_usage.len(),
        }
    }

    pub fn rules(&self) -> &UsageRules {
        &self.rules
    }
}
