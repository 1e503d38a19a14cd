//! Depth-bounded dependency trees
//!
//! Each branch carries its own visited set, so a node reached along two
//! paths is expanded on both while a node reached again on the same path is
//! marked circular and not expanded.

use modelref_core::ObjectRef;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::graph::{DependencyGraph, NodeId, NodeKind};

/// One node of a dependency tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyNode {
    pub key: NodeId,
    pub table: String,
    pub name: String,
    pub kind: NodeKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,

    /// Already on the current path; not expanded
    #[serde(default)]
    pub circular_reference: bool,

    /// Has dependencies beyond the depth limit
    #[serde(default)]
    pub truncated: bool,

    /// Came from an unqualified name no table owns
    #[serde(default)]
    pub unresolved: bool,

    #[serde(default)]
    pub dependencies: Vec<DependencyNode>,
}

impl DependencyNode {
    /// Number of nodes in this subtree, including itself
    pub fn size(&self) -> usize {
        1 + self.dependencies.iter().map(DependencyNode::size).sum::<usize>()
    }

    /// Deepest level below this node
    pub fn depth(&self) -> usize {
        self.dependencies
            .iter()
            .map(|d| d.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Whether any node in this subtree closes a cycle
    pub fn has_cycle(&self) -> bool {
        self.circular_reference || self.dependencies.iter().any(DependencyNode::has_cycle)
    }
}

impl DependencyGraph {
    /// Dependency tree of a measure, expanded up to `max_depth` levels
    ///
    /// Returns `None` when the measure is unknown.
    pub fn dependency_tree(&self, table: &str, measure: &str, max_depth: usize) -> Option<DependencyNode> {
        let node = self.find(table, measure).filter(|n| n.kind == NodeKind::Measure)?;
        Some(self.expand(&node.key(), node.kind, max_depth, &HashSet::new()))
    }

    /// Dependency tree of any measure or column key
    pub fn dependency_tree_for_key(&self, key: &str, max_depth: usize) -> Option<DependencyNode> {
        let node = self.find_key(key)?;
        Some(self.expand(&node.key(), node.kind, max_depth, &HashSet::new()))
    }

    fn expand(&self, key: &str, kind: NodeKind, depth_left: usize, path: &HashSet<NodeId>) -> DependencyNode {
        let known = self.nodes.get(key);
        let object = known
            .map(|n| n.object.clone())
            .or_else(|| ObjectRef::parse_key(key))
            .unwrap_or_else(|| ObjectRef::unresolved(key));

        let mut node = DependencyNode {
            key: key.to_string(),
            table: object.table.clone(),
            name: object.name.clone(),
            kind,
            expression: known.and_then(|n| n.expression.clone()),
            circular_reference: false,
            truncated: false,
            unresolved: object.is_unresolved(),
            dependencies: Vec::new(),
        };

        if path.contains(key) {
            node.circular_reference = true;
            return node;
        }

        let dependencies = self.depends_on(key);
        if dependencies.is_empty() {
            return node;
        }
        if depth_left == 0 {
            node.truncated = true;
            return node;
        }

        let mut branch = path.clone();
        branch.insert(key.to_string());

        node.dependencies = dependencies
            .into_iter()
            .map(|(dep, dep_kind)| self.expand(&dep, dep_kind, depth_left - 1, &branch))
            .collect();
        node
    }
}
