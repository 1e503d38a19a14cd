//! Declaration tree types
//!
//! The parser produces a generic tree of `DeclarationNode`s: a kind, a name,
//! an ordered property bag and nested children. `Declaration` is the typed
//! view over one node, with promoted fields per kind and the remaining
//! properties left in a residual bag.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::expression::locate_expression;
use crate::relationship::decompose_column_ref;

/// Kind of a declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeclarationKind {
    /// Root of a parsed document (not a keyword)
    Document,
    Model,
    Table,
    Column,
    Measure,
    Hierarchy,
    Level,
    Partition,
    Relationship,
    Expression,
    Role,
    TablePermission,
    Culture,
    Annotation,
}

impl DeclarationKind {
    /// Every keyword-introduced kind
    pub const KEYWORDS: [DeclarationKind; 13] = [
        Self::Model,
        Self::Table,
        Self::Column,
        Self::Measure,
        Self::Hierarchy,
        Self::Level,
        Self::Partition,
        Self::Relationship,
        Self::Expression,
        Self::Role,
        Self::TablePermission,
        Self::Culture,
        Self::Annotation,
    ];

    /// Source keyword introducing this kind
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Document => "",
            Self::Model => "model",
            Self::Table => "table",
            Self::Column => "column",
            Self::Measure => "measure",
            Self::Hierarchy => "hierarchy",
            Self::Level => "level",
            Self::Partition => "partition",
            Self::Relationship => "relationship",
            Self::Expression => "expression",
            Self::Role => "role",
            Self::TablePermission => "tablePermission",
            Self::Culture => "culture",
            Self::Annotation => "annotation",
        }
    }

    /// Look up a kind by its keyword (exact match)
    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::KEYWORDS.iter().copied().find(|k| k.keyword() == word)
    }

    /// Whether a `name =` declaration with an empty right-hand side opens a
    /// multi-line expression body
    pub fn accepts_expression_body(&self) -> bool {
        matches!(
            self,
            Self::Measure | Self::Column | Self::Expression | Self::TablePermission
        )
    }

    /// Property key that an inline `= text` value is stored under
    pub fn inline_value_key(&self) -> &'static str {
        match self {
            Self::Measure | Self::Column | Self::Expression => "expression",
            Self::TablePermission => "filterExpression",
            Self::Partition => "sourceKind",
            _ => "value",
        }
    }
}

impl std::fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Document => write!(f, "document"),
            other => write!(f, "{}", other.keyword()),
        }
    }
}

/// Ordered property map
///
/// Keys keep their first insertion position; re-inserting a key replaces its value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PropertyBag {
    entries: Vec<(String, String)>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a property
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Get a property by exact key, falling back to a case-insensitive match
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .or_else(|| self.entries.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)))
            .map(|(_, v)| v.as_str())
    }

    /// Interpret a property as a boolean flag
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).map(|v| {
            let v = v.trim();
            v.eq_ignore_ascii_case("true") || v == "1"
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remove a property and return its value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self
            .entries
            .iter()
            .position(|(k, _)| k == key)
            .or_else(|| self.entries.iter().position(|(k, _)| k.eq_ignore_ascii_case(key)))?;
        Some(self.entries.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert to a sorted map for catalog output
    pub fn into_map(self) -> BTreeMap<String, String> {
        self.entries.into_iter().collect()
    }
}

/// A parsed declaration with its nested children
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationNode {
    pub kind: DeclarationKind,

    /// Quote-stripped name
    pub name: String,

    pub properties: PropertyBag,

    /// Nested declarations in source order
    pub children: Vec<DeclarationNode>,

    /// 1-indexed source line of the declaration (0 for the document root)
    pub line: usize,
}

impl DeclarationNode {
    pub fn new(kind: DeclarationKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            properties: PropertyBag::new(),
            children: Vec::new(),
            line: 0,
        }
    }

    /// Create an empty document root
    pub fn document() -> Self {
        Self::new(DeclarationKind::Document, "")
    }

    /// Children of one kind, in source order
    pub fn children_of(&self, kind: DeclarationKind) -> impl Iterator<Item = &DeclarationNode> {
        self.children.iter().filter(move |c| c.kind == kind)
    }

    /// Find a direct child by kind and name (case-insensitive)
    pub fn child(&self, kind: DeclarationKind, name: &str) -> Option<&DeclarationNode> {
        self.children_of(kind)
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Children grouped by kind
    pub fn grouped_children(&self) -> BTreeMap<DeclarationKind, Vec<&DeclarationNode>> {
        let mut groups: BTreeMap<DeclarationKind, Vec<&DeclarationNode>> = BTreeMap::new();
        for child in &self.children {
            groups.entry(child.kind).or_default().push(child);
        }
        groups
    }

    /// Count of this node and all descendants
    pub fn descendant_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.descendant_count()).sum::<usize>()
    }
}

/// A column declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDecl {
    pub name: String,
    pub data_type: Option<String>,
    pub expression: Option<String>,
    pub source_column: Option<String>,
    pub is_hidden: bool,
    pub is_key: bool,
    pub display_folder: Option<String>,
    pub format_string: Option<String>,
    pub summarize_by: Option<String>,
    pub sort_by_column: Option<String>,
    pub description: Option<String>,
    pub properties: PropertyBag,
}

/// A measure declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasureDecl {
    pub name: String,

    /// Expression text, located explicitly or by heuristic
    pub expression: Option<String>,

    /// Property key the expression was found under
    pub expression_key: Option<String>,

    pub display_folder: Option<String>,
    pub format_string: Option<String>,
    pub is_hidden: bool,
    pub description: Option<String>,
    pub properties: PropertyBag,
}

/// A partition declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionDecl {
    pub name: String,
    pub source_kind: Option<String>,
    pub mode: Option<String>,
    pub source: Option<String>,
    pub properties: PropertyBag,
}

/// A hierarchy declaration with its levels as `(level, column)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyDecl {
    pub name: String,
    pub levels: Vec<(String, Option<String>)>,
}

/// A table declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDecl {
    pub name: String,
    pub description: Option<String>,
    pub is_hidden: bool,
    pub columns: Vec<ColumnDecl>,
    pub measures: Vec<MeasureDecl>,
    pub partitions: Vec<PartitionDecl>,
    pub hierarchies: Vec<HierarchyDecl>,
    pub properties: PropertyBag,
}

/// A relationship declaration with decomposed endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipDecl {
    pub name: String,
    pub from: Option<(String, String)>,
    pub to: Option<(String, String)>,
    pub is_active: bool,
    pub cross_filtering_behavior: Option<String>,
    pub from_cardinality: Option<String>,
    pub to_cardinality: Option<String>,
    pub properties: PropertyBag,
}

/// A named expression declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionDecl {
    pub name: String,
    pub expression: String,
    pub is_parameter: bool,
    pub description: Option<String>,
    pub properties: PropertyBag,
}

/// A role declaration with `(table, filter)` permissions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDecl {
    pub name: String,
    pub model_permission: Option<String>,
    pub table_permissions: Vec<(String, Option<String>)>,
    pub properties: PropertyBag,
}

/// A culture declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CultureDecl {
    pub name: String,
    pub properties: PropertyBag,
}

/// Typed view of a declaration node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Table(TableDecl),
    Column(ColumnDecl),
    Measure(MeasureDecl),
    Relationship(RelationshipDecl),
    Partition(PartitionDecl),
    NamedExpression(ExpressionDecl),
    Role(RoleDecl),
    Culture(CultureDecl),

    /// Model, hierarchy, level, annotation and document nodes
    Other(DeclarationNode),
}

impl Declaration {
    /// Convert a generic node into its typed variant
    pub fn from_node(node: &DeclarationNode) -> Self {
        match node.kind {
            DeclarationKind::Table => Self::Table(table_decl(node)),
            DeclarationKind::Column => Self::Column(column_decl(node)),
            DeclarationKind::Measure => Self::Measure(measure_decl(node)),
            DeclarationKind::Relationship => Self::Relationship(relationship_decl(node)),
            DeclarationKind::Partition => Self::Partition(partition_decl(node)),
            DeclarationKind::Expression => Self::NamedExpression(expression_decl(node)),
            DeclarationKind::Role => Self::Role(role_decl(node)),
            DeclarationKind::Culture => Self::Culture(CultureDecl {
                name: node.name.clone(),
                properties: node.properties.clone(),
            }),
            _ => Self::Other(node.clone()),
        }
    }

    /// Declared name
    pub fn name(&self) -> &str {
        match self {
            Self::Table(d) => &d.name,
            Self::Column(d) => &d.name,
            Self::Measure(d) => &d.name,
            Self::Relationship(d) => &d.name,
            Self::Partition(d) => &d.name,
            Self::NamedExpression(d) => &d.name,
            Self::Role(d) => &d.name,
            Self::Culture(d) => &d.name,
            Self::Other(node) => &node.name,
        }
    }
}

fn take_flag(props: &mut PropertyBag, key: &str) -> bool {
    let value = props.get_bool(key).unwrap_or(false);
    props.remove(key);
    value
}

fn column_decl(node: &DeclarationNode) -> ColumnDecl {
    let mut props = node.properties.clone();
    ColumnDecl {
        name: node.name.clone(),
        data_type: props.remove("dataType"),
        expression: props.remove("expression").filter(|e| !e.trim().is_empty()),
        source_column: props.remove("sourceColumn"),
        is_hidden: take_flag(&mut props, "isHidden"),
        is_key: take_flag(&mut props, "isKey"),
        display_folder: props.remove("displayFolder"),
        format_string: props.remove("formatString"),
        summarize_by: props.remove("summarizeBy"),
        sort_by_column: props.remove("sortByColumn"),
        description: props.remove("description"),
        properties: props,
    }
}

fn measure_decl(node: &DeclarationNode) -> MeasureDecl {
    let mut props = node.properties.clone();
    let located = locate_expression(&props).map(|(k, v)| (k.to_string(), v.to_string()));
    let (expression_key, expression) = match located {
        Some((key, value)) => {
            props.remove(&key);
            (Some(key), Some(value))
        }
        None => (None, None),
    };

    MeasureDecl {
        name: node.name.clone(),
        expression,
        expression_key,
        display_folder: props.remove("displayFolder"),
        format_string: props.remove("formatString"),
        is_hidden: take_flag(&mut props, "isHidden"),
        description: props.remove("description"),
        properties: props,
    }
}

fn partition_decl(node: &DeclarationNode) -> PartitionDecl {
    let mut props = node.properties.clone();
    PartitionDecl {
        name: node.name.clone(),
        source_kind: props.remove("sourceKind"),
        mode: props.remove("mode"),
        source: props.remove("source"),
        properties: props,
    }
}

fn table_decl(node: &DeclarationNode) -> TableDecl {
    let mut props = node.properties.clone();
    TableDecl {
        name: node.name.clone(),
        description: props.remove("description"),
        is_hidden: take_flag(&mut props, "isHidden"),
        columns: node.children_of(DeclarationKind::Column).map(column_decl).collect(),
        measures: node.children_of(DeclarationKind::Measure).map(measure_decl).collect(),
        partitions: node
            .children_of(DeclarationKind::Partition)
            .map(partition_decl)
            .collect(),
        hierarchies: node
            .children_of(DeclarationKind::Hierarchy)
            .map(|h| HierarchyDecl {
                name: h.name.clone(),
                levels: h
                    .children_of(DeclarationKind::Level)
                    .map(|l| (l.name.clone(), l.properties.get("column").map(str::to_string)))
                    .collect(),
            })
            .collect(),
        properties: props,
    }
}

fn relationship_decl(node: &DeclarationNode) -> RelationshipDecl {
    let mut props = node.properties.clone();
    let from = props.remove("fromColumn").and_then(|v| decompose_column_ref(&v));
    let to = props.remove("toColumn").and_then(|v| decompose_column_ref(&v));
    let is_active = props.get_bool("isActive").unwrap_or(true);
    props.remove("isActive");

    RelationshipDecl {
        name: node.name.clone(),
        from,
        to,
        is_active,
        cross_filtering_behavior: props.remove("crossFilteringBehavior"),
        from_cardinality: props.remove("fromCardinality"),
        to_cardinality: props.remove("toCardinality"),
        properties: props,
    }
}

fn expression_decl(node: &DeclarationNode) -> ExpressionDecl {
    let mut props = node.properties.clone();
    let raw = props.remove("expression").unwrap_or_default();
    let (expression, is_parameter) = split_parameter_meta(&raw);

    ExpressionDecl {
        name: node.name.clone(),
        expression,
        is_parameter,
        description: props.remove("description"),
        properties: props,
    }
}

/// Split a trailing `meta [...]` record off a named expression body
fn split_parameter_meta(raw: &str) -> (String, bool) {
    let lowered = raw.to_ascii_lowercase();
    match lowered.rfind(" meta [") {
        Some(pos) => {
            let meta = &lowered[pos..];
            let is_parameter = meta.replace(' ', "").contains("isparameterquery=true");
            (raw[..pos].trim_end().to_string(), is_parameter)
        }
        None => (raw.to_string(), false),
    }
}

fn role_decl(node: &DeclarationNode) -> RoleDecl {
    let mut props = node.properties.clone();
    RoleDecl {
        name: node.name.clone(),
        model_permission: props.remove("modelPermission"),
        table_permissions: node
            .children_of(DeclarationKind::TablePermission)
            .map(|p| {
                (
                    p.name.clone(),
                    p.properties.get("filterExpression").map(str::to_string),
                )
            })
            .collect(),
        properties: props,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn keyword_lookup() {
        assert_eq!(DeclarationKind::from_keyword("measure"), Some(DeclarationKind::Measure));
        assert_eq!(
            DeclarationKind::from_keyword("tablePermission"),
            Some(DeclarationKind::TablePermission)
        );
        assert_eq!(DeclarationKind::from_keyword("Measure"), None);
        assert_eq!(DeclarationKind::from_keyword("ref"), None);
    }

    #[test]
    fn property_bag_keeps_order_and_replaces() {
        let mut bag = PropertyBag::new();
        bag.insert("dataType", "string");
        bag.insert("isHidden", "true");
        bag.insert("dataType", "int64");

        let keys: Vec<_> = bag.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["dataType", "isHidden"]);
        assert_eq!(bag.get("datatype"), Some("int64"));
        assert_eq!(bag.get_bool("isHidden"), Some(true));
        assert_eq!(bag.remove("ISHIDDEN"), Some("true".to_string()));
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn typed_column_promotes_fields() {
        let mut node = DeclarationNode::new(DeclarationKind::Column, "Amount");
        node.properties.insert("dataType", "decimal");
        node.properties.insert("isHidden", "true");
        node.properties.insert("lineageTag", "abc");

        let Declaration::Column(col) = Declaration::from_node(&node) else {
            panic!("expected column");
        };
        assert_eq!(col.data_type.as_deref(), Some("decimal"));
        assert!(col.is_hidden);
        assert!(!col.is_key);
        assert_eq!(col.properties.get("lineageTag"), Some("abc"));
        assert!(col.properties.get("dataType").is_none());
    }

    #[test]
    fn typed_measure_finds_untagged_expression() {
        let mut node = DeclarationNode::new(DeclarationKind::Measure, "Margin");
        node.properties.insert("formatString", "0.0%");
        node.properties.insert("body", "DIVIDE([Profit], [Revenue])");

        let Declaration::Measure(m) = Declaration::from_node(&node) else {
            panic!("expected measure");
        };
        assert_eq!(m.expression.as_deref(), Some("DIVIDE([Profit], [Revenue])"));
        assert_eq!(m.expression_key.as_deref(), Some("body"));
        assert_eq!(m.format_string.as_deref(), Some("0.0%"));
    }

    #[test]
    fn parameter_meta_is_split() {
        let (expr, is_param) =
            split_parameter_meta(r#""localhost" meta [IsParameterQuery=true, Type="Text"]"#);
        assert_eq!(expr, "\"localhost\"");
        assert!(is_param);

        let (expr, is_param) = split_parameter_meta("let Source = 1 in Source");
        assert_eq!(expr, "let Source = 1 in Source");
        assert!(!is_param);
    }

    #[test]
    fn relationship_endpoints_are_decomposed() {
        let mut node = DeclarationNode::new(DeclarationKind::Relationship, "r1");
        node.properties.insert("fromColumn", "'Sales'.'Order Date'");
        node.properties.insert("toColumn", "Date.Date");
        node.properties.insert("isActive", "false");

        let Declaration::Relationship(rel) = Declaration::from_node(&node) else {
            panic!("expected relationship");
        };
        assert_eq!(rel.from, Some(("Sales".to_string(), "Order Date".to_string())));
        assert_eq!(rel.to, Some(("Date".to_string(), "Date".to_string())));
        assert!(!rel.is_active);
    }
}
