//! Model catalog types
//!
//! The catalog is the flattened, queryable view of a tabular model: tables
//! owning columns and measures, relationships between columns, and named
//! expressions. It is built once per source snapshot and never mutated
//! afterwards; a re-parse rebuilds it wholesale.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Graph key of a measure or column, rendered as `Table[Name]`
pub type ObjectKey = String;

/// Build the graph key `Table[Name]`
pub fn object_key(table: &str, name: &str) -> ObjectKey {
    format!("{}[{}]", table, name)
}

/// Case-fold an identifier for lookups
pub fn fold(s: &str) -> String {
    s.to_lowercase()
}

/// Build the case-folded `table|name` lookup key
pub fn normalize_key(table: &str, name: &str) -> String {
    format!("{}|{}", fold(table), fold(name))
}

/// Reference to a measure or column owned by a table
///
/// An empty `table` marks a reference whose owner could not be determined.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Owning table (empty when unresolved)
    pub table: String,

    /// Measure or column name
    pub name: String,
}

impl ObjectRef {
    /// Create a reference owned by `table`
    pub fn new(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
        }
    }

    /// Create a reference with no known owning table
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self::new(String::new(), name)
    }

    /// Whether the owning table is unknown
    pub fn is_unresolved(&self) -> bool {
        self.table.is_empty()
    }

    /// Graph key (`Table[Name]`)
    pub fn key(&self) -> ObjectKey {
        object_key(&self.table, &self.name)
    }

    /// Case-folded `table|name` lookup key
    pub fn normalized(&self) -> String {
        normalize_key(&self.table, &self.name)
    }

    /// Case-insensitive comparison
    pub fn matches(&self, table: &str, name: &str) -> bool {
        fold(&self.table) == fold(table) && fold(&self.name) == fold(name)
    }

    /// Parse a `Table[Name]` key back into a reference
    pub fn parse_key(key: &str) -> Option<Self> {
        let body = key.strip_suffix(']')?;
        let open = body.find('[')?;
        Some(Self::new(&body[..open], &body[open + 1..]))
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.table, self.name)
    }
}

/// A `{Table, Name}` metadata row used to seed the reference index
///
/// Rows may come from the parsed catalog or from a live metadata query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRow {
    #[serde(alias = "Table", alias = "TableName")]
    pub table: String,

    #[serde(alias = "Name", alias = "MeasureName", alias = "ColumnName")]
    pub name: String,
}

impl MetadataRow {
    pub fn new(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
        }
    }
}

/// Relationship cross-filter direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CrossFilterDirection {
    /// Filters flow from the one side to the many side
    #[default]
    Single,

    /// Filters flow in both directions
    Both,

    /// Engine decides
    Automatic,
}

impl CrossFilterDirection {
    /// Map a model-definition value (`oneDirection`, `bothDirections`, ...)
    pub fn from_model_value(value: &str) -> Self {
        match fold(value.trim()).as_str() {
            "bothdirections" | "both" => Self::Both,
            "automatic" => Self::Automatic,
            _ => Self::Single,
        }
    }
}

impl fmt::Display for CrossFilterDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Both => write!(f, "both"),
            Self::Automatic => write!(f, "automatic"),
        }
    }
}

/// A column owned by a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Owning table
    pub table: String,

    /// Column name
    pub name: String,

    /// Declared data type (`string`, `int64`, `decimal`, ...)
    #[serde(default)]
    pub data_type: Option<String>,

    /// Calculation expression, present only for calculated columns
    #[serde(default)]
    pub expression: Option<String>,

    /// Source column in the partition query
    #[serde(default)]
    pub source_column: Option<String>,

    #[serde(default)]
    pub is_hidden: bool,

    /// Marked as the table's key column
    #[serde(default)]
    pub is_key: bool,

    #[serde(default)]
    pub display_folder: Option<String>,

    #[serde(default)]
    pub format_string: Option<String>,

    #[serde(default)]
    pub summarize_by: Option<String>,

    #[serde(default)]
    pub sort_by_column: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Remaining properties not promoted to typed fields
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Column {
    /// Create a plain data column
    pub fn new(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
            data_type: None,
            expression: None,
            source_column: None,
            is_hidden: false,
            is_key: false,
            display_folder: None,
            format_string: None,
            summarize_by: None,
            sort_by_column: None,
            description: None,
            properties: BTreeMap::new(),
        }
    }

    /// Set the data type
    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }

    /// Make this a calculated column
    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    /// Set the hidden flag
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.is_hidden = hidden;
        self
    }

    /// Set the key flag
    pub fn with_key(mut self, is_key: bool) -> Self {
        self.is_key = is_key;
        self
    }

    /// Whether the column derives from an expression
    pub fn is_calculated(&self) -> bool {
        self.expression.is_some()
    }

    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(&self.table, &self.name)
    }

    pub fn key(&self) -> ObjectKey {
        object_key(&self.table, &self.name)
    }
}

/// A measure owned by a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measure {
    /// Owning table
    pub table: String,

    /// Measure name
    pub name: String,

    /// Calculation expression (may be empty when the source omitted it)
    #[serde(default)]
    pub expression: String,

    #[serde(default)]
    pub display_folder: Option<String>,

    #[serde(default)]
    pub format_string: Option<String>,

    #[serde(default)]
    pub is_hidden: bool,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Measure {
    pub fn new(table: impl Into<String>, name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
            expression: expression.into(),
            display_folder: None,
            format_string: None,
            is_hidden: false,
            description: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(&self.table, &self.name)
    }

    pub fn key(&self) -> ObjectKey {
        object_key(&self.table, &self.name)
    }
}

/// A table partition (data source binding)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub name: String,

    /// Source kind declared after `=` (`m`, `calculated`, `entity`, ...)
    #[serde(default)]
    pub source_kind: Option<String>,

    /// Storage mode (`import`, `directQuery`, ...)
    #[serde(default)]
    pub mode: Option<String>,

    /// Source query or expression text
    #[serde(default)]
    pub source: Option<String>,
}

/// One level of a hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyLevel {
    pub name: String,

    /// Column the level is bound to
    #[serde(default)]
    pub column: Option<String>,
}

/// A user hierarchy over a table's columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hierarchy {
    pub name: String,

    #[serde(default)]
    pub levels: Vec<HierarchyLevel>,
}

/// A table with its columns, measures and partitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub is_hidden: bool,

    #[serde(default)]
    pub columns: Vec<Column>,

    #[serde(default)]
    pub measures: Vec<Measure>,

    #[serde(default)]
    pub partitions: Vec<Partition>,

    #[serde(default)]
    pub hierarchies: Vec<Hierarchy>,

    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Table {
    /// Create an empty table
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            is_hidden: false,
            columns: Vec::new(),
            measures: Vec::new(),
            partitions: Vec::new(),
            hierarchies: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Add a column, taking ownership of it for this table
    pub fn with_column(mut self, mut column: Column) -> Self {
        column.table = self.name.clone();
        self.columns.push(column);
        self
    }

    /// Add a measure, taking ownership of it for this table
    pub fn with_measure(mut self, mut measure: Measure) -> Self {
        measure.table = self.name.clone();
        self.measures.push(measure);
        self
    }

    /// Find a column by name (case-insensitive)
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        let folded = fold(name);
        self.columns.iter().find(|c| fold(&c.name) == folded)
    }

    /// Find a measure by name (case-insensitive)
    pub fn find_measure(&self, name: &str) -> Option<&Measure> {
        let folded = fold(name);
        self.measures.iter().find(|m| fold(&m.name) == folded)
    }
}

/// A relationship between two columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// Relationship identifier (often a GUID)
    pub name: String,

    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,

    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(default)]
    pub cross_filter: CrossFilterDirection,

    #[serde(default)]
    pub from_cardinality: Option<String>,

    #[serde(default)]
    pub to_cardinality: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Relationship {
    /// Create an active single-direction relationship
    pub fn new(
        name: impl Into<String>,
        from: (impl Into<String>, impl Into<String>),
        to: (impl Into<String>, impl Into<String>),
    ) -> Self {
        Self {
            name: name.into(),
            from_table: from.0.into(),
            from_column: from.1.into(),
            to_table: to.0.into(),
            to_column: to.1.into(),
            is_active: true,
            cross_filter: CrossFilterDirection::Single,
            from_cardinality: None,
            to_cardinality: None,
        }
    }

    pub fn from_ref(&self) -> ObjectRef {
        ObjectRef::new(&self.from_table, &self.from_column)
    }

    pub fn to_ref(&self) -> ObjectRef {
        ObjectRef::new(&self.to_table, &self.to_column)
    }

    /// Whether either endpoint is the given column (case-insensitive)
    pub fn touches(&self, table: &str, column: &str) -> bool {
        self.from_ref().matches(table, column) || self.to_ref().matches(table, column)
    }
}

/// A named, non-tabular expression (shared query or parameter)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedExpression {
    pub name: String,

    #[serde(default)]
    pub expression: String,

    /// Declared as a query parameter (`meta [IsParameterQuery=true]`)
    #[serde(default)]
    pub is_parameter: bool,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// Row-level filter on one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePermission {
    pub table: String,

    #[serde(default)]
    pub filter_expression: Option<String>,
}

/// A security role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,

    #[serde(default)]
    pub model_permission: Option<String>,

    #[serde(default)]
    pub table_permissions: Vec<TablePermission>,
}

/// Object counts for a catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CatalogStats {
    pub tables: usize,
    pub columns: usize,
    pub calculated_columns: usize,
    pub measures: usize,
    pub relationships: usize,
    pub expressions: usize,
}

/// The flattened model catalog
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelCatalog {
    /// Model name, when the source declares one
    #[serde(default)]
    pub name: Option<String>,

    /// Tables in enumeration order
    #[serde(default)]
    pub tables: Vec<Table>,

    #[serde(default)]
    pub relationships: Vec<Relationship>,

    #[serde(default)]
    pub expressions: Vec<NamedExpression>,

    #[serde(default)]
    pub roles: Vec<Role>,

    /// Culture names (`en-US`, ...)
    #[serde(default)]
    pub cultures: Vec<String>,
}

impl ModelCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table
    pub fn with_table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    /// Add a relationship
    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Find a table by name (case-insensitive)
    pub fn find_table(&self, name: &str) -> Option<&Table> {
        let folded = fold(name);
        self.tables.iter().find(|t| fold(&t.name) == folded)
    }

    /// Find a measure by owning table and name
    pub fn find_measure(&self, table: &str, name: &str) -> Option<&Measure> {
        self.find_table(table).and_then(|t| t.find_measure(name))
    }

    /// Find a column by owning table and name
    pub fn find_column(&self, table: &str, name: &str) -> Option<&Column> {
        self.find_table(table).and_then(|t| t.find_column(name))
    }

    /// All measures in catalog order
    pub fn measures(&self) -> impl Iterator<Item = &Measure> {
        self.tables.iter().flat_map(|t| t.measures.iter())
    }

    /// All columns in catalog order
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.tables.iter().flat_map(|t| t.columns.iter())
    }

    /// Calculated columns in catalog order
    pub fn calculated_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns().filter(|c| c.is_calculated())
    }

    /// `{Table, Name}` rows for every measure
    pub fn measure_rows(&self) -> Vec<MetadataRow> {
        self.measures()
            .map(|m| MetadataRow::new(&m.table, &m.name))
            .collect()
    }

    /// `{Table, Name}` rows for every column
    pub fn column_rows(&self) -> Vec<MetadataRow> {
        self.columns()
            .map(|c| MetadataRow::new(&c.table, &c.name))
            .collect()
    }

    /// Object counts
    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            tables: self.tables.len(),
            columns: self.columns().count(),
            calculated_columns: self.calculated_columns().count(),
            measures: self.measures().count(),
            relationships: self.relationships.len(),
            expressions: self.expressions.len(),
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
