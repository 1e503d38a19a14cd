//! Reference index over model metadata
//!
//! Built once per catalog from `{Table, Name}` rows and shared read-only by
//! every resolution. All lookups are case-insensitive.

use modelref_core::{fold, normalize_key, MetadataRow, ModelCatalog, ObjectRef};
use std::collections::{BTreeSet, HashMap};

/// Lookup structure for classifying expression identifiers
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    /// Normalized `table|name` → canonical measure reference
    measure_keys: HashMap<String, ObjectRef>,

    /// Normalized `table|name` → canonical column reference
    column_keys: HashMap<String, ObjectRef>,

    /// Folded bare name → owning tables
    measure_names: HashMap<String, BTreeSet<String>>,

    /// Folded bare name → owning tables
    column_names: HashMap<String, BTreeSet<String>>,

    /// Folded table name → canonical table name
    tables: HashMap<String, String>,
}

/// Build an index from measure and column metadata rows
///
/// Rows may come from a parsed catalog or from a live metadata query.
pub fn build_index(measure_rows: &[MetadataRow], column_rows: &[MetadataRow]) -> ReferenceIndex {
    let mut index = ReferenceIndex::default();

    for row in measure_rows {
        index.add_measure(&row.table, &row.name);
    }
    for row in column_rows {
        index.add_column(&row.table, &row.name);
    }

    tracing::debug!(
        measures = index.measure_keys.len(),
        columns = index.column_keys.len(),
        tables = index.tables.len(),
        "built reference index"
    );

    index
}

impl ReferenceIndex {
    /// Build from a catalog, including tables that own no columns or measures
    pub fn from_catalog(catalog: &ModelCatalog) -> Self {
        let mut index = build_index(&catalog.measure_rows(), &catalog.column_rows());
        for table in &catalog.tables {
            index.add_table(&table.name);
        }
        index
    }

    pub fn add_table(&mut self, table: &str) {
        if !table.is_empty() {
            self.tables
                .entry(fold(table))
                .or_insert_with(|| table.to_string());
        }
    }

    pub fn add_measure(&mut self, table: &str, name: &str) {
        if let Some(owner) = self.owner(table, name) {
            Self::add_entry(&mut self.measure_keys, &mut self.measure_names, &owner, name);
        }
    }

    pub fn add_column(&mut self, table: &str, name: &str) {
        if let Some(owner) = self.owner(table, name) {
            Self::add_entry(&mut self.column_keys, &mut self.column_names, &owner, name);
        }
    }

    /// Canonical spelling of a row's table, registering it on first sight
    fn owner(&mut self, table: &str, name: &str) -> Option<String> {
        if table.is_empty() || name.is_empty() {
            tracing::debug!(table, name, "skipping metadata row without owner or name");
            return None;
        }
        self.add_table(table);
        self.tables.get(&fold(table)).cloned()
    }

    fn add_entry(
        keys: &mut HashMap<String, ObjectRef>,
        names: &mut HashMap<String, BTreeSet<String>>,
        owner: &str,
        name: &str,
    ) {
        keys.entry(normalize_key(owner, name))
            .or_insert_with(|| ObjectRef::new(owner, name));
        names.entry(fold(name)).or_default().insert(owner.to_string());
    }

    /// Whether `table[name]` is a known measure
    pub fn is_measure(&self, table: &str, name: &str) -> bool {
        self.measure_keys.contains_key(&normalize_key(table, name))
    }

    /// Whether `table[name]` is a known column
    pub fn is_column(&self, table: &str, name: &str) -> bool {
        self.column_keys.contains_key(&normalize_key(table, name))
    }

    /// Canonically cased measure reference
    pub fn measure(&self, table: &str, name: &str) -> Option<&ObjectRef> {
        self.measure_keys.get(&normalize_key(table, name))
    }

    /// Canonically cased column reference
    pub fn column(&self, table: &str, name: &str) -> Option<&ObjectRef> {
        self.column_keys.get(&normalize_key(table, name))
    }

    /// Tables owning a measure with this name
    pub fn measure_owners(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.measure_names.get(&fold(name))
    }

    /// Tables owning a column with this name
    pub fn column_owners(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.column_names.get(&fold(name))
    }

    /// Canonical name of a known table
    pub fn table(&self, name: &str) -> Option<&str> {
        self.tables.get(&fold(name)).map(String::as_str)
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(&fold(name))
    }

    pub fn measure_count(&self) -> usize {
        self.measure_keys.len()
    }

    pub fn column_count(&self) -> usize {
        self.column_keys.len()
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}
