//! Catalog from already-fetched live metadata rows
//!
//! Row field names accept both snake_case and the PascalCase spellings used
//! by metadata queries (`TableName`, `IsHidden`, ...). Fetching the rows is the
//! caller's job.

use modelref_core::{
    fold, Column, CrossFilterDirection, Diagnostic, DiagnosticCode, Measure, ModelCatalog,
    Relationship, Severity, Table,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::adapter::{CatalogSource, LoadedModel, SourceError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    #[serde(alias = "Name", alias = "TableName")]
    pub name: String,

    #[serde(default, alias = "IsHidden")]
    pub is_hidden: bool,

    #[serde(default, alias = "Description")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRow {
    #[serde(alias = "Table", alias = "TableName")]
    pub table: String,

    #[serde(alias = "Name", alias = "ColumnName")]
    pub name: String,

    #[serde(default, alias = "DataType")]
    pub data_type: Option<String>,

    /// Set for calculated columns
    #[serde(default, alias = "Expression")]
    pub expression: Option<String>,

    #[serde(default, alias = "IsHidden")]
    pub is_hidden: bool,

    #[serde(default, alias = "IsKey")]
    pub is_key: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasureRow {
    #[serde(alias = "Table", alias = "TableName")]
    pub table: String,

    #[serde(alias = "Name", alias = "MeasureName")]
    pub name: String,

    #[serde(default, alias = "Expression")]
    pub expression: String,

    #[serde(default, alias = "IsHidden")]
    pub is_hidden: bool,

    #[serde(default, alias = "DisplayFolder")]
    pub display_folder: Option<String>,

    #[serde(default, alias = "FormatString")]
    pub format_string: Option<String>,

    #[serde(default, alias = "Description")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipRow {
    #[serde(default, alias = "Name")]
    pub name: String,

    #[serde(alias = "FromTable", alias = "FromTableName")]
    pub from_table: String,

    #[serde(alias = "FromColumn", alias = "FromColumnName")]
    pub from_column: String,

    #[serde(alias = "ToTable", alias = "ToTableName")]
    pub to_table: String,

    #[serde(alias = "ToColumn", alias = "ToColumnName")]
    pub to_column: String,

    #[serde(default = "default_true", alias = "IsActive")]
    pub is_active: bool,

    #[serde(default, alias = "CrossFilteringBehavior")]
    pub cross_filter: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Every row kind a metadata query returns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRows {
    #[serde(default, alias = "Tables")]
    pub tables: Vec<TableRow>,

    #[serde(default, alias = "Columns")]
    pub columns: Vec<ColumnRow>,

    #[serde(default, alias = "Measures")]
    pub measures: Vec<MeasureRow>,

    #[serde(default, alias = "Relationships")]
    pub relationships: Vec<RelationshipRow>,
}

/// Builds a catalog from metadata rows
#[derive(Debug, Clone, Default)]
pub struct MetadataRowsSource {
    rows: MetadataRows,
}

impl MetadataRowsSource {
    pub fn new(rows: MetadataRows) -> Self {
        Self { rows }
    }

    /// Rows serialized as one JSON object with `tables`, `columns`, `measures`, `relationships`
    pub fn from_json(json: &str) -> Result<Self, SourceError> {
        let rows = serde_json::from_str(json).map_err(|e| SourceError::InvalidMetadata(e.to_string()))?;
        Ok(Self::new(rows))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, SourceError> {
        let json = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn rows(&self) -> &MetadataRows {
        &self.rows
    }

    /// Lower rows into a catalog
    ///
    /// Tables appear in row order, followed by tables only named by column or
    /// measure rows. Rows missing an owner or a name are skipped.
    pub fn build(&self) -> LoadedModel {
        let mut catalog = ModelCatalog::new();
        let mut diagnostics = Vec::new();

        for row in &self.rows.tables {
            if row.name.trim().is_empty() {
                skipped(&mut diagnostics, "table", "", "");
                continue;
            }
            let table = table_entry(&mut catalog, &row.name);
            table.is_hidden = row.is_hidden;
            table.description = row.description.clone();
        }

        for row in &self.rows.columns {
            if row.table.trim().is_empty() || row.name.trim().is_empty() {
                skipped(&mut diagnostics, "column", &row.table, &row.name);
                continue;
            }
            let mut column = Column::new(&row.table, &row.name)
                .with_hidden(row.is_hidden)
                .with_key(row.is_key);
            column.data_type = row.data_type.clone();
            column.expression = row.expression.clone().filter(|e| !e.trim().is_empty());
            let table = table_entry(&mut catalog, &row.table);
            column.table = table.name.clone();
            table.columns.push(column);
        }

        for row in &self.rows.measures {
            if row.table.trim().is_empty() || row.name.trim().is_empty() {
                skipped(&mut diagnostics, "measure", &row.table, &row.name);
                continue;
            }
            let mut measure = Measure::new(&row.table, &row.name, &row.expression);
            measure.is_hidden = row.is_hidden;
            measure.display_folder = row.display_folder.clone();
            measure.format_string = row.format_string.clone();
            measure.description = row.description.clone();
            let table = table_entry(&mut catalog, &row.table);
            measure.table = table.name.clone();
            table.measures.push(measure);
        }

        for row in &self.rows.relationships {
            let mut relationship = Relationship::new(
                &row.name,
                (&row.from_table, &row.from_column),
                (&row.to_table, &row.to_column),
            );
            relationship.is_active = row.is_active;
            if let Some(direction) = &row.cross_filter {
                relationship.cross_filter = CrossFilterDirection::from_model_value(direction);
            }
            catalog.relationships.push(relationship);
        }

        let stats = catalog.stats();
        info!(
            tables = stats.tables,
            columns = stats.columns,
            measures = stats.measures,
            relationships = stats.relationships,
            "built catalog from metadata rows"
        );

        LoadedModel {
            catalog,
            diagnostics,
        }
    }
}

/// Find a table by folded name, creating it when missing
fn table_entry<'a>(catalog: &'a mut ModelCatalog, name: &str) -> &'a mut Table {
    let folded = fold(name);
    match catalog.tables.iter().position(|t| fold(&t.name) == folded) {
        Some(position) => &mut catalog.tables[position],
        None => {
            catalog.tables.push(Table::new(name));
            let last = catalog.tables.len() - 1;
            &mut catalog.tables[last]
        }
    }
}

fn skipped(diagnostics: &mut Vec<Diagnostic>, kind: &str, table: &str, name: &str) {
    debug!(kind, table, name, "skipping metadata row without owner or name");
    diagnostics.push(Diagnostic::new(
        DiagnosticCode::Warning,
        Severity::Warn,
        format!("Skipped {kind} row without owner or name ({table:?}, {name:?})"),
    ));
}

#[async_trait::async_trait]
impl CatalogSource for MetadataRowsSource {
    fn name(&self) -> &'static str {
        "metadata-rows"
    }

    async fn load(&self) -> Result<LoadedModel, SourceError> {
        Ok(self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ROWS: &str = r#"{
        "Tables": [ { "Name": "Sales" }, { "Name": "Date", "IsHidden": false } ],
        "Columns": [
            { "TableName": "Sales", "ColumnName": "Amount", "DataType": "Decimal" },
            { "TableName": "sales", "ColumnName": "Net", "Expression": "Sales[Amount] * 0.9" },
            { "TableName": "Date", "ColumnName": "Date", "IsKey": true },
            { "TableName": "", "ColumnName": "Orphan" }
        ],
        "Measures": [
            { "TableName": "Sales", "MeasureName": "Total", "Expression": "SUM(Sales[Amount])" },
            { "TableName": "Budget", "MeasureName": "Plan", "Expression": "1000" }
        ],
        "Relationships": [
            { "FromTable": "Sales", "FromColumn": "Date", "ToTable": "Date", "ToColumn": "Date",
              "CrossFilteringBehavior": "bothDirections" }
        ]
    }"#;

    #[test]
    fn rows_lower_into_catalog() {
        let loaded = MetadataRowsSource::from_json(ROWS).unwrap().build();
        let catalog = &loaded.catalog;

        let names: Vec<_> = catalog.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Sales", "Date", "Budget"]);

        let net = catalog.find_column("Sales", "Net").unwrap();
        assert_eq!(net.table, "Sales");
        assert!(net.is_calculated());
        assert!(catalog.find_column("Date", "Date").unwrap().is_key);

        let relationship = &catalog.relationships[0];
        assert_eq!(relationship.cross_filter, CrossFilterDirection::Both);
        assert!(relationship.is_active);

        assert_eq!(loaded.diagnostics.len(), 1);
        assert_eq!(loaded.diagnostics[0].code, DiagnosticCode::Warning);
    }

    #[test]
    fn malformed_json_is_invalid_metadata() {
        let error = MetadataRowsSource::from_json("{ \"Tables\": 3 }").unwrap_err();
        assert!(matches!(error, SourceError::InvalidMetadata(_)));
    }

    #[test]
    fn snake_case_rows_deserialize() {
        let rows: MetadataRows = serde_json::from_str(
            r#"{ "measures": [ { "table": "T", "name": "M", "expression": "1", "is_hidden": true } ] }"#,
        )
        .unwrap();
        assert!(rows.measures[0].is_hidden);
        assert!(rows.tables.is_empty());
    }
}
