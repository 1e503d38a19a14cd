//! Normalized report shapes
//!
//! page → visual → `{visual_type, fields: {columns, measures}, filters}`.
//! Whatever file format a report came from is reduced to this before the
//! dependency graph sees it.

use modelref_core::ObjectRef;
use serde::{Deserialize, Serialize};

/// A column bound in a visual
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnField {
    pub table: String,
    pub column: String,
}

impl ColumnField {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(&self.table, &self.column)
    }
}

/// A measure bound in a visual
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeasureField {
    pub table: String,
    pub measure: String,
}

impl MeasureField {
    pub fn new(table: impl Into<String>, measure: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            measure: measure.into(),
        }
    }

    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(&self.table, &self.measure)
    }
}

/// One extracted field binding
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldRef {
    Column(ColumnField),
    Measure(MeasureField),
}

/// Columns and measures bound by a visual, deduplicated in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualFields {
    #[serde(default)]
    pub columns: Vec<ColumnField>,

    #[serde(default)]
    pub measures: Vec<MeasureField>,
}

impl VisualFields {
    pub fn push(&mut self, field: FieldRef) {
        match field {
            FieldRef::Column(c) => {
                if !self.columns.contains(&c) {
                    self.columns.push(c);
                }
            }
            FieldRef::Measure(m) => {
                if !self.measures.contains(&m) {
                    self.measures.push(m);
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.measures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len() + self.measures.len()
    }
}

impl Extend<FieldRef> for VisualFields {
    fn extend<I: IntoIterator<Item = FieldRef>>(&mut self, iter: I) {
        for field in iter {
            self.push(field);
        }
    }
}

/// A visual on a report page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVisual {
    pub id: String,

    #[serde(default)]
    pub visual_type: String,

    /// Owning page name
    pub page: String,

    /// Fields bound in projection slots
    #[serde(default)]
    pub fields: VisualFields,

    /// Fields used only by the visual's filters
    #[serde(default)]
    pub filters: VisualFields,
}

impl ReportVisual {
    pub fn new(id: impl Into<String>, visual_type: impl Into<String>, page: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            visual_type: visual_type.into(),
            page: page.into(),
            fields: VisualFields::default(),
            filters: VisualFields::default(),
        }
    }

    pub fn with_column(mut self, table: &str, column: &str) -> Self {
        self.fields.push(FieldRef::Column(ColumnField::new(table, column)));
        self
    }

    pub fn with_measure(mut self, table: &str, measure: &str) -> Self {
        self.fields.push(FieldRef::Measure(MeasureField::new(table, measure)));
        self
    }

    pub fn with_filter_column(mut self, table: &str, column: &str) -> Self {
        self.filters.push(FieldRef::Column(ColumnField::new(table, column)));
        self
    }
}

/// A report page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPage {
    /// Page identifier (folder name)
    pub name: String,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub visuals: Vec<ReportVisual>,
}

impl ReportPage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            visuals: Vec::new(),
        }
    }

    /// Display name when set, otherwise the page identifier
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// A whole report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    #[serde(default)]
    pub pages: Vec<ReportPage>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: ReportPage) -> Self {
        self.pages.push(page);
        self
    }

    /// Every visual across pages
    pub fn visuals(&self) -> impl Iterator<Item = &ReportVisual> {
        self.pages.iter().flat_map(|p| p.visuals.iter())
    }

    pub fn visual_count(&self) -> usize {
        self.pages.iter().map(|p| p.visuals.len()).sum()
    }
}
