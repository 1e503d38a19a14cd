//! Catalog and report sources
//!
//! This module provides sources that populate the common model catalog and
//! the normalized report shape:
//! - `TmdlFolderSource` - a folder of model-definition files, parsed concurrently
//! - `MetadataRowsSource` - rows already fetched from a live metadata query
//! - `ReportFolderSource` - a report `definition/` folder of page and visual JSON
//!
//! ## Example
//!
//! ```rust,ignore
//! use modelref_catalog::{CatalogSource, TmdlFolderSource};
//!
//! let source = TmdlFolderSource::new("SalesModel.SemanticModel/definition");
//! let loaded = source.load().await?;
//! println!("{} tables", loaded.catalog.tables.len());
//! ```

pub mod adapter;
pub mod report;
pub mod rows;
pub mod tmdl;

pub use adapter::{CatalogSource, LoadedModel, LoadedReport, ReportSource, SourceError};
pub use report::{ReportFolderSource, StaticReportSource};
pub use rows::{ColumnRow, MeasureRow, MetadataRows, MetadataRowsSource, RelationshipRow, TableRow};
pub use tmdl::TmdlFolderSource;
