//! modelref core
//!
//! Core domain model shared by every modelref crate: the model catalog,
//! object keys, diagnostics, the query response envelope and configuration.
//! Never rename diagnostic codes or error classes - they are part of the public API.

pub mod config;
pub mod diagnostic;
pub mod model;
pub mod response;

pub use config::{ColumnRules, Config, ConfigError, OutputLimits, VisualRules};
pub use diagnostic::{Diagnostic, DiagnosticCode, Location, Severity};
pub use model::{
    fold, normalize_key, object_key, CatalogStats, Column, CrossFilterDirection, Hierarchy,
    HierarchyLevel, Measure, MetadataRow, ModelCatalog, NamedExpression, ObjectKey, ObjectRef,
    Partition, Relationship, Role, Table, TablePermission,
};
pub use response::{ErrorClass, QueryResponse, ResponseVersion};
