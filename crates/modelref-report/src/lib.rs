//! Report visual shapes
//!
//! This crate handles:
//! - The normalized page → visual → fields shape consumed by the dependency graph
//! - Extracting column and measure bindings from visual definitions

pub mod projection;
pub mod visual;

pub use projection::{extract_fields, extract_filters, extract_visual, field_ref, PROJECTION_SLOTS};
pub use visual::{
    ColumnField, FieldRef, MeasureField, Report, ReportPage, ReportVisual, VisualFields,
};
