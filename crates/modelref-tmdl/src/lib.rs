//! Model-definition parsing
//!
//! This crate handles:
//! - Parsing indentation-based model-definition text into declaration trees
//! - Typed views over declarations (tables, columns, measures, relationships, ...)
//! - Decomposing relationship column references
//! - Locating measure expressions stored under untagged properties
//! - Lowering parsed documents into a `ModelCatalog`

pub mod catalog;
pub mod declaration;
pub mod expression;
pub mod parser;
pub mod relationship;

pub use catalog::build_catalog;
pub use declaration::{
    ColumnDecl, CultureDecl, Declaration, DeclarationKind, DeclarationNode, ExpressionDecl,
    HierarchyDecl, MeasureDecl, PartitionDecl, PropertyBag, RelationshipDecl, RoleDecl, TableDecl,
};
pub use expression::{locate_expression, looks_like_expression};
pub use parser::{parse, parse_file, parse_with_diagnostics, LoadError, ParseOutput};
pub use relationship::{decompose_column_ref, encode_column_ref};
