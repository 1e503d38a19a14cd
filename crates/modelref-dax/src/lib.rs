//! Calculation-language reference resolution
//!
//! This crate handles:
//! - Stripping comments and blanking string literals before scanning
//! - Indexing measure and column metadata for case-insensitive lookups
//! - Extracting and classifying table, column and measure references

pub mod comments;
pub mod index;
pub mod resolver;

pub use comments::{prepare, strip_comments};
pub use index::{build_index, ReferenceIndex};
pub use resolver::{resolve, ResolvedReferences};
