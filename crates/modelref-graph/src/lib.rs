//! Dependency graph and usage analysis
//!
//! This crate handles:
//! - Building measure and column dependency graphs from resolved expressions
//! - Depth-bounded dependency trees with cycle marking
//! - Impact analysis (direct, visual and transitive dependents)
//! - Column usage and unused object detection
//! - Caching dependency trees per catalog fingerprint

pub mod cache;
pub mod graph;
pub mod impact;
pub mod tree;
pub mod unused;
pub mod visuals;

pub use cache::{catalog_fingerprint, AnalysisCache, CacheStats};
pub use graph::{DependencyGraph, GraphStats, Node, NodeId, NodeKind, UsageRules};
pub use impact::{ColumnUsage, ImpactReport, RelationshipRef, VisualRef};
pub use tree::DependencyNode;
pub use unused::UnusedObjects;
pub use visuals::{visual_field_usage, VisualUsage};
