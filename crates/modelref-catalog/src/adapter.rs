//! Source trait for populating a model catalog

use modelref_core::{Diagnostic, ErrorClass, ModelCatalog};
use modelref_report::Report;
use modelref_tmdl::LoadError;
use std::path::PathBuf;

/// A catalog plus whatever the source skipped or approximated while building it
#[derive(Debug, Clone, Default)]
pub struct LoadedModel {
    pub catalog: ModelCatalog,
    pub diagnostics: Vec<Diagnostic>,
}

/// A normalized report plus diagnostics for skipped files
#[derive(Debug, Clone, Default)]
pub struct LoadedReport {
    pub report: Report,
    pub diagnostics: Vec<Diagnostic>,
}

/// Errors that can occur when loading a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Source folder not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("Parse worker failed: {0}")]
    Worker(String),
}

impl SourceError {
    /// Stable classification used in query responses
    pub fn error_class(&self) -> ErrorClass {
        match self {
            Self::NotFound(_) | Self::Io { .. } | Self::Worker(_) => ErrorClass::IoError,
            Self::InvalidMetadata(_) => ErrorClass::ParseError,
        }
    }
}

impl From<LoadError> for SourceError {
    fn from(error: LoadError) -> Self {
        match error {
            LoadError::Io { path, source } => Self::Io { path, source },
        }
    }
}

/// Trait for anything that can produce a model catalog
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    /// Get the source name (e.g., "tmdl-folder", "metadata-rows")
    fn name(&self) -> &'static str;

    /// Load the catalog
    ///
    /// Only I/O-level failures are errors; malformed content is skipped and
    /// reported through `LoadedModel::diagnostics`.
    async fn load(&self) -> Result<LoadedModel, SourceError>;
}

/// Trait for anything that can produce report visuals
#[async_trait::async_trait]
pub trait ReportSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn load_report(&self) -> Result<LoadedReport, SourceError>;
}
