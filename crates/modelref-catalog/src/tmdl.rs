//! Model-definition folder source
//!
//! Walks a folder for `*.tmdl` files, parses them on blocking workers with
//! bounded concurrency, and lowers the documents into one catalog in path
//! order so the result does not depend on worker scheduling.

use modelref_core::{Config, Diagnostic, DiagnosticCode, Location, Severity};
use modelref_tmdl::{build_catalog, parse_with_diagnostics, ParseOutput};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::adapter::{CatalogSource, LoadedModel, SourceError};

/// Directory names never descended into
pub const IGNORED_DIRS: [&str; 4] = [".git", ".pbi", "node_modules", "target"];

/// Loads a catalog from a folder of model-definition files
#[derive(Debug, Clone)]
pub struct TmdlFolderSource {
    root: PathBuf,

    /// Maximum files parsed at once
    workers: usize,
}

impl TmdlFolderSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            workers: Config::default().parse_workers,
        }
    }

    pub fn from_config(root: impl Into<PathBuf>, config: &Config) -> Self {
        Self::new(root).with_workers(config.parse_workers)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All `*.tmdl` files under the root, sorted by path
    pub fn discover(&self) -> Result<Vec<PathBuf>, SourceError> {
        if !self.root.is_dir() {
            return Err(SourceError::NotFound(self.root.clone()));
        }

        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| {
                !(e.file_type().is_dir()
                    && e.depth() > 0
                    && IGNORED_DIRS.iter().any(|d| e.file_name() == *d))
            })
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmdl"))
            .map(|e| e.into_path())
            .collect();
        files.sort();

        debug!(root = %self.root.display(), files = files.len(), "discovered model-definition files");
        Ok(files)
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

/// Outcome of one file
enum FileResult {
    Parsed(ParseOutput),
    Skipped(std::io::Error),
}

#[async_trait::async_trait]
impl CatalogSource for TmdlFolderSource {
    fn name(&self) -> &'static str {
        "tmdl-folder"
    }

    async fn load(&self) -> Result<LoadedModel, SourceError> {
        let files = self.discover()?;
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for (position, path) in files.iter().enumerate() {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| SourceError::Worker(e.to_string()))?;
            let path = path.clone();
            let label = self.relative(&path);

            tasks.spawn_blocking(move || {
                let _permit = permit;
                let result = match std::fs::read_to_string(&path) {
                    Ok(text) => FileResult::Parsed(parse_with_diagnostics(&text, &label)),
                    Err(e) => FileResult::Skipped(e),
                };
                (position, label, result)
            });
        }

        let mut results = Vec::with_capacity(files.len());
        while let Some(joined) = tasks.join_next().await {
            results.push(joined.map_err(|e| SourceError::Worker(e.to_string()))?);
        }
        results.sort_by_key(|(position, _, _)| *position);

        let mut documents = Vec::with_capacity(results.len());
        let mut diagnostics = Vec::new();
        for (_, label, result) in results {
            match result {
                FileResult::Parsed(output) => {
                    diagnostics.extend(output.diagnostics);
                    documents.push(output.root);
                }
                FileResult::Skipped(error) => {
                    warn!(file = %label, %error, "skipping unreadable model-definition file");
                    diagnostics.push(
                        Diagnostic::new(
                            DiagnosticCode::SourceFileSkipped,
                            Severity::Warn,
                            format!("Could not read {label}: {error}"),
                        )
                        .with_location(Location::new(label)),
                    );
                }
            }
        }

        let catalog = build_catalog(&documents);
        info!(
            root = %self.root.display(),
            files = documents.len(),
            skipped = files.len() - documents.len(),
            "loaded model-definition folder"
        );

        Ok(LoadedModel {
            catalog,
            diagnostics,
        })
    }
}
