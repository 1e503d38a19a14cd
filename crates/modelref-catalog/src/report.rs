//! Report folder source
//!
//! Reads `pages/<page>/page.json` for display names and
//! `pages/<page>/visuals/<visual>/visual.json` for bindings, reducing each
//! visual to the normalized shape. Pages and visuals are ordered by folder
//! name. Unreadable or malformed files are skipped with a diagnostic.

use modelref_core::{Diagnostic, DiagnosticCode, Location, Severity};
use modelref_report::{extract_visual, Report, ReportPage};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::adapter::{LoadedReport, ReportSource, SourceError};

/// Largest visual definition read into memory
pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Loads report visuals from a report `definition/` folder
#[derive(Debug, Clone)]
pub struct ReportFolderSource {
    root: PathBuf,
}

impl ReportFolderSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn pages_dir(&self) -> PathBuf {
        self.root.join("pages")
    }

    /// Read the whole folder synchronously
    pub fn read(&self) -> Result<LoadedReport, SourceError> {
        if !self.root.is_dir() {
            return Err(SourceError::NotFound(self.root.clone()));
        }

        let mut loaded = LoadedReport::default();
        let pages_dir = self.pages_dir();
        if !pages_dir.is_dir() {
            return Ok(loaded);
        }

        for page_dir in subdirectories(&pages_dir) {
            let page_name = folder_name(&page_dir);
            let mut page = ReportPage::new(&page_name);

            let page_file = page_dir.join("page.json");
            if page_file.is_file() {
                if let Some(definition) = self.read_json(&page_file, &mut loaded.diagnostics) {
                    page.display_name = definition
                        .get("displayName")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                }
            }

            let label = page.label().to_string();
            for visual_dir in subdirectories(&page_dir.join("visuals")) {
                let visual_file = visual_dir.join("visual.json");
                if !visual_file.is_file() {
                    continue;
                }
                let Some(definition) = self.read_json(&visual_file, &mut loaded.diagnostics) else {
                    continue;
                };
                if let Some(visual) = extract_visual(&definition, &label, &folder_name(&visual_dir)) {
                    page.visuals.push(visual);
                }
            }

            loaded.report.pages.push(page);
        }

        info!(
            root = %self.root.display(),
            pages = loaded.report.pages.len(),
            visuals = loaded.report.visual_count(),
            skipped = loaded.diagnostics.len(),
            "loaded report folder"
        );
        Ok(loaded)
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    fn read_json(&self, path: &Path, diagnostics: &mut Vec<Diagnostic>) -> Option<Value> {
        let label = self.relative(path);
        let skip = |reason: String, diagnostics: &mut Vec<Diagnostic>| {
            warn!(file = %label, %reason, "skipping report file");
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticCode::SourceFileSkipped,
                    Severity::Warn,
                    format!("Skipped {label}: {reason}"),
                )
                .with_location(Location::new(&label)),
            );
        };

        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > MAX_FILE_BYTES => {
                skip(format!("file too large ({} bytes)", meta.len()), diagnostics);
                return None;
            }
            Err(e) => {
                skip(e.to_string(), diagnostics);
                return None;
            }
            Ok(_) => {}
        }

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                skip(e.to_string(), diagnostics);
                return None;
            }
        };

        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                skip(format!("invalid JSON: {e}"), diagnostics);
                None
            }
        }
    }
}

/// Immediate subdirectories, sorted by name
fn subdirectories(dir: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .collect();
    dirs.sort();
    dirs
}

fn folder_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait::async_trait]
impl ReportSource for ReportFolderSource {
    fn name(&self) -> &'static str {
        "report-folder"
    }

    async fn load_report(&self) -> Result<LoadedReport, SourceError> {
        let source = self.clone();
        tokio::task::spawn_blocking(move || source.read())
            .await
            .map_err(|e| SourceError::Worker(e.to_string()))?
    }
}

/// An already-normalized report held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticReportSource {
    report: Report,
}

impl StaticReportSource {
    pub fn new(report: Report) -> Self {
        Self { report }
    }
}

#[async_trait::async_trait]
impl ReportSource for StaticReportSource {
    fn name(&self) -> &'static str {
        "static-report"
    }

    async fn load_report(&self) -> Result<LoadedReport, SourceError> {
        Ok(LoadedReport {
            report: self.report.clone(),
            diagnostics: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelref_report::ColumnField;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, relative: &str, content: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn pages_and_visuals_in_folder_order() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "pages/b/page.json", r#"{ "name": "b", "displayName": "Second" }"#);
        write(dir.path(), "pages/a/page.json", r#"{ "name": "a" }"#);
        write(
            dir.path(),
            "pages/b/visuals/v1/visual.json",
            r#"{ "name": "v1", "visual": { "visualType": "table", "query": { "queryState": {
                "Values": { "projections": [ { "field": { "Column": {
                    "Expression": { "SourceRef": { "Entity": "Sales" } }, "Property": "Amount" } } } ] }
            } } } }"#,
        );

        let loaded = ReportFolderSource::new(dir.path()).read().unwrap();
        let report = &loaded.report;

        let labels: Vec<_> = report.pages.iter().map(|p| p.label()).collect();
        assert_eq!(labels, vec!["a", "Second"]);
        assert_eq!(report.visual_count(), 1);

        let visual = &report.pages[1].visuals[0];
        assert_eq!(visual.page, "Second");
        assert_eq!(visual.fields.columns, vec![ColumnField::new("Sales", "Amount")]);
        assert!(loaded.diagnostics.is_empty());
    }

    #[test]
    fn malformed_visuals_are_skipped() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "pages/p/visuals/bad/visual.json", "{ not json");
        write(dir.path(), "pages/p/visuals/good/visual.json", r#"{ "visual": { "visualType": "card" } }"#);

        let loaded = ReportFolderSource::new(dir.path()).read().unwrap();
        assert_eq!(loaded.report.visual_count(), 1);
        assert_eq!(loaded.report.pages[0].visuals[0].id, "good");

        assert_eq!(loaded.diagnostics.len(), 1);
        let location = loaded.diagnostics[0].location.as_ref().unwrap();
        assert_eq!(location.file, "pages/p/visuals/bad/visual.json");
    }

    #[test]
    fn folder_without_pages_is_empty() {
        let dir = TempDir::new().unwrap();
        let loaded = ReportFolderSource::new(dir.path()).read().unwrap();
        assert_eq!(loaded.report.visual_count(), 0);

        let missing = ReportFolderSource::new(dir.path().join("nope")).read();
        assert!(matches!(missing, Err(SourceError::NotFound(_))));
    }
}
