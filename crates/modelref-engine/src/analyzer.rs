//! Analyzer facade
//!
//! Loads a catalog (and optionally a report) once, builds the reference
//! index and dependency graph, and answers queries with success-flagged
//! responses. Queries take `&self` and may run concurrently; `reload`
//! rebuilds everything and resets the tree cache.

use modelref_catalog::{
    CatalogSource, ReportFolderSource, ReportSource, SourceError, TmdlFolderSource,
};
use modelref_core::{
    Config, Diagnostic, ErrorClass, ModelCatalog, ObjectRef, QueryResponse, Severity,
};
use modelref_dax::{resolve, ReferenceIndex, ResolvedReferences};
use modelref_graph::{
    catalog_fingerprint, visual_field_usage, AnalysisCache, ColumnUsage, DependencyGraph,
    DependencyNode, ImpactReport, UnusedObjects, UsageRules,
};
use modelref_report::Report;
use std::path::PathBuf;
use tracing::{debug, info};

/// Everything derived from one load
#[derive(Debug)]
struct AnalysisState {
    catalog: ModelCatalog,
    index: ReferenceIndex,
    graph: DependencyGraph,
    report: Option<Report>,
    diagnostics: Vec<Diagnostic>,
}

/// Query facade over a loaded model
pub struct Analyzer {
    config: Config,
    source: Box<dyn CatalogSource>,
    report_source: Option<Box<dyn ReportSource>>,
    state: AnalysisState,
    cache: AnalysisCache,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("source", &self.source.name())
            .field("report_source", &self.report_source.as_ref().map(|s| s.name()))
            .field("state", &self.state)
            .finish()
    }
}

impl Analyzer {
    /// Load a catalog from `source`
    pub async fn from_source<S>(source: S, config: Config) -> Result<Self, SourceError>
    where
        S: CatalogSource + 'static,
    {
        Self::from_sources(Box::new(source), None, config).await
    }

    /// Load a catalog and a report
    pub async fn from_sources(
        source: Box<dyn CatalogSource>,
        report_source: Option<Box<dyn ReportSource>>,
        config: Config,
    ) -> Result<Self, SourceError> {
        let state = load_state(source.as_ref(), report_source.as_deref(), &config).await?;
        let cache = AnalysisCache::new();
        cache.ensure_fingerprint(&catalog_fingerprint(&state.catalog));

        Ok(Self {
            config,
            source,
            report_source,
            state,
            cache,
        })
    }

    /// Open a model-definition folder, and a report folder when given
    ///
    /// Relative paths resolve against `config.project_root`.
    pub async fn open(
        model_dir: impl Into<PathBuf>,
        report_dir: Option<PathBuf>,
        config: Config,
    ) -> Result<Self, SourceError> {
        let model_dir = config.project_root.join(model_dir.into());
        let source = TmdlFolderSource::from_config(model_dir, &config);
        let report_source = report_dir
            .map(|dir| Box::new(ReportFolderSource::new(config.project_root.join(dir))) as Box<dyn ReportSource>);

        Self::from_sources(Box::new(source), report_source, config).await
    }

    /// Reload from the same sources, rebuilding index and graph
    ///
    /// On error the previous state is kept.
    pub async fn reload(&mut self) -> Result<(), SourceError> {
        let state = load_state(self.source.as_ref(), self.report_source.as_deref(), &self.config).await?;
        self.cache.invalidate();
        self.cache.ensure_fingerprint(&catalog_fingerprint(&state.catalog));
        self.state = state;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.state.graph
    }

    pub fn report(&self) -> Option<&Report> {
        self.state.report.as_ref()
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    /// The loaded catalog
    pub fn catalog(&self) -> QueryResponse<ModelCatalog> {
        QueryResponse::ok(self.state.catalog.clone())
    }

    /// References made by a calculation-language expression
    pub fn resolve(&self, expression: &str) -> QueryResponse<ResolvedReferences> {
        QueryResponse::ok(resolve(expression, &self.state.index))
    }

    /// References made by a measure or calculated column
    pub fn resolve_object(&self, table: &str, name: &str) -> QueryResponse<ResolvedReferences> {
        if let Some(measure) = self.state.catalog.find_measure(table, name) {
            return self.resolve(&measure.expression);
        }
        match self.state.catalog.find_column(table, name) {
            Some(column) => self.resolve(column.expression.as_deref().unwrap_or_default()),
            None => not_found(format!("No measure or column {}", ObjectRef::new(table, name))),
        }
    }

    /// Dependency tree of a measure
    ///
    /// `max_depth` falls back to the configured default.
    pub fn dependency_tree(
        &self,
        table: &str,
        measure: &str,
        max_depth: Option<usize>,
    ) -> QueryResponse<DependencyNode> {
        if table.trim().is_empty() || measure.trim().is_empty() {
            return QueryResponse::failure(ErrorClass::InvalidInput, "Table and measure names are required");
        }

        let Some(found) = self.state.catalog.find_measure(table, measure) else {
            return not_found(format!("No measure {}", ObjectRef::new(table, measure)));
        };

        let depth = max_depth.unwrap_or(self.config.max_depth);
        let key = found.key();
        let tree = self.cache.get_or_insert_with(&key, depth, || {
            self.state.graph.dependency_tree(&found.table, &found.name, depth)
        });

        match tree {
            Some(tree) => QueryResponse::ok(tree.as_ref().clone()),
            None => not_found(format!("No measure {key}")),
        }
    }

    /// What depends on a `Table[Name]` key
    pub fn impact(&self, key: &str) -> QueryResponse<ImpactReport> {
        if ObjectRef::parse_key(key).is_none() {
            return QueryResponse::failure(
                ErrorClass::InvalidInput,
                format!("Expected a key like Table[Name], got {key:?}"),
            );
        }
        if !self.state.graph.contains(key) {
            return not_found(format!("No measure or column {key}"));
        }
        QueryResponse::ok(self.state.graph.impact(key))
    }

    /// Where a column is referenced
    pub fn column_usage(&self, table: &str, column: &str) -> QueryResponse<ColumnUsage> {
        if self.state.catalog.find_column(table, column).is_none() {
            return not_found(format!("No column {}", ObjectRef::new(table, column)));
        }
        QueryResponse::ok(self.state.graph.column_usage(table, column))
    }

    /// Measures, columns and tables nothing refers to
    pub fn unused_objects(&self) -> QueryResponse<UnusedObjects> {
        QueryResponse::ok(self.state.graph.unused_objects())
    }

    /// Load, resolution and graph diagnostics
    pub fn diagnostics(&self) -> QueryResponse<Vec<Diagnostic>> {
        QueryResponse::ok(self.state.diagnostics.clone())
    }
}

fn not_found<T>(message: String) -> QueryResponse<T> {
    debug!(%message, "object not found");
    QueryResponse::failure(ErrorClass::NotFound, message)
}

async fn load_state(
    source: &dyn CatalogSource,
    report_source: Option<&dyn ReportSource>,
    config: &Config,
) -> Result<AnalysisState, SourceError> {
    let loaded = source.load().await?;
    let mut diagnostics = loaded.diagnostics;
    let catalog = loaded.catalog;

    let report = match report_source {
        Some(report_source) => {
            let loaded = report_source.load_report().await?;
            diagnostics.extend(loaded.diagnostics);
            Some(loaded.report)
        }
        None => None,
    };

    let index = ReferenceIndex::from_catalog(&catalog);
    let mut graph = DependencyGraph::build(&catalog, &index).with_rules(UsageRules::from_config(config));
    if let Some(report) = &report {
        graph = graph.with_visual_usage(visual_field_usage(report.visuals()));
    }

    let owners = catalog
        .measures()
        .map(|m| m.key())
        .chain(catalog.calculated_columns().map(|c| c.key()));
    for key in owners {
        if let Some(refs) = graph.references(&key) {
            diagnostics.extend(refs.diagnostics(&key, &index));
        }
    }
    diagnostics.extend(graph.diagnostics());

    info!(
        source = source.name(),
        tables = catalog.tables.len(),
        visuals = report.as_ref().map_or(0, Report::visual_count),
        warnings = diagnostics.iter().filter(|d| d.severity >= Severity::Warn).count(),
        "analyzer ready"
    );

    Ok(AnalysisState {
        catalog,
        index,
        graph,
        report,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelref_catalog::{ColumnRow, MeasureRow, MetadataRows, MetadataRowsSource};

    fn rows_source() -> MetadataRowsSource {
        MetadataRowsSource::new(MetadataRows {
            columns: vec![ColumnRow {
                table: "T".into(),
                name: "X".into(),
                ..ColumnRow::default()
            }],
            measures: vec![
                MeasureRow {
                    table: "T".into(),
                    name: "A".into(),
                    expression: "SUM(T[X]) + [B]".into(),
                    ..MeasureRow::default()
                },
                MeasureRow {
                    table: "T".into(),
                    name: "B".into(),
                    expression: "[Ghost]".into(),
                    ..MeasureRow::default()
                },
            ],
            ..MetadataRows::default()
        })
    }

    #[tokio::test]
    async fn queries_report_not_found_and_invalid_input() {
        let analyzer = Analyzer::from_source(rows_source(), Config::default()).await.unwrap();

        let missing = analyzer.dependency_tree("T", "Nope", None);
        assert!(!missing.success);
        assert_eq!(missing.error_type, Some(ErrorClass::NotFound));

        let blank = analyzer.dependency_tree(" ", "A", None);
        assert_eq!(blank.error_type, Some(ErrorClass::InvalidInput));

        assert_eq!(analyzer.impact("not a key").error_type, Some(ErrorClass::InvalidInput));
        assert_eq!(analyzer.impact("T[Nope]").error_type, Some(ErrorClass::NotFound));
        assert_eq!(analyzer.column_usage("T", "Nope").error_type, Some(ErrorClass::NotFound));
    }

    #[tokio::test]
    async fn trees_are_served_from_cache() {
        let analyzer = Analyzer::from_source(rows_source(), Config::default()).await.unwrap();

        let first = analyzer.dependency_tree("t", "a", Some(2)).into_result().unwrap();
        let second = analyzer.dependency_tree("T", "A", Some(2)).into_result().unwrap();
        assert_eq!(first, second);
        assert_eq!(analyzer.cache().stats().hits, 1);
        assert_eq!(analyzer.cache().len(), 1);
    }

    #[tokio::test]
    async fn unresolved_names_surface_as_diagnostics() {
        let analyzer = Analyzer::from_source(rows_source(), Config::default()).await.unwrap();
        let diagnostics = analyzer.diagnostics().into_result().unwrap();

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].object.as_deref(), Some("T[B]"));
    }

    #[tokio::test]
    async fn reload_resets_cache() {
        let mut analyzer = Analyzer::from_source(rows_source(), Config::default()).await.unwrap();
        analyzer.dependency_tree("T", "A", None);
        assert_eq!(analyzer.cache().len(), 1);

        analyzer.reload().await.unwrap();
        assert!(analyzer.cache().is_empty());
        assert!(analyzer.cache().fingerprint().is_some());
    }
}
