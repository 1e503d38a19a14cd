//! Diagnostic codes and anomaly reporting
//!
//! IMPORTANT: Diagnostic codes are versioned and stable.
//! NEVER rename or remove codes - they are part of the public API.
//! Add new codes with new names only.
//!
//! Diagnostics are informational. Parsing, resolution and graph queries never
//! fail for data-shape reasons; they record what they skipped or approximated here.

use serde::{Deserialize, Serialize};

/// Diagnostic code registry (v1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    // Model definition parsing (1xxx)
    /// A line matched no declaration, property or flag shape and was skipped
    TmdlUnrecognizedLine,

    /// A declaration keyword appeared without a name
    TmdlMissingName,

    // Expression resolution (2xxx)
    /// An unqualified name is owned by more than one table
    DaxAmbiguousReference,

    /// An unqualified name matched nothing and was assumed to be a measure
    DaxUnresolvedReference,

    // Dependency graph (3xxx)
    /// A measure participates in a dependency cycle
    GraphCircularReference,

    // Sources (4xxx)
    /// A file in a folder scan could not be read and was skipped
    SourceFileSkipped,

    // General (9xxx)
    /// General informational message
    Info,

    /// General warning message
    Warning,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TmdlUnrecognizedLine => "TMDL_UNRECOGNIZED_LINE",
            Self::TmdlMissingName => "TMDL_MISSING_NAME",
            Self::DaxAmbiguousReference => "DAX_AMBIGUOUS_REFERENCE",
            Self::DaxUnresolvedReference => "DAX_UNRESOLVED_REFERENCE",
            Self::GraphCircularReference => "GRAPH_CIRCULAR_REFERENCE",
            Self::SourceFileSkipped => "SOURCE_FILE_SKIPPED",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - results may be approximate
    Warn,

    /// Error - part of the input could not be used at all
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Source location in a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// File path (or `<input>` for in-memory text)
    pub file: String,

    /// Optional line number (1-indexed)
    pub line: Option<usize>,
}

impl Location {
    /// Create a new location with just a file path
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
        }
    }

    /// Create a location with file and line number
    pub fn with_line(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line: Some(line),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.file, line),
            None => write!(f, "{}", self.file),
        }
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Source location (best-effort)
    pub location: Option<Location>,

    /// Object key the diagnostic is about (`Table[Name]`)
    pub object: Option<String>,

    /// Related object keys (candidate owners, cycle members, ...)
    pub related: Vec<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            location: None,
            object: None,
            related: Vec::new(),
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the object the diagnostic is about
    pub fn with_object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    /// Set related objects
    pub fn with_related(mut self, related: Vec<String>) -> Self {
        self.related = related;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_code_stability() {
        // Ensure codes are stable strings
        assert_eq!(DiagnosticCode::TmdlUnrecognizedLine.as_str(), "TMDL_UNRECOGNIZED_LINE");
        assert_eq!(DiagnosticCode::DaxUnresolvedReference.as_str(), "DAX_UNRESOLVED_REFERENCE");
    }

    #[test]
    fn diagnostic_serialization() {
        let diag = Diagnostic::new(
            DiagnosticCode::DaxAmbiguousReference,
            Severity::Warn,
            "[Rev] is owned by 2 tables",
        )
        .with_location(Location::with_line("tables/Sales.tmdl", 12))
        .with_object("Sales[Margin]")
        .with_related(vec!["X[Rev]".to_string(), "Y[Rev]".to_string()]);

        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("DAX_AMBIGUOUS_REFERENCE"));
        assert!(json.contains("warn"));
        assert!(json.contains("Sales[Margin]"));
    }

    #[test]
    fn location_display() {
        assert_eq!(Location::with_line("a.tmdl", 3).to_string(), "a.tmdl:3");
        assert_eq!(Location::new("a.tmdl").to_string(), "a.tmdl");
    }
}
