//! Configuration schema (modelref.toml)

use serde::{Deserialize, Serialize};

/// Output caps for the unused-object report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLimits {
    /// Maximum unused measures listed
    #[serde(default = "default_unused_measures")]
    pub unused_measures: usize,

    /// Maximum unused columns listed
    #[serde(default = "default_unused_columns")]
    pub unused_columns: usize,

    /// Maximum unused tables listed
    #[serde(default = "default_unused_tables")]
    pub unused_tables: usize,
}

fn default_unused_measures() -> usize {
    50
}

fn default_unused_columns() -> usize {
    50
}

fn default_unused_tables() -> usize {
    20
}

impl Default for OutputLimits {
    fn default() -> Self {
        Self {
            unused_measures: default_unused_measures(),
            unused_columns: default_unused_columns(),
            unused_tables: default_unused_tables(),
        }
    }
}

/// Which columns the unused-object analysis ignores
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRules {
    /// Skip hidden columns
    #[serde(default = "default_true")]
    pub exclude_hidden: bool,

    /// Skip key columns
    #[serde(default = "default_true")]
    pub exclude_key: bool,

    /// Skip columns whose name starts with one of these prefixes
    #[serde(default = "default_reserved_prefixes")]
    pub reserved_prefixes: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_reserved_prefixes() -> Vec<String> {
    vec!["RowNumber-".to_string()]
}

impl Default for ColumnRules {
    fn default() -> Self {
        Self {
            exclude_hidden: true,
            exclude_key: true,
            reserved_prefixes: default_reserved_prefixes(),
        }
    }
}

impl ColumnRules {
    /// Whether a column name carries a reserved system prefix
    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
    }
}

/// How report visuals contribute usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualRules {
    /// Count fields used only in visual filters as used
    #[serde(default = "default_true")]
    pub include_filters: bool,
}

impl Default for VisualRules {
    fn default() -> Self {
        Self {
            include_filters: true,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Default depth budget for dependency trees
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Worker bound for folder scans
    #[serde(default = "default_parse_workers")]
    pub parse_workers: usize,

    /// Unused-object output caps
    #[serde(default)]
    pub limits: OutputLimits,

    /// Column exclusion rules
    #[serde(default)]
    pub columns: ColumnRules,

    /// Visual usage rules
    #[serde(default)]
    pub visuals: VisualRules,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: std::path::PathBuf,
}

fn default_max_depth() -> usize {
    3
}

fn default_parse_workers() -> usize {
    4
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            parse_workers: default_parse_workers(),
            limits: OutputLimits::default(),
            columns: ColumnRules::default(),
            visuals: VisualRules::default(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        Ok(())
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
