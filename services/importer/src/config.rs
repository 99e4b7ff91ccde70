//! Project type configuration.
//!
//! The catalog is loaded once at startup (embedded JSON, or a file named by
//! `PROJECT_TYPES_PATH`) and shared read-only through an `Arc` with every
//! component that needs field definitions.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Configuration shipped with the binary.
const EMBEDDED_PROJECT_TYPES: &str = include_str!("../config/project_types.json");

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read project type config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid project type config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("project type '{project_type}' declares field '{field}' twice")]
    DuplicateField { project_type: String, field: String },

    #[error("project type '{0}' is declared twice")]
    DuplicateType(String),
}

/// Input widget type of a field, which also selects its validation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Select,
    Date,
    Checkbox,
    Multiselect,
    Textarea,
}

/// A compiled field pattern. Deserialized from the bare regex source.
#[derive(Debug, Clone)]
pub struct FieldPattern(Regex);

impl FieldPattern {
    pub fn is_match(&self, value: &str) -> bool {
        self.0.is_match(value)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for FieldPattern {
    type Error = regex::Error;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        Regex::new(&source).map(FieldPattern)
    }
}

impl Serialize for FieldPattern {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldPattern {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        FieldPattern::try_from(source).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<FieldPattern>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetric {
    pub key: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectTypeDefinition {
    pub name: String,
    pub description: String,
    pub icon: String,
    pub color: String,
    /// Rows are activities rather than sites.
    #[serde(default)]
    pub activity_based: bool,
    /// Sites also carry a daily metrics time series.
    #[serde(default)]
    pub daily_metrics: bool,
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub report_metrics: Vec<ReportMetric>,
}

impl ProjectTypeDefinition {
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSettings {
    pub max_file_size: usize,
    pub allowed_extensions: Vec<String>,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            allowed_extensions: vec!["csv".to_string(), "xlsx".to_string()],
        }
    }
}

/// Public listing entry for a project type.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectTypeSummary {
    pub name: String,
    pub description: String,
    pub icon: String,
    pub color: String,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    project_types: Vec<ProjectTypeDefinition>,
    #[serde(default)]
    common_fields: Vec<String>,
    #[serde(default)]
    import_settings: ImportSettings,
}

/// Immutable set of project type definitions, in configuration order.
#[derive(Debug)]
pub struct ProjectTypeCatalog {
    types: Vec<ProjectTypeDefinition>,
    common_fields: Vec<String>,
    settings: ImportSettings,
}

pub type SharedCatalog = Arc<ProjectTypeCatalog>;

impl ProjectTypeCatalog {
    /// Catalog compiled into the binary.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_json(EMBEDDED_PROJECT_TYPES)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let file: CatalogFile = serde_json::from_str(json)?;

        let mut seen_types = std::collections::HashSet::new();
        for def in &file.project_types {
            if !seen_types.insert(def.name.as_str()) {
                return Err(ConfigError::DuplicateType(def.name.clone()));
            }
            let mut seen_fields = std::collections::HashSet::new();
            for field in &def.fields {
                if !seen_fields.insert(field.name.as_str()) {
                    return Err(ConfigError::DuplicateField {
                        project_type: def.name.clone(),
                        field: field.name.clone(),
                    });
                }
            }
        }

        Ok(Self {
            types: file.project_types,
            common_fields: file.common_fields,
            settings: file.import_settings,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Load from `PROJECT_TYPES_PATH` when set, otherwise the embedded config.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var("PROJECT_TYPES_PATH") {
            Ok(path) if !path.trim().is_empty() => {
                tracing::info!(path = %path, "Loading project types from file");
                Self::from_path(Path::new(path.trim()))
            }
            _ => Self::builtin(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ProjectTypeDefinition> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn types(&self) -> &[ProjectTypeDefinition] {
        &self.types
    }

    pub fn common_fields(&self) -> &[String] {
        &self.common_fields
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    pub fn summaries(&self) -> Vec<ProjectTypeSummary> {
        self.types
            .iter()
            .map(|t| ProjectTypeSummary {
                name: t.name.clone(),
                description: t.description.clone(),
                icon: t.icon.clone(),
                color: t.color.clone(),
            })
            .collect()
    }
}
