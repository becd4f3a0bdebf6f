//! Typed representation of `engine.json`.

use serde::{Deserialize, Serialize};

use crate::validate::{ValidationError, ValidationResult};

/// Root engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub schema_version: String,
    pub data: DataConfig,
    pub inference: InferenceConfig,
    pub learning: LearningConfig,
}

/// How the tabular source is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Field separator.
    pub delimiter: char,

    /// Maximum number of data rows loaded up front; `None` loads everything.
    pub row_limit: Option<usize>,
}

/// Message passing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Replace an all-zero conditional count with uniform pseudo-counts.
    pub uniform_fallback: bool,
}

/// K2 structure learning settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Upper bound on the parents of any variable (unbounded when `None`).
    pub max_parents: Option<usize>,

    /// Variable ordering; the data header order is used when `None`.
    pub ordering: Option<Vec<String>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            data: DataConfig::default(),
            inference: InferenceConfig::default(),
            learning: LearningConfig::default(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            row_limit: None,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            uniform_fallback: true,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> ValidationResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> ValidationResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))
    }
}
