//! Configuration validation errors and semantic validation.

use std::collections::HashSet;

use thiserror::Error;

use crate::engine::EngineConfig;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 51,
            ValidationError::ParseError(_) => 52,
            ValidationError::SemanticError(_) => 53,
            ValidationError::InvalidValue { .. } => 54,
            ValidationError::VersionMismatch { .. } => 55,
        }
    }
}

impl From<ValidationError> for bn_common::Error {
    fn from(err: ValidationError) -> Self {
        bn_common::Error::Config(err.to_string())
    }
}

/// Validate an engine configuration semantically.
pub fn validate_engine(config: &EngineConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    let delimiter = config.data.delimiter;
    if delimiter == '\n' || delimiter == '\r' {
        return Err(ValidationError::InvalidValue {
            field: "data.delimiter".to_string(),
            message: "Must not be a line terminator".to_string(),
        });
    }
    if !delimiter.is_ascii() || delimiter == '"' {
        return Err(ValidationError::InvalidValue {
            field: "data.delimiter".to_string(),
            message: "Must be a single ASCII character other than a quote".to_string(),
        });
    }

    if config.data.row_limit == Some(0) {
        return Err(ValidationError::InvalidValue {
            field: "data.row_limit".to_string(),
            message: "Must be positive when set".to_string(),
        });
    }

    if config.learning.max_parents == Some(0) {
        return Err(ValidationError::InvalidValue {
            field: "learning.max_parents".to_string(),
            message: "Must be at least 1 when set".to_string(),
        });
    }

    if let Some(ordering) = &config.learning.ordering {
        let mut seen = HashSet::new();
        for name in ordering {
            if name.is_empty() {
                return Err(ValidationError::InvalidValue {
                    field: "learning.ordering".to_string(),
                    message: "Variable names must be non-empty".to_string(),
                });
            }
            if !seen.insert(name.as_str()) {
                return Err(ValidationError::SemanticError(format!(
                    "learning.ordering lists '{}' more than once",
                    name
                )));
            }
        }
    }

    Ok(())
}
