//! Error types for the bayesnet engine.
//!
//! Every failure carries:
//! - A stable error code for machine parsing
//! - A category for grouping
//! - A recoverability hint and a suggested action for automation
//! - A remediation sentence for humans
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Unknown Variable
//!   Reason: unknown variable 'Rain'
//!   Fix: Check the column headers of the data file; names are case-sensitive.
//! ```
//!
//! # Agent-Facing Output
//!
//! ```json
//! {
//!   "code": 11,
//!   "category": "data",
//!   "message": "state '3' never observed for variable 'A'",
//!   "recoverable": true,
//!   "suggested_action": "check_data",
//!   "context": { "variable": "A", "state": "3" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for bayesnet operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Tabular data loading and lookup errors.
    Data,
    /// Network structure (adjacency table) errors.
    Model,
    /// Message passing and query errors.
    Inference,
    /// Structure learning errors.
    Learning,
    /// Engine configuration errors.
    Config,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Data => write!(f, "data"),
            ErrorCategory::Model => write!(f, "model"),
            ErrorCategory::Inference => write!(f, "inference"),
            ErrorCategory::Learning => write!(f, "learning"),
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Suggested actions for agents to take in response to errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Inspect the data file (headers, values, row shape).
    CheckData,
    /// Fix or regenerate the adjacency table.
    FixStructure,
    /// Re-run initialization of the network and then the query.
    Reinitialize,
    /// Rewrite the query expression.
    FixQuery,
    /// Reset configuration to defaults.
    ResetConfig,
    /// Retry the operation.
    Retry,
    /// Manual intervention required.
    ManualIntervention,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::CheckData => write!(f, "check_data"),
            SuggestedAction::FixStructure => write!(f, "fix_structure"),
            SuggestedAction::Reinitialize => write!(f, "reinitialize"),
            SuggestedAction::FixQuery => write!(f, "fix_query"),
            SuggestedAction::ResetConfig => write!(f, "reset_config"),
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::ManualIntervention => write!(f, "manual_intervention"),
        }
    }
}

/// Unified error type for the bayesnet engine.
#[derive(Error, Debug)]
pub enum Error {
    // Data errors (10-19)
    #[error("unknown variable '{name}'")]
    UnknownVariable { name: String },

    #[error("state '{state}' never observed for variable '{variable}'")]
    UnknownState { variable: String, state: String },

    #[error("data source unavailable: {origin}: {reason}")]
    SourceUnavailable { origin: String, reason: String },

    #[error("malformed data at line {line}: expected {expected} fields, found {found}")]
    MalformedSource {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("data stream exhausted after {rows} rows")]
    SourceExhausted { rows: usize },

    // Model errors (20-29)
    #[error("malformed network structure: {0}")]
    MalformedStructure(String),

    // Inference errors (30-39)
    #[error("node '{node}' has no message from '{peer}' for state '{state}'")]
    MissingMessage {
        node: String,
        peer: String,
        state: String,
    },

    #[error("node '{node}' has no evidence entry for state '{state}'")]
    MissingEvidence { node: String, state: String },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    // Learning errors (40-49)
    #[error("cannot learn structure from an empty data source")]
    EmptySource,

    // Configuration errors (50-59)
    #[error("configuration error: {0}")]
    Config(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for [`Error::UnknownVariable`].
    pub fn unknown_variable(name: impl Into<String>) -> Self {
        Error::UnknownVariable { name: name.into() }
    }

    /// Shorthand for [`Error::UnknownState`].
    pub fn unknown_state(variable: impl Into<String>, state: impl Into<String>) -> Self {
        Error::UnknownState {
            variable: variable.into(),
            state: state.into(),
        }
    }

    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Data errors
    /// - 20-29: Model errors
    /// - 30-39: Inference errors
    /// - 40-49: Learning errors
    /// - 50-59: Configuration errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::UnknownVariable { .. } => 10,
            Error::UnknownState { .. } => 11,
            Error::SourceUnavailable { .. } => 12,
            Error::MalformedSource { .. } => 13,
            Error::SourceExhausted { .. } => 14,
            Error::MalformedStructure(_) => 20,
            Error::MissingMessage { .. } => 30,
            Error::MissingEvidence { .. } => 31,
            Error::InvalidQuery(_) => 32,
            Error::EmptySource => 40,
            Error::Config(_) => 50,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnknownVariable { .. }
            | Error::UnknownState { .. }
            | Error::SourceUnavailable { .. }
            | Error::MalformedSource { .. }
            | Error::SourceExhausted { .. } => ErrorCategory::Data,

            Error::MalformedStructure(_) => ErrorCategory::Model,

            Error::MissingMessage { .. } | Error::MissingEvidence { .. } | Error::InvalidQuery(_) => {
                ErrorCategory::Inference
            }

            Error::EmptySource => ErrorCategory::Learning,

            Error::Config(_) => ErrorCategory::Config,

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable by the caller.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::UnknownVariable { .. } => true,
            Error::UnknownState { .. } => true,
            Error::SourceUnavailable { .. } => true,
            Error::MalformedSource { .. } => false, // File must be fixed
            Error::SourceExhausted { .. } => true, // reload() rewinds

            Error::MalformedStructure(_) => false,

            // Network state is stale, not lost
            Error::MissingMessage { .. } => true,
            Error::MissingEvidence { .. } => true,
            Error::InvalidQuery(_) => true,

            Error::EmptySource => false,

            Error::Config(_) => true,

            Error::Io(_) => true,
            Error::Json(_) => false,
        }
    }

    /// Returns the suggested action for agents.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::UnknownVariable { .. }
            | Error::UnknownState { .. }
            | Error::MalformedSource { .. }
            | Error::EmptySource => SuggestedAction::CheckData,
            Error::SourceUnavailable { .. } => SuggestedAction::Retry,
            Error::SourceExhausted { .. } => SuggestedAction::Reinitialize,

            Error::MalformedStructure(_) => SuggestedAction::FixStructure,

            Error::MissingMessage { .. } | Error::MissingEvidence { .. } => {
                SuggestedAction::Reinitialize
            }
            Error::InvalidQuery(_) => SuggestedAction::FixQuery,

            Error::Config(_) => SuggestedAction::ResetConfig,

            Error::Io(_) => SuggestedAction::Retry,
            Error::Json(_) => SuggestedAction::ManualIntervention,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::UnknownVariable { .. } => {
                "Check the column headers of the data file; names are case-sensitive."
            }
            Error::UnknownState { .. } => {
                "Use a value that appears in the data column, or load more rows with '--rows'."
            }
            Error::SourceUnavailable { .. } => {
                "Check that the data file exists and is readable."
            }
            Error::MalformedSource { .. } => {
                "Every row must have as many fields as the header. Check for stray delimiters."
            }
            Error::SourceExhausted { .. } => {
                "All rows have been read. Call reload() to start again from the first row."
            }

            Error::MalformedStructure(_) => {
                "The adjacency table must list the data columns in order, with 0/1 cells and no cycles. Regenerate it with 'bn learn'."
            }

            Error::MissingMessage { .. } | Error::MissingEvidence { .. } => {
                "The network was not initialized for this query. Re-run initialization, then the query."
            }
            Error::InvalidQuery(_) => {
                "Write queries as 'P(C|A=1,B=0)', 'C|A=1' or 'C'."
            }

            Error::EmptySource => {
                "The data file has a header but no rows. Supply observations before learning."
            }

            Error::Config(_) => {
                "Check engine.json against the documented schema, or remove it to use defaults."
            }

            Error::Io(_) => "Check paths and permissions, then retry the operation.",
            Error::Json(_) => {
                "Invalid JSON. Check syntax with 'jq . <file>' or restore from backup."
            }
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::UnknownVariable { .. } => "Unknown Variable",
            Error::UnknownState { .. } => "Unknown State",
            Error::SourceUnavailable { .. } => "Data Source Unavailable",
            Error::MalformedSource { .. } => "Malformed Data",
            Error::SourceExhausted { .. } => "Data Stream Exhausted",

            Error::MalformedStructure(_) => "Malformed Network Structure",

            Error::MissingMessage { .. } => "Missing Message",
            Error::MissingEvidence { .. } => "Missing Evidence",
            Error::InvalidQuery(_) => "Invalid Query",

            Error::EmptySource => "Empty Data Source",

            Error::Config(_) => "Configuration Error",

            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Suggested action for agents.
    pub suggested_action: SuggestedAction,

    /// Additional structured context (variable, state, line).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::UnknownVariable { name } => {
                context.insert("variable".to_string(), serde_json::json!(name));
            }
            Error::UnknownState { variable, state } => {
                context.insert("variable".to_string(), serde_json::json!(variable));
                context.insert("state".to_string(), serde_json::json!(state));
            }
            Error::MalformedSource {
                line,
                expected,
                found,
            } => {
                context.insert("line".to_string(), serde_json::json!(line));
                context.insert("expected_fields".to_string(), serde_json::json!(expected));
                context.insert("found_fields".to_string(), serde_json::json!(found));
            }
            Error::SourceExhausted { rows } => {
                context.insert("rows".to_string(), serde_json::json!(rows));
            }
            Error::MissingMessage { node, peer, state } => {
                context.insert("node".to_string(), serde_json::json!(node));
                context.insert("peer".to_string(), serde_json::json!(peer));
                context.insert("state".to_string(), serde_json::json!(state));
            }
            Error::MissingEvidence { node, state } => {
                context.insert("node".to_string(), serde_json::json!(node));
                context.insert("state".to_string(), serde_json::json!(state));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }

    /// Serialize to pretty JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.to_json())
    }
}

/// Format an error for human-readable stderr output.
///
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(Error::unknown_variable("A").code(), 10);
        assert_eq!(Error::unknown_state("A", "3").code(), 11);
        assert_eq!(Error::MalformedStructure("cycle".into()).code(), 20);
        assert_eq!(Error::EmptySource.code(), 40);
    }

    #[test]
    fn test_error_category() {
        assert_eq!(Error::unknown_variable("A").category(), ErrorCategory::Data);
        assert_eq!(
            Error::MissingEvidence {
                node: "B".into(),
                state: "0".into()
            }
            .category(),
            ErrorCategory::Inference
        );
        assert_eq!(Error::EmptySource.category(), ErrorCategory::Learning);
        assert_eq!(
            Error::MalformedStructure("x".into()).category(),
            ErrorCategory::Model
        );
    }

    #[test]
    fn test_error_recoverable() {
        assert!(Error::unknown_state("A", "9").is_recoverable());
        assert!(!Error::EmptySource.is_recoverable());
        assert!(!Error::MalformedSource {
            line: 3,
            expected: 2,
            found: 3
        }
        .is_recoverable());
    }

    #[test]
    fn test_suggested_action() {
        assert_eq!(
            Error::InvalidQuery("P(".into()).suggested_action(),
            SuggestedAction::FixQuery
        );
        assert_eq!(
            Error::SourceExhausted { rows: 4 }.suggested_action(),
            SuggestedAction::Reinitialize
        );
        assert_eq!(
            Error::MalformedStructure("x".into()).suggested_action(),
            SuggestedAction::FixStructure
        );
    }

    #[test]
    fn test_structured_error_from_error() {
        let err = Error::unknown_state("A", "a3");
        let structured = StructuredError::from(&err);

        assert_eq!(structured.code, 11);
        assert_eq!(structured.category, ErrorCategory::Data);
        assert!(structured.recoverable);
        assert_eq!(structured.suggested_action, SuggestedAction::CheckData);
        assert_eq!(structured.context.get("state"), Some(&serde_json::json!("a3")));
    }

    #[test]
    fn test_structured_error_json() {
        let err = Error::MissingMessage {
            node: "C".into(),
            peer: "B".into(),
            state: "1".into(),
        };
        let structured = StructuredError::from(&err).with_context("query", "C");
        let json = structured.to_json();

        assert!(json.contains(r#""code":30"#));
        assert!(json.contains(r#""category":"inference""#));
        assert!(json.contains(r#""suggested_action":"reinitialize""#));
        assert!(json.contains(r#""query":"C""#));
    }

    #[test]
    fn test_format_error_human() {
        let err = Error::unknown_variable("Rain");
        let formatted = format_error_human(&err, false);

        assert!(formatted.contains("Unknown Variable"));
        assert!(formatted.contains("unknown variable 'Rain'"));
        assert!(formatted.contains("case-sensitive"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert_eq!(err.code(), 60);
        assert_eq!(err.category(), ErrorCategory::Io);
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::Learning.to_string(), "learning");
        assert_eq!(SuggestedAction::FixQuery.to_string(), "fix_query");
    }
}
