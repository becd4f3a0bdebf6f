//! Common types shared across the bayesnet crates.
//!
//! - The unified error type with stable codes and remediation hints
//! - Output format selection for the CLI

pub mod error;
pub mod output;

pub use error::{format_error_human, Error, ErrorCategory, Result, StructuredError, SuggestedAction};
pub use output::OutputFormat;
