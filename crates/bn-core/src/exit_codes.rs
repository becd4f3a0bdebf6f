//! Exit codes for the `bn` CLI.
//!
//! Exit code ranges:
//! - 0: Success
//! - 10-19: User/input errors (recoverable by fixing arguments or files)
//! - 20-29: Internal errors (bugs, should be reported)

use bn_common::{Error, ErrorCategory};

/// Exit codes for `bn` operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Command completed.
    Clean = 0,

    // ========================================================================
    // User / Input Errors (10-19)
    // ========================================================================
    /// Invalid arguments or configuration
    ArgsError = 10,

    /// Data file missing, malformed, or referencing unknown values
    DataError = 11,

    /// Adjacency table malformed, mislabelled or cyclic
    ModelError = 12,

    /// Query expression could not be parsed or answered
    QueryError = 13,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if this exit code indicates success.
    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    /// Check if this exit code is a user/input error (codes 10-19).
    pub fn is_user_error(self) -> bool {
        let code = self as i32;
        (10..20).contains(&code)
    }

    /// Check if this exit code is an internal error (codes 20-29).
    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Get the error code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::DataError => "ERR_DATA",
            ExitCode::ModelError => "ERR_MODEL",
            ExitCode::QueryError => "ERR_QUERY",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }

    /// Map an engine error to the exit code reported to the shell.
    pub fn for_error(err: &Error) -> Self {
        match err {
            Error::InvalidQuery(_) => ExitCode::QueryError,
            Error::MissingMessage { .. } | Error::MissingEvidence { .. } => {
                ExitCode::InternalError
            }
            Error::Json(_) => ExitCode::InternalError,
            _ => match err.category() {
                ErrorCategory::Data | ErrorCategory::Learning => ExitCode::DataError,
                ErrorCategory::Model => ExitCode::ModelError,
                ErrorCategory::Inference => ExitCode::QueryError,
                ErrorCategory::Config => ExitCode::ArgsError,
                ErrorCategory::Io => ExitCode::IoError,
            },
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_consistent() {
        assert!(ExitCode::Clean.is_success());
        assert!(ExitCode::DataError.is_user_error());
        assert!(ExitCode::QueryError.is_user_error());
        assert!(ExitCode::IoError.is_internal_error());
        assert!(!ExitCode::ArgsError.is_internal_error());
    }

    #[test]
    fn errors_map_to_exit_codes() {
        assert_eq!(
            ExitCode::for_error(&Error::unknown_variable("X")),
            ExitCode::DataError
        );
        assert_eq!(ExitCode::for_error(&Error::EmptySource), ExitCode::DataError);
        assert_eq!(
            ExitCode::for_error(&Error::MalformedStructure("cycle".into())),
            ExitCode::ModelError
        );
        assert_eq!(
            ExitCode::for_error(&Error::InvalidQuery("P(".into())),
            ExitCode::QueryError
        );
        assert_eq!(
            ExitCode::for_error(&Error::Config("bad".into())),
            ExitCode::ArgsError
        );
        assert_eq!(
            ExitCode::for_error(&Error::MissingEvidence {
                node: "A".into(),
                state: "0".into()
            }),
            ExitCode::InternalError
        );
    }

    #[test]
    fn display_includes_name_and_number() {
        assert_eq!(ExitCode::ModelError.to_string(), "ERR_MODEL (12)");
    }
}
