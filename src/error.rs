//! Structured error handling and exit codes.

use serde::Serialize;

/// Exit codes for the dupfind application.
///
/// - 0: Success (completed normally, duplicates found)
/// - 1: General error (unexpected failure)
/// - 2: No duplicates found (completed normally, no duplicates)
/// - 3: Partial success (some files could not be indexed, hashed or moved)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: Scan completed and duplicates were found.
    Success = 0,
    /// General error: An unexpected error occurred.
    GeneralError = 1,
    /// No duplicates: Scan completed but no duplicates were found.
    NoDuplicates = 2,
    /// Partial success: Completed but some files were skipped.
    PartialSuccess = 3,
    /// Interrupted: Run was interrupted by user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DF000",
            Self::GeneralError => "DF001",
            Self::NoDuplicates => "DF002",
            Self::PartialSuccess => "DF003",
            Self::Interrupted => "DF130",
        }
    }

    /// Pick the exit code of a completed run.
    #[must_use]
    pub fn for_outcome(found: bool, had_errors: bool, interrupted: bool) -> Self {
        if interrupted {
            Self::Interrupted
        } else if had_errors {
            Self::PartialSuccess
        } else if found {
            Self::Success
        } else {
            Self::NoDuplicates
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "DF001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{:#}", err),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::NoDuplicates.as_i32(), 2);
        assert_eq!(ExitCode::Interrupted.as_i32(), 130);
        assert_eq!(ExitCode::PartialSuccess.code_prefix(), "DF003");
    }

    #[test]
    fn test_for_outcome_priority() {
        assert_eq!(ExitCode::for_outcome(true, true, true), ExitCode::Interrupted);
        assert_eq!(ExitCode::for_outcome(true, true, false), ExitCode::PartialSuccess);
        assert_eq!(ExitCode::for_outcome(true, false, false), ExitCode::Success);
        assert_eq!(ExitCode::for_outcome(false, false, false), ExitCode::NoDuplicates);
    }

    #[test]
    fn test_structured_error_includes_context() {
        let err = anyhow::anyhow!("root missing").context("cannot index /data");
        let structured = StructuredError::new(&err, ExitCode::GeneralError);
        assert_eq!(structured.code, "DF001");
        assert_eq!(structured.message, "cannot index /data: root missing");
        assert!(!structured.interrupted);
    }
}
