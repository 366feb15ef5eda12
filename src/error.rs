//! Exit codes and structured error output.

use serde::Serialize;

use crate::duplicates::{CleanSummary, FinderError, RunSummary};

/// Process exit codes.
///
/// - 0: Success (links were made, or would be in a dry run)
/// - 1: General error (the run could not start or failed fatally)
/// - 2: No duplicates (nothing left to link)
/// - 3: Partial success (some files or pairs failed and were skipped)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: duplicates were linked.
    Success = 0,
    /// General error: An unexpected error occurred.
    GeneralError = 1,
    /// No duplicates: the run completed without anything to link.
    NoDuplicates = 2,
    /// Partial success: the run completed but some files or pairs failed.
    PartialSuccess = 3,
    /// Interrupted: the run was interrupted by user (Ctrl+C).
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
            Self::Success => "DL000",
            Self::GeneralError => "DL001",
            Self::NoDuplicates => "DL002",
            Self::PartialSuccess => "DL003",
            Self::Interrupted => "DL130",
        }
    }

    /// Exit code for a completed `link` run.
    ///
    /// Interruption beats errors, errors beat "nothing found".
    #[must_use]
    pub fn from_run(summary: &RunSummary) -> Self {
        if summary.interrupted {
            Self::Interrupted
        } else if summary.has_errors() {
            Self::PartialSuccess
        } else if summary.found_duplicates() {
            Self::Success
        } else {
            Self::NoDuplicates
        }
    }

    /// Exit code for a completed `clean` run.
    #[must_use]
    pub fn from_clean(summary: &CleanSummary) -> Self {
        if summary.interrupted {
            Self::Interrupted
        } else if summary.scan_errors > 0 || summary.orphans.failed > 0 {
            Self::PartialSuccess
        } else {
            Self::Success
        }
    }

    /// Exit code for a fatal error.
    #[must_use]
    pub fn from_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<FinderError>() {
            Some(FinderError::Interrupted) => Self::Interrupted,
            _ => Self::GeneralError,
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "DL001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Underlying causes, outermost first
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
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
            message: err.to_string(),
            causes: err.chain().skip(1).map(ToString::to_string).collect(),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
