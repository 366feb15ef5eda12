//! JSON output formatter.
//!
//! # Output Schema
//!
//! For `link`:
//!
//! ```json
//! {
//!   "summary": {
//!     "root": "/srv/photos",
//!     "dry_run": false,
//!     "total_files": 1200,
//!     "scan_errors": 0,
//!     "orphans_found": 0,
//!     "orphans": { "removed": 0, "kept": 0, "failed": 0 },
//!     "buckets": 85,
//!     "buckets_skipped": 0,
//!     "candidate_pairs": 240,
//!     "stages": [ { "name": "properties", "input": 240, "output": 231 } ],
//!     "verified_pairs": 31,
//!     "links": { "linked": 31, "would_link": 0, "already_linked": 0,
//!                "skipped_temp": 0, "failed": 0, "bytes_reclaimed": 73400320 },
//!     "interrupted": false,
//!     "duration_ms": 5123
//!   },
//!   "exit_code": 0,
//!   "exit_code_name": "DL000"
//! }
//! ```
//!
//! `clean` produces the same envelope around a cleanup summary.

use std::io::Write;

use serde::Serialize;

use crate::error::ExitCode;

/// A summary together with the exit code it maps to.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput<'a, S: Serialize> {
    /// Run or cleanup summary
    pub summary: &'a S,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "DL000")
    pub exit_code_name: &'static str,
}

impl<'a, S: Serialize> JsonOutput<'a, S> {
    /// Wrap `summary` for output.
    ///
    /// # Example
    ///
    /// ```
    /// use dupelink::duplicates::RunSummary;
    /// use dupelink::error::ExitCode;
    /// use dupelink::output::JsonOutput;
    ///
    /// let summary = RunSummary::default();
    /// let output = JsonOutput::new(&summary, ExitCode::NoDuplicates);
    /// assert_eq!(output.exit_code, 2);
    /// ```
    #[must_use]
    pub fn new(summary: &'a S, exit_code: ExitCode) -> Self {
        Self {
            summary,
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix(),
        }
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
