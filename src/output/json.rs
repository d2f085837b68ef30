//! JSON output formatter for scan and compare results.
//!
//! Provides machine-readable JSON output for scripting and automation.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "duplicates": [
//!     {
//!       "hash": "abc123...",
//!       "size": 1024,
//!       "files": ["/path/to/file1.txt", "/path/to/file2.txt"]
//!     }
//!   ],
//!   "summary": {
//!     "root": "/path/to",
//!     "total_files": 100,
//!     "total_size": 1048576,
//!     "duplicate_groups": 5,
//!     "duplicate_files": 10,
//!     "reclaimable_space": 51200,
//!     "scan_duration_ms": 1234,
//!     "interrupted": false,
//!     "exit_code": 0,
//!     "exit_code_name": "DF000"
//!   },
//!   "relocation": null
//! }
//! ```
//!
//! # Example
//!
//! ```
//! use dupfind::error::ExitCode;
//! use dupfind::output::{JsonOutput, ScanSummary};
//!
//! let output = JsonOutput::new(&[], &ScanSummary::default(), ExitCode::NoDuplicates);
//! let json = output.to_json().unwrap();
//! assert!(json.contains("\"exit_code_name\":\"DF002\""));
//! ```

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use super::{CompareSummary, ScanSummary};
use crate::actions::RelocationReport;
use crate::duplicates::{CrossMatch, DuplicateGroup, FileIndex};
use crate::error::ExitCode;

/// A single duplicate group in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuplicateGroup {
    /// Digest as hexadecimal string
    pub hash: String,
    /// File size in bytes
    pub size: u64,
    /// Paths of all duplicate files
    pub files: Vec<String>,
}

impl JsonDuplicateGroup {
    /// Create a JSON duplicate group from a DuplicateGroup.
    #[must_use]
    pub fn from_duplicate_group(group: &DuplicateGroup) -> Self {
        Self {
            hash: group.hash.to_string(),
            size: group.size,
            files: group.files.iter().map(|f| path_string(&f.path)).collect(),
        }
    }
}

/// Summary statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Root that was scanned
    pub root: String,
    /// Total number of files scanned
    pub total_files: usize,
    /// Total size of all scanned files in bytes
    pub total_size: u64,
    /// Entries that could not be indexed
    pub scan_errors: usize,
    /// Number of confirmed duplicate groups
    pub duplicate_groups: usize,
    /// Total number of duplicate files (excluding originals)
    pub duplicate_files: usize,
    /// Total space that can be reclaimed by removing duplicates (bytes)
    pub reclaimable_space: u64,
    /// Files that could not be hashed
    pub failed_files: usize,
    /// Duration of the scan in milliseconds
    pub scan_duration_ms: u64,
    /// Whether the scan was interrupted
    pub interrupted: bool,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "DF000")
    pub exit_code_name: String,
}

impl JsonSummary {
    /// Create a JSON summary from a ScanSummary and an exit code.
    #[must_use]
    pub fn from_scan_summary(summary: &ScanSummary, exit_code: ExitCode) -> Self {
        Self {
            root: path_string(&summary.root),
            total_files: summary.total_files,
            total_size: summary.total_size,
            scan_errors: summary.scan_errors,
            duplicate_groups: summary.duplicate_groups,
            duplicate_files: summary.duplicate_files,
            reclaimable_space: summary.reclaimable_space,
            failed_files: summary.failed_files,
            scan_duration_ms: summary.scan_duration.as_millis() as u64,
            interrupted: summary.interrupted,
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

/// A moved file in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonMovedFile {
    /// Original path
    pub from: String,
    /// New path
    pub to: String,
    /// Size in bytes
    pub size: u64,
}

/// Relocation outcome in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRelocation {
    /// Destination directory
    pub destination: String,
    /// Moved files
    pub moved: Vec<JsonMovedFile>,
    /// Failure messages, one per file left in place
    pub failures: Vec<String>,
    /// Total bytes moved
    pub bytes_moved: u64,
    /// Why the run stopped early, if it did
    pub aborted: Option<String>,
    /// Whether the run stopped on Ctrl+C
    pub interrupted: bool,
}

impl JsonRelocation {
    /// Convert a relocation report.
    #[must_use]
    pub fn from_report(report: &RelocationReport) -> Self {
        Self {
            destination: path_string(&report.destination),
            moved: report
                .moved
                .iter()
                .map(|m| JsonMovedFile {
                    from: path_string(&m.from),
                    to: path_string(&m.to),
                    size: m.size,
                })
                .collect(),
            failures: report.failures.iter().map(ToString::to_string).collect(),
            bytes_moved: report.bytes_moved,
            aborted: report.aborted.as_ref().map(ToString::to_string),
            interrupted: report.interrupted,
        }
    }
}

/// Complete JSON output of a scan.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// List of duplicate groups
    pub duplicates: Vec<JsonDuplicateGroup>,
    /// Scan summary statistics
    pub summary: JsonSummary,
    /// Relocation outcome, when files were moved
    pub relocation: Option<JsonRelocation>,
}

impl JsonOutput {
    /// Create a new JSON output from duplicate groups, summary and exit code.
    #[must_use]
    pub fn new(groups: &[DuplicateGroup], summary: &ScanSummary, exit_code: ExitCode) -> Self {
        Self {
            duplicates: groups
                .iter()
                .map(JsonDuplicateGroup::from_duplicate_group)
                .collect(),
            summary: JsonSummary::from_scan_summary(summary, exit_code),
            relocation: None,
        }
    }

    /// Attach a relocation report.
    #[must_use]
    pub fn with_relocation(mut self, report: &RelocationReport) -> Self {
        self.relocation = Some(JsonRelocation::from_report(report));
        self
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

    /// Write JSON to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        write_json(self, writer, pretty)
    }
}

/// A cross-index pair in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonPairGroup {
    /// Shared digest
    pub hash: String,
    /// File size in bytes
    pub size: u64,
    /// Files under the first root
    pub ours: Vec<String>,
    /// Files under the second root
    pub theirs: Vec<String>,
}

/// Comparison summary in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonCompareSummary {
    /// First root
    pub ours: String,
    /// Second root
    pub theirs: String,
    /// Shared full digests
    pub pairs: usize,
    /// Files in the first root with a counterpart
    pub ours_files: usize,
    /// Bytes of those files
    pub ours_bytes: u64,
    /// Files in the second root with a counterpart
    pub theirs_files: usize,
    /// Bytes of those files
    pub theirs_bytes: u64,
    /// Files that could not be hashed
    pub failed_files: usize,
    /// Duration in milliseconds
    pub scan_duration_ms: u64,
    /// Whether the run was interrupted
    pub interrupted: bool,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name
    pub exit_code_name: String,
}

/// Complete JSON output of a comparison.
#[derive(Debug, Clone, Serialize)]
pub struct JsonCompareOutput {
    /// Shared groups, largest size first
    pub pairs: Vec<JsonPairGroup>,
    /// Comparison summary
    pub summary: JsonCompareSummary,
    /// Relocation outcome, when files were moved
    pub relocation: Option<JsonRelocation>,
}

impl JsonCompareOutput {
    /// Build from a match and the indices it was computed on.
    #[must_use]
    pub fn new(
        ours: &FileIndex,
        theirs: &FileIndex,
        matched: &CrossMatch,
        summary: &CompareSummary,
        exit_code: ExitCode,
    ) -> Self {
        let paths = |index: &FileIndex, positions: &[usize]| -> Vec<String> {
            positions
                .iter()
                .filter_map(|&pos| index.record(pos))
                .map(|r| path_string(r.path()))
                .collect()
        };

        let pairs = matched
            .groups()
            .iter()
            .rev()
            .flat_map(|(&size, by_digest)| {
                by_digest.iter().map(move |(digest, pair)| (size, digest, pair))
            })
            .map(|(size, digest, pair)| JsonPairGroup {
                hash: digest.to_string(),
                size,
                ours: paths(ours, &pair.ours),
                theirs: paths(theirs, &pair.theirs),
            })
            .collect();

        Self {
            pairs,
            summary: JsonCompareSummary {
                ours: path_string(&summary.ours),
                theirs: path_string(&summary.theirs),
                pairs: summary.pairs,
                ours_files: summary.ours_files,
                ours_bytes: summary.ours_bytes,
                theirs_files: summary.theirs_files,
                theirs_bytes: summary.theirs_bytes,
                failed_files: summary.failed_files,
                scan_duration_ms: summary.scan_duration.as_millis() as u64,
                interrupted: summary.interrupted,
                exit_code: exit_code.as_i32(),
                exit_code_name: exit_code.code_prefix().to_string(),
            },
            relocation: None,
        }
    }

    /// Replace the exit code, e.g. once a relocation has run.
    #[must_use]
    pub fn with_exit_code(mut self, exit_code: ExitCode) -> Self {
        self.summary.exit_code = exit_code.as_i32();
        self.summary.exit_code_name = exit_code.code_prefix().to_string();
        self.summary.interrupted = exit_code == ExitCode::Interrupted;
        self
    }

    /// Attach a relocation report.
    #[must_use]
    pub fn with_relocation(mut self, report: &RelocationReport) -> Self {
        self.relocation = Some(JsonRelocation::from_report(report));
        self
    }

    /// Write JSON to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        write_json(self, writer, pretty)
    }
}

fn write_json<T: Serialize, W: Write>(
    value: &T,
    writer: &mut W,
    pretty: bool,
) -> Result<(), JsonOutputError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    writer.write_all(json.as_bytes())?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Paths in the index are already absolute; relocated targets may not be.
fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
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
