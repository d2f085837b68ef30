//! Output formatters for scan and compare results.
//!
//! This module provides two output formats:
//! - Text for people ([`text`])
//! - JSON for automation and scripting ([`json`])
//!
//! Both render the same summaries, built by the application from the stage
//! reports of a run.
//!
//! # Example
//!
//! ```no_run
//! use dupfind::duplicates::{FileIndex, FullStageOptions, HeaderStageOptions, StageConfig};
//! use dupfind::output::{ScanSummary, TextOutput};
//! use dupfind::scanner::WalkerConfig;
//! use std::path::Path;
//! use std::time::Duration;
//!
//! let mut index = FileIndex::build(Path::new("."), &WalkerConfig::default()).unwrap();
//! let config = StageConfig::default();
//! index.find_header_candidates(&HeaderStageOptions::default(), &config).unwrap();
//! let full = index.find_duplicates(&FullStageOptions::default(), &config).unwrap();
//!
//! let summary = ScanSummary::new(&index, &full, Duration::ZERO);
//! let groups = index.duplicate_groups_list(None);
//! print!("{}", TextOutput::new(&groups, &summary).render());
//! ```

pub mod json;
pub mod text;

use std::path::PathBuf;
use std::time::Duration;

use crate::duplicates::{CrossMatch, FileIndex, FullStageReport};

// Re-export main types
pub use json::{JsonCompareOutput, JsonOutput, JsonOutputError};
pub use text::{CompareTextOutput, TextOutput};

const SIZE_UNITS: [&str; 5] = ["B", "Kb", "Mb", "Gb", "Tb"];

/// Format a byte size as a human-readable string.
///
/// 1024-based with two decimals; terabytes are the largest unit.
///
/// ```
/// use dupfind::output::format_size;
///
/// assert_eq!(format_size(512), "512.00B");
/// assert_eq!(format_size(1536), "1.50Kb");
/// ```
#[must_use]
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in &SIZE_UNITS[..SIZE_UNITS.len() - 1] {
        if size < 1024.0 {
            return format!("{:.2}{}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.2}{}", size, SIZE_UNITS[SIZE_UNITS.len() - 1])
}

/// Totals of a single-root scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Root that was scanned
    pub root: PathBuf,
    /// Files in the index
    pub total_files: usize,
    /// Bytes in the index
    pub total_size: u64,
    /// Entries that could not be indexed
    pub scan_errors: usize,
    /// Confirmed duplicate groups
    pub duplicate_groups: usize,
    /// Redundant copies across all groups
    pub duplicate_files: usize,
    /// Bytes freed by keeping one file per group
    pub reclaimable_space: u64,
    /// Files that could not be hashed
    pub failed_files: usize,
    /// Wall time of the run
    pub scan_duration: Duration,
    /// Whether the run was cut short
    pub interrupted: bool,
}

impl ScanSummary {
    /// Summarize a scanned index and its full-stage report.
    #[must_use]
    pub fn new(index: &FileIndex, full: &FullStageReport, scan_duration: Duration) -> Self {
        Self {
            root: index.root().to_path_buf(),
            total_files: index.len(),
            total_size: index.total_size(),
            scan_errors: index.scan_errors().len(),
            duplicate_groups: full.groups,
            duplicate_files: full.duplicate_files,
            reclaimable_space: full.reclaimable,
            failed_files: full.failed_files,
            scan_duration,
            interrupted: false,
        }
    }
}

/// Totals of a two-root comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompareSummary {
    /// First root
    pub ours: PathBuf,
    /// Second root
    pub theirs: PathBuf,
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
    /// Files that could not be hashed, both sides
    pub failed_files: usize,
    /// Wall time of the run
    pub scan_duration: Duration,
    /// Whether the run was cut short
    pub interrupted: bool,
}

impl CompareSummary {
    /// Summarize a cross-index match.
    #[must_use]
    pub fn new(
        ours: &FileIndex,
        theirs: &FileIndex,
        matched: &CrossMatch,
        scan_duration: Duration,
    ) -> Self {
        let report = matched.report();
        Self {
            ours: ours.root().to_path_buf(),
            theirs: theirs.root().to_path_buf(),
            pairs: report.pairs,
            ours_files: report.ours.files,
            ours_bytes: report.ours.bytes,
            theirs_files: report.theirs.files,
            theirs_bytes: report.theirs.bytes,
            failed_files: report.failed_files,
            scan_duration,
            interrupted: false,
        }
    }
}
