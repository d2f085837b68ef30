//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - The per-root [`FileIndex`] and its stage caches
//! - Size, header-hash and full-hash narrowing within one index ([`stager`])
//! - The same narrowing across two indices ([`cross`])
//! - Duplicate group views and byte accounting ([`groups`])
//!
//! Stages must run in order on one index: size, then header, then full.
//! Each stage narrows the previous one's output.

pub mod cross;
pub mod groups;
pub mod index;
pub mod stager;

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::progress::ProgressCallback;
use crate::scanner::Hasher;

pub use cross::{
    CrossHeaderReport, CrossHeaders, CrossMatch, CrossMatchReport, CrossMatcher, MatchError,
    PairGroup, PairGroups, Side, SideTotals,
};
pub use groups::{count_items, count_size, reclaimable_size, DuplicateGroup, GroupMember};
pub use index::{FileIndex, HashGroups};
pub use stager::{
    FullStageOptions, FullStageReport, HeaderStageOptions, HeaderStageReport, SizeStageReport,
    DEFAULT_HEADER_MIN_SIZE,
};

/// Why a stage did nothing.
///
/// A skipped stage is a reported no-op, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The index holds no files at all.
    NoFiles,
    /// No two files share a size.
    NoSizeCandidates,
    /// The header stage left nothing for the full-hash stage.
    NoHeaderCandidates,
    /// The two indices share no file size.
    NoCommonSizes,
    /// The two indices share no header digest.
    NoCommonHeaders,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::NoFiles => "No files in index.",
            Self::NoSizeCandidates => "No files with same sizes.",
            Self::NoHeaderCandidates => "No header hash candidates to find from.",
            Self::NoCommonSizes => "No files with same sizes in both dirs.",
            Self::NoCommonHeaders => "No shared header hash candidates in both dirs.",
        };
        f.write_str(msg)
    }
}

/// Errors that abort a stage.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// The stage was cancelled through the shutdown flag.
    ///
    /// The stage caches are left exactly as they were before the call.
    #[error("Stage interrupted by user")]
    Interrupted,

    /// A cross-index result was applied to an index it was not computed for,
    /// or the index was mutated since.
    #[error("Stale result for {root}: computed at generation {expected}, index is at {actual}")]
    StaleResult {
        /// Root of the index the result was applied to
        root: PathBuf,
        /// Generation the result was computed against
        expected: u64,
        /// Current generation of the index
        actual: u64,
    },
}

/// Configuration shared by every hashing stage.
#[derive(Clone)]
pub struct StageConfig {
    /// Hasher used for header and full digests.
    pub hasher: Arc<Hasher>,
    /// Number of I/O threads for parallel hashing.
    /// Default is 4 to prevent disk thrashing.
    pub io_threads: usize,
    /// Verify byte-for-byte after full digests matched.
    pub paranoid: bool,
    /// Optional shutdown flag for cooperative cancellation.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl fmt::Debug for StageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageConfig")
            .field("hasher", &self.hasher)
            .field("io_threads", &self.io_threads)
            .field("paranoid", &self.paranoid)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            hasher: Arc::new(Hasher::new()),
            io_threads: 4,
            paranoid: false,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl StageConfig {
    /// Use a specific hasher.
    #[must_use]
    pub fn with_hasher(mut self, hasher: Hasher) -> Self {
        self.hasher = Arc::new(hasher);
        self
    }

    /// Set the I/O thread count (at least one).
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Enable byte-by-byte verification of full-hash groups.
    #[must_use]
    pub fn with_paranoid(mut self, enabled: bool) -> Self {
        self.paranoid = enabled;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Pass a skipped stage on to the progress subscriber.
    pub(crate) fn notify_skipped(&self, reason: SkipReason) {
        if let Some(callback) = &self.progress_callback {
            callback.on_message(&reason.to_string());
        }
    }

    /// Check if shutdown has been requested.
    pub(crate) fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_config_default() {
        let config = StageConfig::default();
        assert_eq!(config.io_threads, 4);
        assert!(!config.paranoid);
        assert!(config.shutdown_flag.is_none());
        assert!(config.progress_callback.is_none());
        assert!(!config.is_shutdown_requested());
    }

    #[test]
    fn test_stage_config_builder() {
        let flag = Arc::new(AtomicBool::new(true));
        let config = StageConfig::default()
            .with_io_threads(0)
            .with_paranoid(true)
            .with_shutdown_flag(flag);

        assert_eq!(config.io_threads, 1);
        assert!(config.paranoid);
        assert!(config.is_shutdown_requested());
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(
            SkipReason::NoSizeCandidates.to_string(),
            "No files with same sizes."
        );
        assert_eq!(
            SkipReason::NoCommonSizes.to_string(),
            "No files with same sizes in both dirs."
        );
    }
}
