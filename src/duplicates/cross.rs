//! Duplicate matching across two indices.
//!
//! # Overview
//!
//! [`CrossMatcher`] runs the size, header and full stages over two
//! [`FileIndex`] values at once, intersecting keys between the sides at every
//! step. Singletons are kept: one file on each side is a valid pair.
//!
//! The matcher never writes into the indices' stage caches. It returns
//! [`CrossHeaders`] and [`CrossMatch`] values, stamped with the root and
//! generation of both sides, and each index applies its own half:
//!
//! ```no_run
//! use dupfind::duplicates::{CrossMatcher, FileIndex, Side, StageConfig};
//! use dupfind::scanner::WalkerConfig;
//! use std::path::Path;
//!
//! let walker = WalkerConfig::default();
//! let mut photos = FileIndex::build(Path::new("/data/photos"), &walker).unwrap();
//! let mut backup = FileIndex::build(Path::new("/mnt/backup"), &walker).unwrap();
//! let config = StageConfig::default();
//!
//! let matched = {
//!     let mut matcher = CrossMatcher::new(&mut photos, &mut backup).unwrap();
//!     let headers = matcher.intersect_headers(&config).unwrap();
//!     matcher.intersect_full_hashes(&headers, None, &config).unwrap()
//! };
//! photos.apply_cross_match(&matched, Side::Ours).unwrap();
//! backup.apply_cross_match(&matched, Side::Theirs).unwrap();
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::index::{FileIndex, HashGroups};
use super::stager::{hash_positions, CounterSlots, HashBatch, HashKind};
use super::{SkipReason, StageConfig, StageError};
use crate::output::format_size;
use crate::progress::{CounterUnit, StageTracker};
use crate::scanner::{Digest, HashError};

/// One of the two indices of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The index passed first to [`CrossMatcher::new`].
    Ours,
    /// The index passed second.
    Theirs,
}

/// Positions on both sides sharing a size and digest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairGroup {
    /// Positions in our index
    pub ours: Vec<usize>,
    /// Positions in their index
    pub theirs: Vec<usize>,
}

/// size → digest → pair group.
pub type PairGroups = BTreeMap<u64, BTreeMap<Digest, PairGroup>>;

/// Errors raised when setting up a comparison.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    /// One root contains the other, so files would be matched against
    /// themselves.
    #[error("Directories overlap: {ours} and {theirs}")]
    OverlappingRoots {
        /// Root of our index
        ours: PathBuf,
        /// Root of their index
        theirs: PathBuf,
    },
}

/// File and byte totals for one side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SideTotals {
    /// Files in shared groups
    pub files: usize,
    /// Bytes occupied by those files
    pub bytes: u64,
}

impl SideTotals {
    fn of(groups: &PairGroups, side: Side) -> Self {
        let mut totals = Self::default();
        for (&size, by_digest) in groups {
            for pair in by_digest.values() {
                let n = pair.side(side).len();
                totals.files += n;
                totals.bytes += n as u64 * size;
            }
        }
        totals
    }
}

/// Summary of a cross-index header intersection.
#[derive(Debug, Clone, Default)]
pub struct CrossHeaderReport {
    /// Sizes present on both sides
    pub common_sizes: usize,
    /// Our files under shared header digests
    pub ours: SideTotals,
    /// Their files under shared header digests
    pub theirs: SideTotals,
    /// Shared (size, header digest) keys
    pub shared_headers: usize,
    /// Files that could not be read, both sides
    pub failed_files: usize,
    /// Read errors, one per failed file
    pub errors: Vec<HashError>,
    /// Set when there was nothing to intersect
    pub skipped: Option<SkipReason>,
}

/// Summary of a cross-index full-hash match.
#[derive(Debug, Clone, Default)]
pub struct CrossMatchReport {
    /// Shared header sizes that passed the limit
    pub selected_sizes: usize,
    /// Our files with a counterpart
    pub ours: SideTotals,
    /// Their files with a counterpart
    pub theirs: SideTotals,
    /// Shared full digests
    pub pairs: usize,
    /// Files that could not be read, both sides
    pub failed_files: usize,
    /// Read errors, one per failed file
    pub errors: Vec<HashError>,
    /// Set when there was nothing to intersect
    pub skipped: Option<SkipReason>,
}

/// Identity of an index when a result was computed.
#[derive(Debug, Clone, PartialEq, Eq)]
struct IndexStamp {
    root: PathBuf,
    generation: u64,
}

impl IndexStamp {
    fn of(index: &FileIndex) -> Self {
        Self {
            root: index.root().to_path_buf(),
            generation: index.generation(),
        }
    }

    fn check(&self, index: &FileIndex) -> Result<(), StageError> {
        if self.root != index.root() || self.generation != index.generation() {
            return Err(StageError::StaleResult {
                root: index.root().to_path_buf(),
                expected: self.generation,
                actual: index.generation(),
            });
        }
        Ok(())
    }
}

/// Header digests shared by both indices.
#[derive(Debug, Clone)]
pub struct CrossHeaders {
    ours: IndexStamp,
    theirs: IndexStamp,
    groups: PairGroups,
    report: CrossHeaderReport,
}

/// Full digests shared by both indices.
#[derive(Debug, Clone)]
pub struct CrossMatch {
    ours: IndexStamp,
    theirs: IndexStamp,
    groups: PairGroups,
    report: CrossMatchReport,
}

impl PairGroup {
    /// Positions on one side.
    #[must_use]
    pub fn side(&self, side: Side) -> &[usize] {
        match side {
            Side::Ours => &self.ours,
            Side::Theirs => &self.theirs,
        }
    }
}

fn side_groups(groups: &PairGroups, side: Side) -> HashGroups {
    groups
        .iter()
        .map(|(&size, by_digest)| {
            let half = by_digest
                .iter()
                .map(|(digest, pair)| (digest.clone(), pair.side(side).to_vec()))
                .collect();
            (size, half)
        })
        .collect()
}

macro_rules! cross_result_accessors {
    ($ty:ty, $report:ty) => {
        impl $ty {
            /// Shared groups keyed by size then digest.
            #[must_use]
            pub fn groups(&self) -> &PairGroups {
                &self.groups
            }

            /// Stage summary.
            #[must_use]
            pub fn report(&self) -> &$report {
                &self.report
            }

            /// Whether nothing is shared.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.groups.is_empty()
            }

            /// One side's positions, in the layout of the index stage caches.
            #[must_use]
            pub fn side(&self, side: Side) -> HashGroups {
                side_groups(&self.groups, side)
            }

            fn stamp(&self, side: Side) -> &IndexStamp {
                match side {
                    Side::Ours => &self.ours,
                    Side::Theirs => &self.theirs,
                }
            }
        }
    };
}

cross_result_accessors!(CrossHeaders, CrossHeaderReport);
cross_result_accessors!(CrossMatch, CrossMatchReport);

/// Keep the (size, digest) keys present on both sides.
fn intersect_groups(ours: HashGroups, mut theirs: HashGroups) -> PairGroups {
    let mut pairs = PairGroups::new();
    for (size, by_digest) in ours {
        let Some(mut other) = theirs.remove(&size) else {
            continue;
        };
        let shared: BTreeMap<Digest, PairGroup> = by_digest
            .into_iter()
            .filter_map(|(digest, positions)| {
                other.remove(&digest).map(|theirs| {
                    (
                        digest,
                        PairGroup {
                            ours: positions,
                            theirs,
                        },
                    )
                })
            })
            .collect();
        if !shared.is_empty() {
            pairs.insert(size, shared);
        }
    }
    pairs
}

fn pair_count(groups: &PairGroups) -> usize {
    groups.values().map(BTreeMap::len).sum()
}

/// Whether either root is, component-wise, inside or equal to the other.
fn roots_overlap(a: &Path, b: &Path) -> bool {
    let a = a.canonicalize().unwrap_or_else(|_| a.to_path_buf());
    let b = b.canonicalize().unwrap_or_else(|_| b.to_path_buf());
    a.starts_with(&b) || b.starts_with(&a)
}

/// Runs the staged comparison between two indices.
#[derive(Debug)]
pub struct CrossMatcher<'a> {
    ours: &'a mut FileIndex,
    theirs: &'a mut FileIndex,
    common_sizes: Option<Vec<u64>>,
}

impl<'a> CrossMatcher<'a> {
    /// Pair two indices for comparison.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::OverlappingRoots`] if one root is inside, or
    /// equal to, the other. Nothing is hashed in that case.
    pub fn new(ours: &'a mut FileIndex, theirs: &'a mut FileIndex) -> Result<Self, MatchError> {
        if roots_overlap(ours.root(), theirs.root()) {
            return Err(MatchError::OverlappingRoots {
                ours: ours.root().to_path_buf(),
                theirs: theirs.root().to_path_buf(),
            });
        }

        Ok(Self {
            ours,
            theirs,
            common_sizes: None,
        })
    }

    /// Sizes present in both indices, largest first.
    pub fn intersect_sizes(&mut self) -> Vec<u64> {
        let theirs: BTreeSet<u64> = self.theirs.sizes().iter().copied().collect();
        let common: Vec<u64> = self
            .ours
            .sizes()
            .iter()
            .copied()
            .filter(|size| theirs.contains(size))
            .collect();

        if common.is_empty() {
            log::info!("{}", SkipReason::NoCommonSizes);
        } else {
            log::info!(
                "{} sizes shared between {} and {}",
                common.len(),
                self.ours.name(),
                self.theirs.name()
            );
        }

        self.common_sizes = Some(common.clone());
        common
    }

    /// Header-hash both sides for every shared size and keep the digests
    /// present on both.
    ///
    /// Runs [`CrossMatcher::intersect_sizes`] first if it has not run yet.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Interrupted`] if the shutdown flag was set.
    pub fn intersect_headers(&mut self, config: &StageConfig) -> Result<CrossHeaders, StageError> {
        let sizes = match self.common_sizes.clone() {
            Some(sizes) => sizes,
            None => self.intersect_sizes(),
        };

        let mut report = CrossHeaderReport {
            common_sizes: sizes.len(),
            ..Default::default()
        };
        if sizes.is_empty() {
            report.skipped = Some(SkipReason::NoCommonSizes);
            config.notify_skipped(SkipReason::NoCommonSizes);
            return Ok(self.headers(PairGroups::new(), report));
        }

        let ours_positions = positions_of_sizes(self.ours, &sizes);
        let theirs_positions = positions_of_sizes(self.theirs, &sizes);

        log::info!(
            "Cross header stage: hashing {} + {} files",
            ours_positions.len(),
            theirs_positions.len()
        );

        let tracker = StageTracker::start(
            "cross header",
            config.progress_callback.as_ref(),
            &[
                ("files (ours)", CounterUnit::Files, ours_positions.len() as u64),
                ("files (theirs)", CounterUnit::Files, theirs_positions.len() as u64),
            ],
        );
        let ours_batch = hash_positions(
            self.ours,
            &ours_positions,
            HashKind::Header,
            config,
            &tracker,
            CounterSlots {
                files: 0,
                bytes: None,
            },
        )?;
        let theirs_batch = hash_positions(
            self.theirs,
            &theirs_positions,
            HashKind::Header,
            config,
            &tracker,
            CounterSlots {
                files: 1,
                bytes: None,
            },
        )?;
        drop(tracker);

        let groups = intersect_groups(ours_batch.group(), theirs_batch.group());
        collect_errors(&mut report.errors, ours_batch, theirs_batch);
        report.failed_files = report.errors.len();
        report.ours = SideTotals::of(&groups, Side::Ours);
        report.theirs = SideTotals::of(&groups, Side::Theirs);
        report.shared_headers = pair_count(&groups);
        if groups.is_empty() {
            report.skipped = Some(SkipReason::NoCommonHeaders);
            config.notify_skipped(SkipReason::NoCommonHeaders);
        }

        log::info!(
            "Cross header stage complete: {} shared headers, {}: {} files ({}), {}: {} files ({})",
            report.shared_headers,
            self.ours.name(),
            report.ours.files,
            format_size(report.ours.bytes),
            self.theirs.name(),
            report.theirs.files,
            format_size(report.theirs.bytes)
        );

        Ok(self.headers(groups, report))
    }

    /// Full-hash both sides of every shared header group and keep the
    /// digests present on both.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::StaleResult`] if `headers` was computed for
    /// other indices or either index changed since, and
    /// [`StageError::Interrupted`] if the shutdown flag was set.
    pub fn intersect_full_hashes(
        &mut self,
        headers: &CrossHeaders,
        limit: Option<usize>,
        config: &StageConfig,
    ) -> Result<CrossMatch, StageError> {
        headers.stamp(Side::Ours).check(self.ours)?;
        headers.stamp(Side::Theirs).check(self.theirs)?;

        let mut report = CrossMatchReport::default();
        if headers.is_empty() {
            report.skipped = Some(SkipReason::NoCommonHeaders);
            log::info!("{}", SkipReason::NoCommonHeaders);
            config.notify_skipped(SkipReason::NoCommonHeaders);
            return Ok(self.matched(PairGroups::new(), report));
        }

        let selected: Vec<&BTreeMap<Digest, PairGroup>> = headers
            .groups
            .values()
            .rev()
            .take(limit.unwrap_or(usize::MAX))
            .collect();
        report.selected_sizes = selected.len();

        let flatten = |side: Side| -> Vec<usize> {
            selected
                .iter()
                .flat_map(|by_digest| by_digest.values())
                .flat_map(|pair| pair.side(side).iter().copied())
                .collect()
        };
        let ours_positions = flatten(Side::Ours);
        let theirs_positions = flatten(Side::Theirs);
        let ours_bytes = bytes_of(self.ours, &ours_positions);
        let theirs_bytes = bytes_of(self.theirs, &theirs_positions);

        log::info!(
            "Cross full stage: hashing {} files ({}) + {} files ({})",
            ours_positions.len(),
            format_size(ours_bytes),
            theirs_positions.len(),
            format_size(theirs_bytes)
        );

        let tracker = StageTracker::start(
            "cross full",
            config.progress_callback.as_ref(),
            &[
                ("files (ours)", CounterUnit::Files, ours_positions.len() as u64),
                ("bytes (ours)", CounterUnit::Bytes, ours_bytes),
                ("files (theirs)", CounterUnit::Files, theirs_positions.len() as u64),
                ("bytes (theirs)", CounterUnit::Bytes, theirs_bytes),
            ],
        );
        let ours_batch = hash_positions(
            self.ours,
            &ours_positions,
            HashKind::Full,
            config,
            &tracker,
            CounterSlots {
                files: 0,
                bytes: Some(1),
            },
        )?;
        let theirs_batch = hash_positions(
            self.theirs,
            &theirs_positions,
            HashKind::Full,
            config,
            &tracker,
            CounterSlots {
                files: 2,
                bytes: Some(3),
            },
        )?;
        drop(tracker);

        let groups = intersect_groups(ours_batch.group(), theirs_batch.group());
        collect_errors(&mut report.errors, ours_batch, theirs_batch);
        report.failed_files = report.errors.len();
        report.ours = SideTotals::of(&groups, Side::Ours);
        report.theirs = SideTotals::of(&groups, Side::Theirs);
        report.pairs = pair_count(&groups);

        for (size, by_digest) in groups.iter().rev() {
            for (digest, pair) in by_digest {
                log::debug!(
                    "Cross group {}: {} + {} files, {} each",
                    digest.short(),
                    pair.ours.len(),
                    pair.theirs.len(),
                    format_size(*size)
                );
            }
        }

        log::info!(
            "Cross full stage complete: {} pairs, {}: {} files ({}), {}: {} files ({})",
            report.pairs,
            self.ours.name(),
            report.ours.files,
            format_size(report.ours.bytes),
            self.theirs.name(),
            report.theirs.files,
            format_size(report.theirs.bytes)
        );

        Ok(self.matched(groups, report))
    }

    fn headers(&self, groups: PairGroups, report: CrossHeaderReport) -> CrossHeaders {
        CrossHeaders {
            ours: IndexStamp::of(self.ours),
            theirs: IndexStamp::of(self.theirs),
            groups,
            report,
        }
    }

    fn matched(&self, groups: PairGroups, report: CrossMatchReport) -> CrossMatch {
        CrossMatch {
            ours: IndexStamp::of(self.ours),
            theirs: IndexStamp::of(self.theirs),
            groups,
            report,
        }
    }
}

fn positions_of_sizes(index: &FileIndex, sizes: &[u64]) -> Vec<usize> {
    sizes
        .iter()
        .flat_map(|&size| index.positions_for_size(size).iter().copied())
        .collect()
}

fn bytes_of(index: &FileIndex, positions: &[usize]) -> u64 {
    positions
        .iter()
        .filter_map(|&pos| index.record(pos))
        .map(|r| r.size())
        .sum()
}

fn collect_errors(errors: &mut Vec<HashError>, ours: HashBatch, theirs: HashBatch) {
    errors.extend(ours.errors);
    errors.extend(theirs.errors);
}

impl FileIndex {
    /// Store this index's half of a cross header intersection.
    ///
    /// Clears the cross groups, which refine the cross headers.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::StaleResult`] if `headers` was computed for
    /// another index or this index changed since.
    pub fn apply_cross_headers(
        &mut self,
        headers: &CrossHeaders,
        side: Side,
    ) -> Result<(), StageError> {
        headers.stamp(side).check(self)?;
        self.cache.cross_headers = headers.side(side);
        self.cache.cross_groups.clear();
        Ok(())
    }

    /// Store this index's half of a cross full-hash match.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::StaleResult`] if `matched` was computed for
    /// another index or this index changed since.
    pub fn apply_cross_match(
        &mut self,
        matched: &CrossMatch,
        side: Side,
    ) -> Result<(), StageError> {
        matched.stamp(side).check(self)?;
        self.cache.cross_groups = matched.side(side);
        Ok(())
    }
}
