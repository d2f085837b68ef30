//! Staged narrowing of duplicate candidates within one index.
//!
//! # Overview
//!
//! Each stage uses a more expensive test than the last and only looks at what
//! the previous stage kept:
//!
//! 1. **Size**: records sharing a size (no I/O)
//! 2. **Header**: digest of the first bytes of each same-size record
//! 3. **Full**: digest of the whole content of each header-group member,
//!    optionally followed by a byte-for-byte comparison
//!
//! Singleton groups are dropped after every stage. Hashing runs on a bounded
//! rayon pool; results are written to the index only after the pool is done.
//!
//! # Example
//!
//! ```no_run
//! use dupfind::duplicates::{FileIndex, FullStageOptions, HeaderStageOptions, StageConfig};
//! use dupfind::scanner::WalkerConfig;
//! use std::path::Path;
//!
//! let mut index = FileIndex::build(Path::new("/data"), &WalkerConfig::default()).unwrap();
//! let config = StageConfig::default();
//!
//! index.find_header_candidates(&HeaderStageOptions::default(), &config).unwrap();
//! let report = index.find_duplicates(&FullStageOptions::default(), &config).unwrap();
//! println!("{} groups, {} bytes reclaimable", report.groups, report.reclaimable);
//! ```

use std::collections::HashSet;
use std::path::PathBuf;

use rayon::prelude::*;

use super::groups::{count_items, count_size, reclaimable_size};
use super::index::{FileIndex, HashGroups};
use super::{SkipReason, StageConfig, StageError};
use crate::output::format_size;
use crate::progress::{CounterUnit, StageTracker};
use crate::scanner::{Digest, HashError};

/// Files smaller than this are skipped by the header stage unless overridden.
pub const DEFAULT_HEADER_MIN_SIZE: u64 = 1024 * 1024;

/// Options for [`FileIndex::find_header_candidates`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderStageOptions {
    /// Only the first `limit` candidate sizes, largest first.
    pub limit: Option<usize>,
    /// Skip sizes below this threshold.
    pub min_size: u64,
}

impl Default for HeaderStageOptions {
    fn default() -> Self {
        Self {
            limit: None,
            min_size: DEFAULT_HEADER_MIN_SIZE,
        }
    }
}

impl HeaderStageOptions {
    /// Cap the number of sizes examined.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the minimum size threshold.
    #[must_use]
    pub fn with_min_size(mut self, min_size: u64) -> Self {
        self.min_size = min_size;
        self
    }
}

/// Options for [`FileIndex::find_duplicates`].
///
/// `min_size` and `max_size` are exclusive bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FullStageOptions {
    /// Only the first `limit` header-stage sizes, largest first.
    pub limit: Option<usize>,
    /// Only sizes strictly greater than this.
    pub min_size: Option<u64>,
    /// Only sizes strictly less than this.
    pub max_size: Option<u64>,
}

impl FullStageOptions {
    /// Cap the number of sizes examined.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the exclusive lower bound.
    #[must_use]
    pub fn with_min_size(mut self, min_size: u64) -> Self {
        self.min_size = Some(min_size);
        self
    }

    /// Set the exclusive upper bound.
    #[must_use]
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = Some(max_size);
        self
    }

    fn accepts(&self, size: u64) -> bool {
        self.min_size.map_or(true, |min| size > min) && self.max_size.map_or(true, |max| size < max)
    }
}

/// Summary of the size stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizeStageReport {
    /// Sizes shared by two or more files
    pub candidate_sizes: usize,
    /// Files having one of those sizes
    pub candidate_files: usize,
    /// Bytes occupied by those files
    pub candidate_bytes: u64,
    /// Set when the stage had nothing to do
    pub skipped: Option<SkipReason>,
}

/// Summary of the header-hash stage.
#[derive(Debug, Clone, Default)]
pub struct HeaderStageReport {
    /// Candidate sizes that passed the limit and threshold
    pub selected_sizes: usize,
    /// Files of the selected sizes
    pub input_files: usize,
    /// Files with a header digest
    pub hashed_files: usize,
    /// Files that could not be read
    pub failed_files: usize,
    /// Read errors, one per failed file
    pub errors: Vec<HashError>,
    /// Surviving (size, digest) groups
    pub groups: usize,
    /// Files in surviving groups
    pub files: usize,
    /// Bytes occupied by files in surviving groups
    pub bytes: u64,
    /// Set when the stage had nothing to do
    pub skipped: Option<SkipReason>,
}

impl HeaderStageReport {
    fn skipped(reason: SkipReason) -> Self {
        log::info!("{}", reason);
        Self {
            skipped: Some(reason),
            ..Default::default()
        }
    }
}

/// Summary of the full-hash stage.
#[derive(Debug, Clone, Default)]
pub struct FullStageReport {
    /// Header-stage sizes that passed the limit and range
    pub selected_sizes: usize,
    /// Files in the selected header groups
    pub input_files: usize,
    /// Files with a full digest
    pub hashed_files: usize,
    /// Files that could not be read
    pub failed_files: usize,
    /// Read errors, one per failed file
    pub errors: Vec<HashError>,
    /// Bytes covered by the full digests
    pub bytes_hashed: u64,
    /// Confirmed duplicate groups
    pub groups: usize,
    /// Redundant copies across all groups
    pub duplicate_files: usize,
    /// Bytes freed by keeping one file per group
    pub reclaimable: u64,
    /// Set when the stage had nothing to do
    pub skipped: Option<SkipReason>,
}

impl FullStageReport {
    fn skipped(reason: SkipReason) -> Self {
        log::info!("{}", reason);
        Self {
            skipped: Some(reason),
            ..Default::default()
        }
    }
}

/// Which digest a batch computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HashKind {
    Header,
    Full,
}

/// Counter slots of a [`StageTracker`] a batch advances.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CounterSlots {
    pub(crate) files: usize,
    pub(crate) bytes: Option<usize>,
}

/// Outcome of hashing a set of positions.
#[derive(Debug, Default)]
pub(crate) struct HashBatch {
    /// `(position, size, digest)` in input order
    pub(crate) digests: Vec<(usize, u64, Digest)>,
    pub(crate) errors: Vec<HashError>,
}

impl HashBatch {
    pub(crate) fn bytes(&self) -> u64 {
        self.digests.iter().map(|(_, size, _)| size).sum()
    }

    /// Group the digests by size then digest, singletons included.
    pub(crate) fn group(&self) -> HashGroups {
        let mut groups = HashGroups::new();
        for (pos, size, digest) in &self.digests {
            groups
                .entry(*size)
                .or_default()
                .entry(digest.clone())
                .or_default()
                .push(*pos);
        }
        groups
    }
}

/// Remove groups of one member, then sizes left without groups.
pub(crate) fn drop_singletons(groups: &mut HashGroups) {
    for by_digest in groups.values_mut() {
        by_digest.retain(|_, positions| positions.len() >= 2);
    }
    groups.retain(|_, by_digest| !by_digest.is_empty());
}

/// Compute one kind of digest for every position, using memoized values
/// where present.
///
/// Records are only read through the pool; memoized digests are written back
/// after it finished. On cancellation the digests computed so far are still
/// memoized and [`StageError::Interrupted`] is returned.
pub(crate) fn hash_positions(
    index: &mut FileIndex,
    positions: &[usize],
    kind: HashKind,
    config: &StageConfig,
    tracker: &StageTracker<'_>,
    slots: CounterSlots,
) -> Result<HashBatch, StageError> {
    let jobs: Vec<(usize, PathBuf, u64, Option<Digest>)> = positions
        .iter()
        .filter_map(|&pos| {
            let record = index.record(pos)?;
            let cached = match kind {
                HashKind::Header => record.cached_header_hash(),
                HashKind::Full => record.cached_full_hash(),
            };
            Some((pos, record.path().to_path_buf(), record.size(), cached.cloned()))
        })
        .collect();

    let hasher = config.hasher.as_ref();
    let hash_one = |(pos, path, size, cached): (usize, PathBuf, u64, Option<Digest>)| {
        if config.is_shutdown_requested() {
            return None;
        }

        let result = match cached {
            Some(digest) => Ok(digest),
            None => match kind {
                HashKind::Header => hasher.header_digest(&path),
                HashKind::Full => hasher.full_digest(&path),
            },
        };

        match &result {
            Ok(digest) => log::trace!("{:?} {} {}", kind, digest.short(), path.display()),
            Err(e) => log::warn!("Failed to hash {}: {}", path.display(), e),
        }

        tracker.advance(slots.files, 1, &path);
        if let Some(bytes) = slots.bytes {
            tracker.advance(bytes, size, &path);
        }

        Some((pos, size, result))
    };

    // Build a custom thread pool with limited parallelism for I/O
    let results: Vec<Option<(usize, u64, Result<Digest, HashError>)>> =
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.io_threads)
            .build()
        {
            Ok(pool) => pool.install(|| jobs.into_par_iter().map(hash_one).collect()),
            Err(e) => {
                log::warn!("Failed to create hashing thread pool, hashing inline: {}", e);
                jobs.into_iter().map(hash_one).collect()
            }
        };

    let mut batch = HashBatch::default();
    for (pos, size, result) in results.into_iter().flatten() {
        match result {
            Ok(digest) => {
                if let Some(record) = index.record_mut(pos) {
                    match kind {
                        HashKind::Header => record.set_header_hash(digest.clone()),
                        HashKind::Full => record.set_full_hash(digest.clone()),
                    }
                }
                batch.digests.push((pos, size, digest));
            }
            Err(e) => batch.errors.push(e),
        }
    }

    if config.is_shutdown_requested() {
        log::info!("{:?} hashing interrupted by shutdown signal", kind);
        return Err(StageError::Interrupted);
    }

    Ok(batch)
}

/// Split every group into clusters whose members compare byte-for-byte
/// equal. Extra clusters get the digest suffixed with `#<n>`.
///
/// A cluster head that cannot be read is evicted and the comparison retried
/// against the next member, so only unreadable files drop out. Each failing
/// path is reported once.
fn verify_groups(
    index: &FileIndex,
    groups: HashGroups,
    config: &StageConfig,
    errors: &mut Vec<HashError>,
) -> Result<HashGroups, StageError> {
    let mut verified = HashGroups::new();
    let mut failed: HashSet<PathBuf> = HashSet::new();
    let mut record_failure = |e: HashError| {
        if failed.insert(e.path().to_path_buf()) {
            log::warn!("Failed to verify {}: {}", e.path().display(), e);
            errors.push(e);
        }
    };

    for (size, by_digest) in groups {
        for (digest, positions) in by_digest {
            if config.is_shutdown_requested() {
                return Err(StageError::Interrupted);
            }

            let mut clusters: Vec<Vec<usize>> = Vec::new();
            'candidates: for pos in positions {
                let Some(record) = index.record(pos) else {
                    continue;
                };

                let mut i = 0;
                while i < clusters.len() {
                    let Some(head) = index.record(clusters[i][0]) else {
                        i += 1;
                        continue;
                    };
                    match config.hasher.contents_equal(head.path(), record.path()) {
                        Ok(true) => {
                            clusters[i].push(pos);
                            continue 'candidates;
                        }
                        Ok(false) => i += 1,
                        Err(e) if e.path() == head.path() => {
                            record_failure(e);
                            clusters[i].remove(0);
                            if clusters[i].is_empty() {
                                clusters.remove(i);
                            }
                        }
                        Err(e) => {
                            record_failure(e);
                            continue 'candidates;
                        }
                    }
                }
                clusters.push(vec![pos]);
            }

            if clusters.len() > 1 {
                log::warn!(
                    "Digest {} covers {} distinct contents at size {}",
                    digest.short(),
                    clusters.len(),
                    size
                );
            }

            let by_digest = verified.entry(size).or_default();
            for (i, cluster) in clusters.into_iter().enumerate() {
                let key = if i == 0 {
                    digest.clone()
                } else {
                    Digest::from_hex(format!("{}#{}", digest, i))
                };
                by_digest.insert(key, cluster);
            }
        }
    }

    drop_singletons(&mut verified);
    Ok(verified)
}

impl FileIndex {
    /// Find sizes shared by two or more files.
    ///
    /// Replaces the cached size candidates. Performs no I/O.
    pub fn find_size_candidates(&mut self) -> SizeStageReport {
        if self.is_empty() {
            self.cache.size_candidates.clear();
            log::info!("{}", SkipReason::NoFiles);
            return SizeStageReport {
                skipped: Some(SkipReason::NoFiles),
                ..Default::default()
            };
        }

        let candidates: Vec<u64> = self
            .sizes()
            .iter()
            .copied()
            .filter(|&size| self.positions_for_size(size).len() >= 2)
            .collect();

        let mut report = SizeStageReport {
            candidate_sizes: candidates.len(),
            ..Default::default()
        };
        for &size in &candidates {
            let n = self.positions_for_size(size).len();
            report.candidate_files += n;
            report.candidate_bytes += n as u64 * size;
        }

        log::info!(
            "Size stage: {} sizes shared by {} files ({})",
            report.candidate_sizes,
            report.candidate_files,
            format_size(report.candidate_bytes)
        );

        self.cache.size_candidates = candidates;
        report
    }

    /// Group same-size files by header digest.
    ///
    /// Recomputes the size stage first, then takes the first `limit`
    /// candidate sizes and keeps those of at least `min_size` bytes.
    /// Replaces the header groups and clears the duplicate groups.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Interrupted`] if the shutdown flag was set. The
    /// stage caches are then left as they were.
    pub fn find_header_candidates(
        &mut self,
        options: &HeaderStageOptions,
        config: &StageConfig,
    ) -> Result<HeaderStageReport, StageError> {
        let size_report = self.find_size_candidates();
        if let Some(reason) = size_report.skipped {
            config.notify_skipped(reason);
            return Ok(HeaderStageReport::skipped(reason));
        }
        if self.cache.size_candidates.is_empty() {
            config.notify_skipped(SkipReason::NoSizeCandidates);
            return Ok(HeaderStageReport::skipped(SkipReason::NoSizeCandidates));
        }

        let selected: Vec<u64> = self
            .cache
            .size_candidates
            .iter()
            .take(options.limit.unwrap_or(usize::MAX))
            .copied()
            .filter(|&size| size >= options.min_size)
            .collect();
        let positions: Vec<usize> = selected
            .iter()
            .flat_map(|&size| self.positions_for_size(size).iter().copied())
            .collect();

        log::info!(
            "Header stage: hashing {} files across {} sizes",
            positions.len(),
            selected.len()
        );

        let tracker = StageTracker::start(
            "header",
            config.progress_callback.as_ref(),
            &[("files", CounterUnit::Files, positions.len() as u64)],
        );
        let batch = hash_positions(
            self,
            &positions,
            HashKind::Header,
            config,
            &tracker,
            CounterSlots {
                files: 0,
                bytes: None,
            },
        )?;
        drop(tracker);

        let mut groups = batch.group();
        drop_singletons(&mut groups);
        let HashBatch { digests, errors } = batch;
        let hashed_files = digests.len();

        let report = HeaderStageReport {
            selected_sizes: selected.len(),
            input_files: positions.len(),
            hashed_files,
            failed_files: errors.len(),
            errors,
            groups: groups.values().map(|g| g.len()).sum(),
            files: count_items(&groups),
            bytes: count_size(&groups),
            skipped: None,
        };

        log::info!(
            "Header stage complete: {} groups, {} files, {}",
            report.groups,
            report.files,
            format_size(report.bytes)
        );

        self.cache.header_groups = groups;
        self.cache.duplicate_groups.clear();
        Ok(report)
    }

    /// Confirm header groups by full-content digest.
    ///
    /// Takes the header-stage sizes largest first, the first `limit` of
    /// them, restricted to the exclusive `(min_size, max_size)` range.
    /// Replaces the duplicate groups.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Interrupted`] if the shutdown flag was set. The
    /// stage caches are then left as they were.
    pub fn find_duplicates(
        &mut self,
        options: &FullStageOptions,
        config: &StageConfig,
    ) -> Result<FullStageReport, StageError> {
        if self.cache.header_groups.is_empty() {
            config.notify_skipped(SkipReason::NoHeaderCandidates);
            return Ok(FullStageReport::skipped(SkipReason::NoHeaderCandidates));
        }

        let selected: Vec<u64> = self
            .cache
            .header_groups
            .keys()
            .rev()
            .take(options.limit.unwrap_or(usize::MAX))
            .copied()
            .filter(|&size| options.accepts(size))
            .collect();
        let positions: Vec<usize> = selected
            .iter()
            .filter_map(|size| self.cache.header_groups.get(size))
            .flat_map(|by_digest| by_digest.values().flatten().copied())
            .collect();
        let total_bytes: u64 = positions
            .iter()
            .filter_map(|&pos| self.record(pos))
            .map(|r| r.size())
            .sum();

        log::info!(
            "Full stage: hashing {} files ({}) across {} sizes",
            positions.len(),
            format_size(total_bytes),
            selected.len()
        );

        let tracker = StageTracker::start(
            "full",
            config.progress_callback.as_ref(),
            &[
                ("files", CounterUnit::Files, positions.len() as u64),
                ("bytes", CounterUnit::Bytes, total_bytes),
            ],
        );
        let batch = hash_positions(
            self,
            &positions,
            HashKind::Full,
            config,
            &tracker,
            CounterSlots {
                files: 0,
                bytes: Some(1),
            },
        )?;
        drop(tracker);

        let mut groups = batch.group();
        drop_singletons(&mut groups);
        let bytes_hashed = batch.bytes();
        let HashBatch { digests, mut errors } = batch;
        let hashed_files = digests.len();

        if config.paranoid {
            log::info!("Full stage: verifying {} groups byte-for-byte", groups.len());
            groups = verify_groups(self, groups, config, &mut errors)?;
        }

        for (size, by_digest) in groups.iter().rev() {
            for (digest, members) in by_digest {
                log::debug!(
                    "Duplicate group {}: {} files, {} each",
                    digest.short(),
                    members.len(),
                    format_size(*size)
                );
            }
        }

        let group_count: usize = groups.values().map(|g| g.len()).sum();
        let report = FullStageReport {
            selected_sizes: selected.len(),
            input_files: positions.len(),
            hashed_files,
            failed_files: errors.len(),
            errors,
            bytes_hashed,
            groups: group_count,
            duplicate_files: count_items(&groups) - group_count,
            reclaimable: reclaimable_size(&groups),
            skipped: None,
        };

        log::info!(
            "Full stage complete: {} groups, {} duplicates, {} reclaimable",
            report.groups,
            report.duplicate_files,
            format_size(report.reclaimable)
        );

        self.cache.duplicate_groups = groups;
        Ok(report)
    }
}
