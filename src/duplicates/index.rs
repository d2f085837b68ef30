//! Per-root file index and its stage caches.
//!
//! # Overview
//!
//! A [`FileIndex`] owns every [`FileRecord`] found under one root, sorted by
//! size descending so the largest potential savings surface first. It keeps
//! two derived views, the size map (size → positions) and the descending list
//! of distinct sizes, plus the caches written by the stages.
//!
//! # Positions
//!
//! Stage caches refer to records by position in the record vector. The only
//! structural mutation is [`FileIndex::remove_positions`], which removes back
//! to front, rebuilds both derived views and clears every stage cache, so a
//! cached position is never dereferenced after the vector shifted. Each such
//! mutation also bumps [`FileIndex::generation`]; results computed outside the
//! index are checked against it before they are applied.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::output::format_size;
use crate::scanner::{Digest, FileRecord, ScanError, Walker, WalkerConfig};

use super::groups::{DuplicateGroup, GroupMember};

/// size → digest → positions, iterated largest size first via `.iter().rev()`.
pub type HashGroups = BTreeMap<u64, BTreeMap<Digest, Vec<usize>>>;

/// Results written by the stages.
#[derive(Debug, Clone, Default)]
pub(crate) struct StageCache {
    /// Sizes shared by two or more records, descending.
    pub(crate) size_candidates: Vec<u64>,
    /// Header-digest groups with two or more members.
    pub(crate) header_groups: HashGroups,
    /// Full-digest groups with two or more members.
    pub(crate) duplicate_groups: HashGroups,
    /// This side's half of a cross-index header intersection.
    pub(crate) cross_headers: HashGroups,
    /// This side's half of a cross-index full-digest intersection.
    pub(crate) cross_groups: HashGroups,
}

/// Every file under one root, grouped by size.
#[derive(Debug, Clone)]
pub struct FileIndex {
    root: PathBuf,
    records: Vec<FileRecord>,
    size_map: HashMap<u64, Vec<usize>>,
    sizes: Vec<u64>,
    total_size: u64,
    generation: u64,
    scan_errors: Vec<ScanError>,
    pub(crate) cache: StageCache,
}

impl FileIndex {
    /// Walk `root` and index every regular file found.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] if the root does not exist or is not a directory.
    /// Failures below the root are collected in [`FileIndex::scan_errors`].
    pub fn build(root: &Path, config: &WalkerConfig) -> Result<Self, ScanError> {
        Self::build_with_shutdown(root, config, None)
    }

    /// Like [`FileIndex::build`], stopping the walk early once `shutdown_flag`
    /// is set. The caller decides whether a partial index is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] if the root does not exist or is not a directory.
    pub fn build_with_shutdown(
        root: &Path,
        config: &WalkerConfig,
        shutdown_flag: Option<Arc<AtomicBool>>,
    ) -> Result<Self, ScanError> {
        let metadata =
            std::fs::metadata(root).map_err(|e| ScanError::from_io(root.to_path_buf(), e))?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

        log::info!("Indexing {}", root.display());

        let mut walker = Walker::new(&root, config.clone());
        if let Some(flag) = shutdown_flag {
            walker = walker.with_shutdown_flag(flag);
        }

        let mut entries = Vec::new();
        let mut scan_errors = Vec::new();
        for result in walker.walk() {
            match result {
                Ok(entry) => entries.push(entry),
                Err(e) => scan_errors.push(e),
            }
        }

        if !scan_errors.is_empty() {
            log::warn!(
                "{} entries under {} could not be indexed",
                scan_errors.len(),
                root.display()
            );
        }

        let mut index = Self::from_entries(&root, entries);
        index.scan_errors = scan_errors;
        Ok(index)
    }

    /// Index an externally enumerated list of `(path, size)` pairs.
    #[must_use]
    pub fn from_entries(root: &Path, entries: Vec<(PathBuf, u64)>) -> Self {
        let mut records: Vec<FileRecord> = entries
            .into_iter()
            .map(|(path, size)| FileRecord::new(path, size))
            .collect();
        // Stable, so equal sizes keep enumeration order
        records.sort_by(|a, b| b.size().cmp(&a.size()));

        let mut index = Self {
            root: root.to_path_buf(),
            records,
            size_map: HashMap::new(),
            sizes: Vec::new(),
            total_size: 0,
            generation: 0,
            scan_errors: Vec::new(),
            cache: StageCache::default(),
        };
        index.rebuild_views();

        log::info!("{}", index);
        index
    }

    /// Root directory of the index.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final component of the root, used to name relocation targets.
    #[must_use]
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map_or_else(|| "root".to_string(), |n| n.to_string_lossy().into_owned())
    }

    /// Number of indexed files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index holds no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of all file sizes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Largest file size, if any.
    #[must_use]
    pub fn max_size(&self) -> Option<u64> {
        self.sizes.first().copied()
    }

    /// Distinct sizes, largest first.
    #[must_use]
    pub fn sizes(&self) -> &[u64] {
        &self.sizes
    }

    /// All records, largest first.
    #[must_use]
    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    /// Record at `pos`.
    #[must_use]
    pub fn record(&self, pos: usize) -> Option<&FileRecord> {
        self.records.get(pos)
    }

    pub(crate) fn record_mut(&mut self, pos: usize) -> Option<&mut FileRecord> {
        self.records.get_mut(pos)
    }

    /// Positions of the records with exactly `size` bytes.
    #[must_use]
    pub fn positions_for_size(&self, size: u64) -> &[usize] {
        self.size_map.get(&size).map_or(&[], Vec::as_slice)
    }

    /// Records with exactly `size` bytes.
    #[must_use]
    pub fn files_with_size(&self, size: u64) -> Vec<&FileRecord> {
        self.positions_for_size(size)
            .iter()
            .filter_map(|&pos| self.records.get(pos))
            .collect()
    }

    /// Structural mutation counter.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Entries that could not be indexed while walking.
    #[must_use]
    pub fn scan_errors(&self) -> &[ScanError] {
        &self.scan_errors
    }

    /// Sizes found by the last size stage.
    #[must_use]
    pub fn size_candidates(&self) -> &[u64] {
        &self.cache.size_candidates
    }

    /// Groups kept by the last header stage.
    #[must_use]
    pub fn header_groups(&self) -> &HashGroups {
        &self.cache.header_groups
    }

    /// Groups confirmed by the last full-hash stage.
    #[must_use]
    pub fn duplicate_groups(&self) -> &HashGroups {
        &self.cache.duplicate_groups
    }

    /// This side's half of the last applied cross-index header intersection.
    #[must_use]
    pub fn cross_headers(&self) -> &HashGroups {
        &self.cache.cross_headers
    }

    /// This side's half of the last applied cross-index match.
    #[must_use]
    pub fn cross_groups(&self) -> &HashGroups {
        &self.cache.cross_groups
    }

    /// Confirmed duplicate group number `idx`, largest size first.
    #[must_use]
    pub fn duplicate_group(&self, idx: usize) -> Option<DuplicateGroup> {
        self.group_views(&self.cache.duplicate_groups).nth(idx)
    }

    /// Confirmed duplicate groups, optionally only the first `limit`.
    #[must_use]
    pub fn duplicate_groups_list(&self, limit: Option<usize>) -> Vec<DuplicateGroup> {
        self.group_views(&self.cache.duplicate_groups)
            .take(limit.unwrap_or(usize::MAX))
            .collect()
    }

    /// This side's cross-index groups for the `idx`-th matched size.
    #[must_use]
    pub fn cross_group(&self, idx: usize) -> Vec<DuplicateGroup> {
        let Some((&size, by_digest)) = self.cache.cross_groups.iter().rev().nth(idx) else {
            return Vec::new();
        };
        by_digest
            .iter()
            .map(|(digest, positions)| self.group_view(size, digest, positions))
            .collect()
    }

    /// This side's cross-index groups for the first `limit` matched sizes.
    #[must_use]
    pub fn cross_groups_list(&self, limit: Option<usize>) -> Vec<Vec<DuplicateGroup>> {
        let sizes = self.cache.cross_groups.len();
        (0..limit.unwrap_or(sizes).min(sizes))
            .map(|idx| self.cross_group(idx))
            .collect()
    }

    fn group_views<'a>(
        &'a self,
        groups: &'a HashGroups,
    ) -> impl Iterator<Item = DuplicateGroup> + 'a {
        groups.iter().rev().flat_map(move |(&size, by_digest)| {
            by_digest
                .iter()
                .map(move |(digest, positions)| self.group_view(size, digest, positions))
        })
    }

    fn group_view(&self, size: u64, digest: &Digest, positions: &[usize]) -> DuplicateGroup {
        let files = positions
            .iter()
            .filter_map(|&pos| self.records.get(pos))
            .map(|r| GroupMember::new(r.path().to_path_buf(), r.size()))
            .collect();
        DuplicateGroup::new(digest.clone(), size, files)
    }

    /// Remove the records at `positions` and invalidate every stage cache.
    ///
    /// Positions are removed from the back forward so an earlier removal
    /// never shifts a position still waiting to be removed.
    pub(crate) fn remove_positions(&mut self, mut positions: Vec<usize>) {
        if positions.is_empty() {
            return;
        }

        positions.sort_unstable_by(|a, b| b.cmp(a));
        positions.dedup();
        for pos in positions {
            if pos < self.records.len() {
                self.records.remove(pos);
            } else {
                log::warn!("Ignoring out of range position {} during compaction", pos);
            }
        }

        self.rebuild_views();
        self.cache = StageCache::default();
        self.generation += 1;

        log::debug!(
            "Index {} compacted to {} files (generation {})",
            self.root.display(),
            self.records.len(),
            self.generation
        );
    }

    fn rebuild_views(&mut self) {
        self.size_map.clear();
        self.total_size = 0;
        for (pos, record) in self.records.iter().enumerate() {
            self.size_map.entry(record.size()).or_default().push(pos);
            self.total_size += record.size();
        }
        self.sizes = self.size_map.keys().copied().collect();
        self.sizes.sort_unstable_by(|a, b| b.cmp(a));
    }
}

impl fmt::Display for FileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} files, {}, max size {}",
            self.name(),
            self.len(),
            format_size(self.total_size),
            format_size(self.max_size().unwrap_or(0))
        )
    }
}
