//! Moving redundant copies out of an indexed tree.
//!
//! # Overview
//!
//! [`Relocator::move_duplicates`] moves files selected from an index's stage
//! results into a destination directory, preserving each file's path
//! relative to the index root:
//!
//! - [`RelocationScope::Within`] uses the confirmed duplicate groups. One
//!   survivor per group stays in place, the member with the shortest path.
//! - [`RelocationScope::AgainstOther`] uses the cross-index groups. Every
//!   member on this side is moved because its counterpart lives in the
//!   other tree.
//!
//! After the moves the index drops the moved records and clears its stage
//! caches, so stages must be run again before another relocation.
//!
//! # Safety
//!
//! Existing targets are never overwritten. A file that cannot be moved stays
//! in the index and is reported in [`RelocationReport::failures`]. Nothing
//! is rolled back.
//!
//! # Example
//!
//! ```no_run
//! use dupfind::actions::{RelocateConfig, RelocationScope, Relocator};
//! use dupfind::duplicates::{FileIndex, FullStageOptions, HeaderStageOptions, StageConfig};
//! use dupfind::scanner::WalkerConfig;
//! use std::path::Path;
//!
//! let mut index = FileIndex::build(Path::new("/data/photos"), &WalkerConfig::default()).unwrap();
//! let config = StageConfig::default();
//! index.find_header_candidates(&HeaderStageOptions::default(), &config).unwrap();
//! index.find_duplicates(&FullStageOptions::default(), &config).unwrap();
//!
//! let report = Relocator::new(RelocateConfig::default())
//!     .move_duplicates(&mut index, RelocationScope::Within, None)
//!     .unwrap();
//! println!("{}", report.summary());
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::duplicates::FileIndex;
use crate::output::format_size;

/// Directory created next to (or inside) the root to receive moved files.
pub const DUPS_DIR_NAME: &str = "dups";

/// Which stage results select the files to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationScope {
    /// Confirmed duplicate groups of this index; one survivor per group.
    Within,
    /// Cross-index groups; every member on this side is moved.
    AgainstOther,
}

/// Error that stops a relocation.
#[derive(Debug, Error)]
pub enum RelocateError {
    /// A destination directory could not be created.
    #[error("cannot create destination {path}: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Why a single file was not moved.
#[derive(Debug, Error)]
pub enum MoveFailure {
    /// The source disappeared since indexing.
    #[error("file not found: {0}")]
    SourceMissing(PathBuf),

    /// Something already exists at the target path.
    #[error("target already exists: {to}")]
    TargetExists { from: PathBuf, to: PathBuf },

    /// Source and target are on different filesystems and copying is not
    /// allowed.
    #[error("cannot move {from} to {to}: different filesystems")]
    CrossDevice { from: PathBuf, to: PathBuf },

    /// The file is not below the index root.
    #[error("file is outside of the indexed root: {0}")]
    OutsideRoot(PathBuf),

    /// Rename or copy failed.
    #[error("cannot move {from} to {to}: {source}")]
    Io {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl MoveFailure {
    /// Source path of the failed move.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::SourceMissing(p) | Self::OutsideRoot(p) => p,
            Self::TargetExists { from, .. }
            | Self::CrossDevice { from, .. }
            | Self::Io { from, .. } => from,
        }
    }
}

/// A file that was moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedFile {
    /// Original path
    pub from: PathBuf,
    /// New path
    pub to: PathBuf,
    /// Size in bytes
    pub size: u64,
}

/// Outcome of a relocation run.
#[derive(Debug, Default)]
pub struct RelocationReport {
    /// Directory the files were moved under
    pub destination: PathBuf,
    /// Successfully moved files
    pub moved: Vec<MovedFile>,
    /// Files that stayed in place
    pub failures: Vec<MoveFailure>,
    /// Total bytes moved
    pub bytes_moved: u64,
    /// Set when a target directory could not be created mid-run
    pub aborted: Option<RelocateError>,
    /// Set when the run stopped on the shutdown flag
    pub interrupted: bool,
}

impl RelocationReport {
    /// Number of moved files.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.moved.len()
    }

    /// Number of files that could not be moved.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Whether every selected file was moved.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty() && self.aborted.is_none() && !self.interrupted
    }

    /// Human-readable summary of the operation.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Moved {} file(s) ({}) to {}",
            self.success_count(),
            format_size(self.bytes_moved),
            self.destination.display()
        );
        if !self.failures.is_empty() {
            summary.push_str(&format!(", {} failed", self.failure_count()));
        }
        if let Some(e) = &self.aborted {
            summary.push_str(&format!(", aborted: {}", e));
        }
        if self.interrupted {
            summary.push_str(", interrupted");
        }
        summary
    }
}

/// Configuration for relocation.
#[derive(Debug, Clone, Default)]
pub struct RelocateConfig {
    /// Copy then delete when a rename crosses filesystems.
    pub allow_copy_fallback: bool,
    /// Optional shutdown flag, checked between files.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
}

impl RelocateConfig {
    /// Allow the copy fallback for cross-device moves.
    #[must_use]
    pub fn with_copy_fallback(mut self, allow: bool) -> Self {
        self.allow_copy_fallback = allow;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Moves duplicates out of an index.
#[derive(Debug, Clone, Default)]
pub struct Relocator {
    config: RelocateConfig,
}

impl Relocator {
    /// Create a relocator.
    #[must_use]
    pub fn new(config: RelocateConfig) -> Self {
        Self { config }
    }

    /// Move the files selected by `scope` under `destination`.
    ///
    /// The destination is suffixed with the index root's name; without one,
    /// [`default_destination`] is used. Nothing touches the filesystem when
    /// there is nothing to move.
    ///
    /// # Errors
    ///
    /// Returns [`RelocateError::Destination`] if the destination directory
    /// cannot be created. Nothing is moved in that case.
    pub fn move_duplicates(
        &self,
        index: &mut FileIndex,
        scope: RelocationScope,
        destination: Option<&Path>,
    ) -> Result<RelocationReport, RelocateError> {
        let destination = resolve_destination(index, destination);
        let plan = move_plan(index, scope);

        let mut report = RelocationReport {
            destination: destination.clone(),
            ..Default::default()
        };

        if plan.is_empty() {
            log::info!("Nothing to move from {}", index.root().display());
            return Ok(report);
        }

        fs::create_dir_all(&destination).map_err(|e| RelocateError::Destination {
            path: destination.clone(),
            source: e,
        })?;

        log::info!(
            "Moving {} file(s) from {} to {}",
            plan.len(),
            index.root().display(),
            destination.display()
        );

        let mut moved_positions = Vec::new();
        for pos in plan {
            if self.config.is_shutdown_requested() {
                log::info!("Relocation interrupted by shutdown signal");
                report.interrupted = true;
                break;
            }

            let Some(record) = index.record(pos) else {
                continue;
            };
            let from = record.path().to_path_buf();
            let size = record.size();

            let Ok(relative) = from.strip_prefix(index.root()) else {
                log::warn!("Skipping {}: outside of {}", from.display(), index.root().display());
                report.failures.push(MoveFailure::OutsideRoot(from));
                continue;
            };
            let to = destination.join(relative);

            if let Some(parent) = to.parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    log::error!("Cannot create {}: {}", parent.display(), e);
                    report.aborted = Some(RelocateError::Destination {
                        path: parent.to_path_buf(),
                        source: e,
                    });
                    break;
                }
            }

            match self.move_file(&from, &to) {
                Ok(()) => {
                    log::debug!("Moved {} -> {}", from.display(), to.display());
                    report.bytes_moved += size;
                    report.moved.push(MovedFile { from, to, size });
                    moved_positions.push(pos);
                }
                Err(failure) => {
                    log::warn!("{}", failure);
                    report.failures.push(failure);
                }
            }
        }

        index.remove_positions(moved_positions);

        log::info!("{}", report.summary());
        Ok(report)
    }

    fn move_file(&self, from: &Path, to: &Path) -> Result<(), MoveFailure> {
        if fs::symlink_metadata(from).is_err() {
            return Err(MoveFailure::SourceMissing(from.to_path_buf()));
        }
        if fs::symlink_metadata(to).is_ok() {
            return Err(MoveFailure::TargetExists {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
            });
        }

        match fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(e) if is_cross_device_error(&e) => {
                if !self.config.allow_copy_fallback {
                    return Err(MoveFailure::CrossDevice {
                        from: from.to_path_buf(),
                        to: to.to_path_buf(),
                    });
                }
                log::debug!("Copying {} across filesystems", from.display());
                copy_then_remove(from, to).map_err(|source| MoveFailure::Io {
                    from: from.to_path_buf(),
                    to: to.to_path_buf(),
                    source,
                })
            }
            Err(source) => Err(MoveFailure::Io {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                source,
            }),
        }
    }
}

/// Positions to move for `scope`, in group order.
fn move_plan(index: &FileIndex, scope: RelocationScope) -> Vec<usize> {
    let mut plan = Vec::new();
    match scope {
        RelocationScope::Within => {
            for by_digest in index.duplicate_groups().values().rev() {
                for positions in by_digest.values() {
                    let paths: Vec<&Path> = positions
                        .iter()
                        .filter_map(|&pos| index.record(pos).map(|r| r.path()))
                        .collect();
                    let Some(survivor) = select_survivor(&paths) else {
                        continue;
                    };
                    plan.extend(
                        positions
                            .iter()
                            .enumerate()
                            .filter(|(i, _)| *i != survivor)
                            .map(|(_, &pos)| pos),
                    );
                }
            }
        }
        RelocationScope::AgainstOther => {
            for by_digest in index.cross_groups().values().rev() {
                for positions in by_digest.values() {
                    plan.extend_from_slice(positions);
                }
            }
        }
    }
    plan
}

/// Index of the member to keep: the shortest path in characters, first one
/// on ties.
#[must_use]
pub fn select_survivor(paths: &[&Path]) -> Option<usize> {
    paths
        .iter()
        .enumerate()
        .min_by_key(|(_, p)| p.to_string_lossy().chars().count())
        .map(|(i, _)| i)
}

/// Destination for an index: `explicit/<name>` or the default.
#[must_use]
pub fn resolve_destination(index: &FileIndex, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(dir) => dir.join(index.name()),
        None => default_destination(index.root(), &index.name()),
    }
}

/// `<root>/dups/<name>` for a mount point, else `<parent>/dups/<name>`.
#[must_use]
pub fn default_destination(root: &Path, name: &str) -> PathBuf {
    let base = if is_mount_point(root) {
        root
    } else {
        root.parent().unwrap_or(root)
    };
    base.join(DUPS_DIR_NAME).join(name)
}

/// Whether `path` is the top of a filesystem.
#[cfg(unix)]
#[must_use]
pub fn is_mount_point(path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    let Some(parent) = path.parent() else {
        return true;
    };
    match (fs::metadata(path), fs::metadata(parent)) {
        (Ok(own), Ok(up)) => own.dev() != up.dev() || own.ino() == up.ino(),
        _ => false,
    }
}

/// Whether `path` is the top of a filesystem.
#[cfg(not(unix))]
#[must_use]
pub fn is_mount_point(path: &Path) -> bool {
    path.parent().is_none()
}

/// Whether a rename failed because source and target are on different
/// devices (EXDEV / ERROR_NOT_SAME_DEVICE).
fn is_cross_device_error(err: &io::Error) -> bool {
    #[cfg(unix)]
    const CROSS_DEVICE: i32 = 18;
    #[cfg(not(unix))]
    const CROSS_DEVICE: i32 = 17;

    err.raw_os_error() == Some(CROSS_DEVICE)
}

fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    match fs::copy(from, to) {
        Ok(_) => {
            fs::File::open(to)?.sync_all()?;
            fs::remove_file(from)
        }
        Err(e) => {
            let _ = fs::remove_file(to);
            Err(e)
        }
    }
}
