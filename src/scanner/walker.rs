//! Directory walker implementation using jwalk.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct that enumerates the regular
//! files under a root, either recursively or one level deep, and yields
//! `(path, size)` pairs. Directories never become entries.
//!
//! Enumeration failures are yielded as [`ScanError`] values rather than
//! stopping iteration, so a single unreadable directory only removes its own
//! files from the result.
//!
//! # Example
//!
//! ```no_run
//! use dupfind::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig::default().with_recursive(false);
//! let walker = Walker::new(Path::new("/home/user/Downloads"), config);
//! let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
//! println!("Found {} files", files.len());
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jwalk::WalkDir;

use super::{ScanError, WalkerConfig};

/// Directory walker for file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, the walker stops yielding entries.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Walk the directory tree, yielding `(path, size)` for each regular file.
    ///
    /// Children are sorted by file name so the order is deterministic.
    pub fn walk(&self) -> impl Iterator<Item = Result<(PathBuf, u64), ScanError>> + '_ {
        let mut walk_dir = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .skip_hidden(self.config.skip_hidden)
            .sort(true);

        if !self.config.recursive {
            walk_dir = walk_dir.max_depth(1);
        }

        walk_dir
            .into_iter()
            .map_while(move |entry_result| {
                if self.is_shutdown_requested() {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                    return None;
                }
                Some(entry_result)
            })
            .filter_map(move |entry_result| self.process_entry(entry_result))
    }

    /// Convert one jwalk result into a file entry, an error, or nothing.
    fn process_entry(
        &self,
        entry_result: Result<jwalk::DirEntry<((), ())>, jwalk::Error>,
    ) -> Option<Result<(PathBuf, u64), ScanError>> {
        match entry_result {
            Ok(entry) => {
                let path = entry.path();

                // Skip the root directory itself
                if path == self.root {
                    return None;
                }

                let file_type = entry.file_type();
                if file_type.is_dir() {
                    return None;
                }

                if file_type.is_symlink() && !self.config.follow_symlinks {
                    log::trace!("Skipping symlink: {}", path.display());
                    return None;
                }

                let metadata = if self.config.follow_symlinks {
                    std::fs::metadata(&path)
                } else {
                    std::fs::symlink_metadata(&path)
                };

                match metadata {
                    Ok(m) if m.is_file() => Some(Ok((path, m.len()))),
                    Ok(_) => None,
                    Err(e) => {
                        log::warn!("Cannot stat {}: {}", path.display(), e);
                        Some(Err(ScanError::from_io(path, e)))
                    }
                }
            }
            Err(e) => {
                let path = e
                    .path()
                    .map_or_else(|| self.root.clone(), std::borrow::ToOwned::to_owned);
                log::warn!("Cannot read {}: {}", path.display(), e);
                let kind = e.io_error().map_or(io::ErrorKind::Other, io::Error::kind);
                Some(Err(ScanError::from_io(
                    path,
                    io::Error::new(kind, e.to_string()),
                )))
            }
        }
    }
}
