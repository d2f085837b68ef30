//! Scanner module for directory traversal and file hashing.
//!
//! This module provides functionality for:
//! - Directory walking using jwalk (recursive or single level)
//! - Header and full content hashing with a named digest
//! - Per-file records with memoized digests
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`hasher`]: Digest algorithms and the [`FileSource`] reader seam
//! - [`record`]: [`FileRecord`], one file plus its cached digests
//!
//! # Example
//!
//! ```no_run
//! use dupfind::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("."), WalkerConfig::default());
//! for entry in walker.walk() {
//!     match entry {
//!         Ok((path, size)) => println!("{}: {} bytes", path.display(), size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod record;
pub mod walker;

use std::path::PathBuf;
use std::sync::Arc;

// Re-export main types
pub use hasher::{
    Digest, FileSource, FsSource, HashAlgorithm, Hasher, DEFAULT_CHUNK_SIZE, DEFAULT_HEADER_SIZE,
};
pub use record::FileRecord;
pub use walker::Walker;

/// Configuration for directory walking.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Descend into subdirectories.
    pub recursive: bool,

    /// Follow symbolic links during traversal.
    /// Warning: May cause infinite loops with symlink cycles.
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            follow_symlinks: false,
            skip_hidden: false,
        }
    }
}

impl WalkerConfig {
    /// Set whether subdirectories are walked.
    #[must_use]
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl ScanError {
    /// Classify an I/O error for a path.
    #[must_use]
    pub fn from_io(path: PathBuf, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            _ => Self::Io {
                path,
                source: Arc::new(err),
            },
        }
    }

    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::PermissionDenied(p) | Self::NotFound(p) | Self::NotADirectory(p) => p,
            Self::Io { path, .. } => path,
        }
    }
}

/// Errors that can occur during file hashing.
///
/// A failed hash is never cached, so retrying the same record performs I/O again.
#[derive(thiserror::Error, Debug, Clone)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl HashError {
    /// Classify an I/O error for a path.
    #[must_use]
    pub fn from_io(path: PathBuf, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            _ => Self::Io {
                path,
                source: Arc::new(err),
            },
        }
    }

    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::NotFound(p) | Self::PermissionDenied(p) => p,
            Self::Io { path, .. } => path,
        }
    }
}
