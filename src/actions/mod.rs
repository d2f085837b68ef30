//! File actions module.
//!
//! This module provides functionality for:
//! - Moving redundant copies out of an indexed tree ([`relocate`])
//!
//! # Relocation
//!
//! Relocation never deletes anything. Selected files are renamed into a
//! destination directory, keeping their path relative to the index root,
//! and the index is compacted afterwards.
//!
//! ```no_run
//! use dupfind::actions::{default_destination, select_survivor};
//! use std::path::Path;
//!
//! let keep = select_survivor(&[Path::new("/a/bb/f"), Path::new("/a/f")]);
//! assert_eq!(keep, Some(1));
//! println!("{}", default_destination(Path::new("/data/photos"), "photos").display());
//! ```

pub mod relocate;

// Re-export commonly used types
pub use relocate::{
    default_destination, is_mount_point, resolve_destination, select_survivor, MoveFailure,
    MovedFile, RelocateConfig, RelocateError, RelocationReport, RelocationScope, Relocator,
    DUPS_DIR_NAME,
};
