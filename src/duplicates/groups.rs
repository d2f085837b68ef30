//! Duplicate group views and byte accounting.
//!
//! # Overview
//!
//! Stage caches store groups as positions into a [`FileIndex`](super::FileIndex).
//! This module turns them into owned, serializable [`DuplicateGroup`] values
//! for reporting, and provides the counting helpers used by stage summaries.
//!
//! # Example
//!
//! ```
//! use dupfind::duplicates::{DuplicateGroup, GroupMember};
//! use dupfind::scanner::Digest;
//! use std::path::PathBuf;
//!
//! let group = DuplicateGroup::new(
//!     Digest::from_hex("ab12"),
//!     1024,
//!     vec![
//!         GroupMember::new(PathBuf::from("/a.bin"), 1024),
//!         GroupMember::new(PathBuf::from("/b.bin"), 1024),
//!         GroupMember::new(PathBuf::from("/c.bin"), 1024),
//!     ],
//! );
//!
//! assert_eq!(group.duplicate_count(), 2);
//! assert_eq!(group.wasted_space(), 2048);
//! ```

use std::path::PathBuf;

use serde::Serialize;

use super::index::HashGroups;
use crate::scanner::Digest;

/// One file inside a group view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupMember {
    /// Path of the file
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
}

impl GroupMember {
    /// Create a group member.
    #[must_use]
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self { path, size }
    }
}

/// Files sharing a size and a digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    /// Digest shared by every member
    pub hash: Digest,
    /// File size in bytes, shared by every member
    pub size: u64,
    /// Members in index order
    pub files: Vec<GroupMember>,
}

impl DuplicateGroup {
    /// Create a new duplicate group.
    #[must_use]
    pub fn new(hash: Digest, size: u64, files: Vec<GroupMember>) -> Self {
        Self { hash, size, files }
    }

    /// Number of files in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of redundant copies (all members but one).
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.files.len().saturating_sub(1)
    }

    /// Bytes freed by keeping a single copy.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.duplicate_count() as u64 * self.size
    }

    /// Bytes occupied by every member.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files.len() as u64 * self.size
    }

    /// Paths of the members.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }
}

/// Number of files across all groups.
#[must_use]
pub fn count_items(groups: &HashGroups) -> usize {
    groups
        .values()
        .flat_map(|by_digest| by_digest.values())
        .map(Vec::len)
        .sum()
}

/// Bytes occupied by every grouped file.
#[must_use]
pub fn count_size(groups: &HashGroups) -> u64 {
    groups
        .iter()
        .flat_map(|(&size, by_digest)| by_digest.values().map(move |p| p.len() as u64 * size))
        .sum()
}

/// Bytes freed by keeping one file per group.
#[must_use]
pub fn reclaimable_size(groups: &HashGroups) -> u64 {
    groups
        .iter()
        .flat_map(|(&size, by_digest)| {
            by_digest
                .values()
                .map(move |p| (p.len() as u64).saturating_sub(1) * size)
        })
        .sum()
}
