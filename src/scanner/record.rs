//! A single file and its memoized digests.

use std::fmt;
use std::path::{Path, PathBuf};

use super::{Digest, HashError, Hasher};
use crate::output::format_size;

/// One file's identity plus lazily computed digests.
///
/// Each digest is computed at most once per record. A failed computation
/// leaves the slot empty so the next request retries the I/O.
#[derive(Debug, Clone)]
pub struct FileRecord {
    path: PathBuf,
    size: u64,
    header_hash: Option<Digest>,
    full_hash: Option<Digest>,
}

impl FileRecord {
    /// Create a record with no digests computed yet.
    #[must_use]
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self {
            path,
            size,
            header_hash: None,
            full_hash: None,
        }
    }

    /// Path of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size in bytes as read at construction.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Header digest, computing it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be read. Nothing is cached.
    pub fn header_hash(&mut self, hasher: &Hasher) -> Result<&Digest, HashError> {
        let digest = match self.header_hash.take() {
            Some(digest) => digest,
            None => hasher.header_digest(&self.path)?,
        };
        Ok(self.header_hash.insert(digest))
    }

    /// Full content digest, computing it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be read. Nothing is cached.
    pub fn full_hash(&mut self, hasher: &Hasher) -> Result<&Digest, HashError> {
        let digest = match self.full_hash.take() {
            Some(digest) => digest,
            None => hasher.full_digest(&self.path)?,
        };
        Ok(self.full_hash.insert(digest))
    }

    /// Header digest if already computed.
    #[must_use]
    pub fn cached_header_hash(&self) -> Option<&Digest> {
        self.header_hash.as_ref()
    }

    /// Full digest if already computed.
    #[must_use]
    pub fn cached_full_hash(&self) -> Option<&Digest> {
        self.full_hash.as_ref()
    }

    /// Store a header digest computed elsewhere (e.g. on a worker thread).
    pub(crate) fn set_header_hash(&mut self, digest: Digest) {
        self.header_hash.get_or_insert(digest);
    }

    /// Store a full digest computed elsewhere.
    pub(crate) fn set_full_hash(&mut self, digest: Digest) {
        self.full_hash.get_or_insert(digest);
    }
}

impl fmt::Display for FileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} size: {}", self.path.display(), format_size(self.size))
    }
}
