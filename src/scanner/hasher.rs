//! Content hashing with a named, pluggable digest.
//!
//! # Overview
//!
//! [`Hasher`] computes two kinds of digests for a file:
//! - a **header** digest over the first `header_size` bytes (default 32 KiB),
//!   used as a cheap filter between same-size files
//! - a **full** digest over the whole content, streamed in `chunk_size`
//!   chunks (default 64 KiB)
//!
//! Bytes are obtained through a [`FileSource`], which by default opens files
//! from the local filesystem ([`FsSource`]). Tests swap in a source that
//! counts reads.
//!
//! # Example
//!
//! ```no_run
//! use dupfind::scanner::{HashAlgorithm, Hasher};
//! use std::path::Path;
//!
//! let hasher = Hasher::new().with_algorithm(HashAlgorithm::Sha256);
//! let digest = hasher.full_digest(Path::new("some_file.bin")).unwrap();
//! println!("{}", digest);
//! ```

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::HashError;

/// Bytes read for the header digest.
pub const DEFAULT_HEADER_SIZE: usize = 32 * 1024;

/// Read buffer size when streaming a full digest.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Hex encoded digest value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// Wrap an already hex-encoded digest.
    #[must_use]
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Hex string of the digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Digest algorithms selectable by name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// BLAKE3, 256-bit output.
    #[default]
    Blake3,
    /// SHA-256.
    Sha256,
}

impl HashAlgorithm {
    /// Name used in configuration and on the command line.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Blake3 => "blake3",
            Self::Sha256 => "sha256",
        }
    }

    fn state(self) -> DigestState {
        match self {
            Self::Blake3 => DigestState::Blake3(Box::new(blake3::Hasher::new())),
            Self::Sha256 => DigestState::Sha256(<sha2::Sha256 as sha2::Digest>::new()),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blake3" => Ok(Self::Blake3),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            other => Err(format!(
                "unknown hash algorithm '{}', expected one of: blake3, sha256",
                other
            )),
        }
    }
}

enum DigestState {
    Blake3(Box<blake3::Hasher>),
    Sha256(sha2::Sha256),
}

impl DigestState {
    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Blake3(h) => {
                h.update(data);
            }
            Self::Sha256(h) => sha2::Digest::update(h, data),
        }
    }

    fn finalize(self) -> Digest {
        match self {
            Self::Blake3(h) => Digest(h.finalize().to_hex().to_string()),
            Self::Sha256(h) => Digest(format!("{:x}", sha2::Digest::finalize(h))),
        }
    }
}

/// Source of file bytes, one reader per path.
pub trait FileSource: Send + Sync {
    /// Open a reader positioned at the start of `path`.
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;
}

/// Reads files straight from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSource;

impl FileSource for FsSource {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(path)?))
    }
}

/// Computes header and full digests for files.
#[derive(Clone)]
pub struct Hasher {
    algorithm: HashAlgorithm,
    header_size: usize,
    chunk_size: usize,
    source: Arc<dyn FileSource>,
}

impl fmt::Debug for Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hasher")
            .field("algorithm", &self.algorithm)
            .field("header_size", &self.header_size)
            .field("chunk_size", &self.chunk_size)
            .field("source", &"<source>")
            .finish()
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a BLAKE3 hasher reading from the filesystem with default sizes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            algorithm: HashAlgorithm::default(),
            header_size: DEFAULT_HEADER_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            source: Arc::new(FsSource),
        }
    }

    /// Select the digest algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set how many leading bytes the header digest covers.
    #[must_use]
    pub fn with_header_size(mut self, size: usize) -> Self {
        self.header_size = size.max(1);
        self
    }

    /// Set the streaming buffer size for full digests.
    #[must_use]
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Replace the byte source.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn FileSource>) -> Self {
        self.source = source;
        self
    }

    /// Configured algorithm.
    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Configured header size in bytes.
    #[must_use]
    pub fn header_size(&self) -> usize {
        self.header_size
    }

    /// Configured chunk size in bytes.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Digest of the first `header_size` bytes of `path`.
    ///
    /// Files shorter than the header size are digested whole, so for them the
    /// header digest equals the full digest.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn header_digest(&self, path: &Path) -> Result<Digest, HashError> {
        let reader = self.open(path)?;
        let mut buffer = Vec::with_capacity(self.header_size);
        reader
            .take(self.header_size as u64)
            .read_to_end(&mut buffer)
            .map_err(|e| HashError::from_io(path.to_path_buf(), e))?;

        let mut state = self.algorithm.state();
        state.update(&buffer);
        Ok(state.finalize())
    }

    /// Digest of the entire content of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn full_digest(&self, path: &Path) -> Result<Digest, HashError> {
        let mut reader = self.open(path)?;
        let mut state = self.algorithm.state();
        let mut buffer = vec![0u8; self.chunk_size];

        loop {
            let n = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path.to_path_buf(), e)),
            };
            state.update(&buffer[..n]);
        }

        Ok(state.finalize())
    }

    /// Compare two files byte by byte.
    ///
    /// Used by paranoid verification after digests already matched.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] for whichever file fails to open or read.
    pub fn contents_equal(&self, a: &Path, b: &Path) -> Result<bool, HashError> {
        let mut left = self.open(a)?;
        let mut right = self.open(b)?;
        let mut buf_left = vec![0u8; self.chunk_size];
        let mut buf_right = vec![0u8; self.chunk_size];

        loop {
            let n_left = read_full(&mut left, &mut buf_left)
                .map_err(|e| HashError::from_io(a.to_path_buf(), e))?;
            let n_right = read_full(&mut right, &mut buf_right)
                .map_err(|e| HashError::from_io(b.to_path_buf(), e))?;

            if n_left != n_right || buf_left[..n_left] != buf_right[..n_right] {
                return Ok(false);
            }
            if n_left == 0 {
                return Ok(true);
            }
        }
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Read + Send>, HashError> {
        self.source
            .open(path)
            .map_err(|e| HashError::from_io(path.to_path_buf(), e))
    }
}

/// Fill `buf` as far as the reader allows, returning bytes read.
fn read_full(reader: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!("blake3".parse::<HashAlgorithm>(), Ok(HashAlgorithm::Blake3));
        assert_eq!("SHA256".parse::<HashAlgorithm>(), Ok(HashAlgorithm::Sha256));
        assert!("md4".parse::<HashAlgorithm>().is_err());
    }

    #[test]
    fn test_digest_is_fixed_length_hex() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.bin", b"hello");

        for algorithm in [HashAlgorithm::Blake3, HashAlgorithm::Sha256] {
            let digest = Hasher::new()
                .with_algorithm(algorithm)
                .full_digest(&path)
                .unwrap();
            assert_eq!(digest.as_str().len(), 64);
            assert!(digest.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_sha256_known_value() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "abc.txt", b"abc");

        let digest = Hasher::new()
            .with_algorithm(HashAlgorithm::Sha256)
            .full_digest(&path)
            .unwrap();
        assert_eq!(
            digest.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_header_equals_full_for_small_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "small.txt", b"short content");

        let hasher = Hasher::new();
        assert_eq!(
            hasher.header_digest(&path).unwrap(),
            hasher.full_digest(&path).unwrap()
        );
    }

    #[test]
    fn test_header_ignores_tail() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.bin", b"same-header-AAAA");
        let b = write(&dir, "b.bin", b"same-header-BBBB");

        let hasher = Hasher::new().with_header_size(12);
        assert_eq!(
            hasher.header_digest(&a).unwrap(),
            hasher.header_digest(&b).unwrap()
        );
        assert_ne!(
            hasher.full_digest(&a).unwrap(),
            hasher.full_digest(&b).unwrap()
        );
    }

    #[test]
    fn test_chunk_size_does_not_change_digest() {
        let dir = TempDir::new().unwrap();
        let content: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let path = write(&dir, "big.bin", &content);

        let small = Hasher::new().with_chunk_size(7).full_digest(&path).unwrap();
        let large = Hasher::new().full_digest(&path).unwrap();
        assert_eq!(small, large);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = Hasher::new()
            .full_digest(&dir.path().join("missing"))
            .unwrap_err();
        assert!(matches!(err, HashError::NotFound(_)));
    }

    #[test]
    fn test_contents_equal() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a", b"0123456789");
        let b = write(&dir, "b", b"0123456789");
        let c = write(&dir, "c", b"0123456780");

        let hasher = Hasher::new().with_chunk_size(3);
        assert!(hasher.contents_equal(&a, &b).unwrap());
        assert!(!hasher.contents_equal(&a, &c).unwrap());
    }
}
