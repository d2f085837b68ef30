//! Layered configuration.
//!
//! Values are merged in order, later sources winning:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. A TOML file: `--config PATH`, or `config.toml` in the platform config
//!    directory (`~/.config/dupfind` on Linux)
//! 3. `DUPFIND_*` environment variables, e.g. `DUPFIND_IO_THREADS=8`
//! 4. Command-line flags, applied by the application
//!
//! ```toml
//! hash_algorithm = "sha256"
//! header_min_size = 4194304
//! io_threads = 2
//! paranoid = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::actions::RelocateConfig;
use crate::duplicates::{StageConfig, DEFAULT_HEADER_MIN_SIZE};
use crate::scanner::{
    HashAlgorithm, Hasher, WalkerConfig, DEFAULT_CHUNK_SIZE, DEFAULT_HEADER_SIZE,
};

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "DUPFIND_";

/// Errors raised while loading or saving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A source could not be parsed or had a value of the wrong type.
    #[error("invalid configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// A value parsed but is out of range.
    #[error("invalid configuration value for `{field}`: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// The configuration could not be serialized to TOML.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Reading or writing the file failed.
    #[error("failed to write configuration to {path}: {source}")]
    Io {
        /// File being written.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Digest used by the header and full stages.
    pub hash_algorithm: HashAlgorithm,
    /// Bytes read for a header digest.
    pub header_size: usize,
    /// Read buffer for full digests.
    pub chunk_size: usize,
    /// Files smaller than this skip the header stage.
    pub header_min_size: u64,
    /// Hashing threads per stage.
    pub io_threads: usize,
    /// Byte-compare files after their full digests matched.
    pub paranoid: bool,
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Copy then delete when a move crosses filesystems.
    pub allow_copy_fallback: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hash_algorithm: HashAlgorithm::Blake3,
            header_size: DEFAULT_HEADER_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            header_min_size: DEFAULT_HEADER_MIN_SIZE,
            io_threads: 4,
            paranoid: false,
            recursive: true,
            allow_copy_fallback: false,
        }
    }
}

impl Config {
    /// Platform-specific location of `config.toml`, if a home directory exists.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "dupfind").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load defaults, the config file and `DUPFIND_*` variables.
    ///
    /// With `path` set, that file is used instead of the default location.
    /// A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a source does not parse or a value is out
    /// of range.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = path.map(Path::to_path_buf).or_else(Self::default_path);
        Self::figment(file.as_deref())
            .extract::<Self>()
            .map_err(Box::new)?
            .validated()
    }

    fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            log::debug!("Reading configuration from {}", file.display());
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn validated(self) -> Result<Self, ConfigError> {
        let invalid = |field, reason| Err(ConfigError::Invalid { field, reason });
        if self.header_size == 0 {
            return invalid("header_size", "must be greater than zero");
        }
        if self.chunk_size == 0 {
            return invalid("chunk_size", "must be greater than zero");
        }
        if self.io_threads == 0 {
            return invalid("io_threads", "must be at least 1");
        }
        Ok(self)
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] on serializer failure.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write as TOML to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if serialization or writing fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, self.to_toml()?).map_err(io_err)
    }

    /// Hasher for the configured algorithm and buffer sizes.
    #[must_use]
    pub fn hasher(&self) -> Hasher {
        Hasher::new()
            .with_algorithm(self.hash_algorithm)
            .with_header_size(self.header_size)
            .with_chunk_size(self.chunk_size)
    }

    /// Stage configuration without shutdown flag or progress callback.
    #[must_use]
    pub fn stage_config(&self) -> StageConfig {
        StageConfig::default()
            .with_hasher(self.hasher())
            .with_io_threads(self.io_threads)
            .with_paranoid(self.paranoid)
    }

    /// Walker configuration.
    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig::default().with_recursive(self.recursive)
    }

    /// Relocation configuration without shutdown flag.
    #[must_use]
    pub fn relocate_config(&self) -> RelocateConfig {
        RelocateConfig::default().with_copy_fallback(self.allow_copy_fallback)
    }
}
