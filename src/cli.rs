//! Command-line interface definitions for dupfind.
//!
//! ```bash
//! # Find duplicates under ~/Downloads
//! dupfind scan ~/Downloads
//!
//! # Only the ten largest candidate sizes, moving the extra copies away
//! dupfind scan ~/Downloads --limit 10 --move
//!
//! # Files of ~/inbox that already exist in ~/archive
//! dupfind compare ~/inbox ~/archive --move-ours --output json
//! ```

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};

use crate::config::Config;
use crate::scanner::HashAlgorithm;

/// Staged duplicate file finder.
///
/// Files are narrowed down by size, then by a digest of their first bytes,
/// then by a digest of their whole content.
#[derive(Debug, Parser)]
#[command(name = "dupfind")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Find duplicate files within one directory tree
    Scan(ScanArgs),
    /// Find files of one tree that also exist in another
    Compare(CompareArgs),
    /// Print the effective configuration as TOML
    ShowConfig(ShowConfigArgs),
}

/// Arguments for the show-config subcommand.
#[derive(Debug, Args)]
pub struct ShowConfigArgs {
    /// Also write it to the file given by --config, or the default location
    #[arg(long)]
    pub save: bool,
}

/// Options shared by every hashing command.
#[derive(Debug, Args)]
pub struct StageArgs {
    /// Only examine the N largest candidate sizes
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// Smallest size hashed by the header stage (e.g., 64KiB, 1MiB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub header_min_size: Option<u64>,

    /// Digest algorithm: blake3 or sha256
    #[arg(long = "hash", value_name = "NAME")]
    pub hash_algorithm: Option<HashAlgorithm>,

    /// Number of I/O threads for hashing
    ///
    /// Lower values reduce disk thrashing on HDDs.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub io_threads: Option<u16>,

    /// Only index files directly inside the root(s)
    #[arg(long)]
    pub no_recursive: bool,

    /// Copy then delete when a move crosses filesystems
    #[arg(long)]
    pub copy_fallback: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

impl StageArgs {
    /// Overlay the flags that were given on top of `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(min) = self.header_min_size {
            config.header_min_size = min;
        }
        if let Some(algorithm) = self.hash_algorithm {
            config.hash_algorithm = algorithm;
        }
        if let Some(threads) = self.io_threads {
            config.io_threads = usize::from(threads);
        }
        if self.no_recursive {
            config.recursive = false;
        }
        if self.copy_fallback {
            config.allow_copy_fallback = true;
        }
    }
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory to search for duplicates
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    #[command(flatten)]
    pub stage: StageArgs,

    /// Only report sizes strictly greater than SIZE
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Only report sizes strictly smaller than SIZE
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub max_size: Option<u64>,

    /// Byte-compare files after their digests matched
    #[arg(long)]
    pub paranoid: bool,

    /// Move every copy but the one with the shortest path out of the tree
    #[arg(long = "move")]
    pub move_duplicates: bool,

    /// Directory receiving moved files (default: `<parent>/dups/<name>`)
    #[arg(long, value_name = "PATH", requires = "move_duplicates")]
    pub dest: Option<PathBuf>,
}

/// Arguments for the compare subcommand.
#[derive(Debug, Args)]
#[command(group(ArgGroup::new("relocation").args(["move_ours", "move_theirs"])))]
pub struct CompareArgs {
    /// First directory
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Second directory; must not overlap the first
    #[arg(value_name = "OTHER")]
    pub other: PathBuf,

    #[command(flatten)]
    pub stage: StageArgs,

    /// Move the shared files out of ROOT
    #[arg(long)]
    pub move_ours: bool,

    /// Move the shared files out of OTHER
    #[arg(long)]
    pub move_theirs: bool,

    /// Directory receiving moved files (default: `<parent>/dups/<name>`)
    #[arg(long, value_name = "PATH", requires = "relocation")]
    pub dest: Option<PathBuf>,
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable listing and summary
    Text,
    /// JSON document for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// ```
/// use dupfind::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
/// ```
///
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }
    if s.starts_with('-') {
        return Err("Size cannot be negative".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_suffixes() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("1024B").unwrap(), 1024);
        assert_eq!(parse_size("1KB").unwrap(), 1_000);
        assert_eq!(parse_size("1kib").unwrap(), 1_024);
        assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
        assert_eq!(parse_size("1GiB").unwrap(), 1_073_741_824);
        assert_eq!(parse_size("1TiB").unwrap(), 1_099_511_627_776);
    }

    #[test]
    fn test_parse_size_fractional_and_whitespace() {
        assert_eq!(parse_size("1.5MB").unwrap(), 1_500_000);
        assert_eq!(parse_size("  1 MB ").unwrap(), 1_000_000);
    }

    #[test]
    fn test_parse_size_errors() {
        assert!(parse_size("").is_err());
        assert!(parse_size("abc").is_err());
        assert!(parse_size("1XB").is_err());
        assert!(parse_size("-1MB").is_err());
    }

    #[test]
    fn test_cli_parse_scan_basic() {
        let cli = Cli::try_parse_from(["dupfind", "scan", "/some/path"]).unwrap();
        assert_eq!(cli.verbose, 0);
        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.root, PathBuf::from("/some/path"));
                assert_eq!(args.stage.output, OutputFormat::Text);
                assert!(!args.move_duplicates);
                assert_eq!(args.stage.limit, None);
            }
            _ => panic!("Expected Scan command"),
        }
    }

    #[test]
    fn test_cli_parse_scan_with_options() {
        let cli = Cli::try_parse_from([
            "dupfind",
            "-v",
            "scan",
            "/path",
            "--limit",
            "3",
            "--header-min-size",
            "64KiB",
            "--min-size",
            "1KB",
            "--max-size",
            "1GB",
            "--hash",
            "sha256",
            "--io-threads",
            "2",
            "--output",
            "json",
            "--move",
            "--dest",
            "/tmp/out",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        let Commands::Scan(args) = cli.command else {
            panic!("Expected Scan command");
        };
        assert_eq!(args.stage.limit, Some(3));
        assert_eq!(args.stage.header_min_size, Some(65_536));
        assert_eq!(args.min_size, Some(1_000));
        assert_eq!(args.max_size, Some(1_000_000_000));
        assert_eq!(args.stage.hash_algorithm, Some(HashAlgorithm::Sha256));
        assert_eq!(args.stage.io_threads, Some(2));
        assert_eq!(args.stage.output, OutputFormat::Json);
        assert!(args.move_duplicates);
        assert_eq!(args.dest, Some(PathBuf::from("/tmp/out")));
    }

    #[test]
    fn test_cli_dest_requires_move() {
        assert!(Cli::try_parse_from(["dupfind", "scan", "/p", "--dest", "/d"]).is_err());
        assert!(Cli::try_parse_from(["dupfind", "compare", "/a", "/b", "--dest", "/d"]).is_err());
    }

    #[test]
    fn test_cli_rejects_unknown_hash_and_zero_threads() {
        assert!(Cli::try_parse_from(["dupfind", "scan", "/p", "--hash", "md5"]).is_err());
        assert!(Cli::try_parse_from(["dupfind", "scan", "/p", "--io-threads", "0"]).is_err());
    }

    #[test]
    fn test_cli_compare_move_sides_conflict() {
        let result = Cli::try_parse_from([
            "dupfind",
            "compare",
            "/a",
            "/b",
            "--move-ours",
            "--move-theirs",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_compare() {
        let cli = Cli::try_parse_from([
            "dupfind",
            "--config",
            "/etc/dupfind.toml",
            "compare",
            "/a",
            "/b",
            "--move-theirs",
            "--dest",
            "/d",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/dupfind.toml")));
        let Commands::Compare(args) = cli.command else {
            panic!("Expected Compare command");
        };
        assert_eq!(args.root, PathBuf::from("/a"));
        assert_eq!(args.other, PathBuf::from("/b"));
        assert!(!args.move_ours);
        assert!(args.move_theirs);
        assert_eq!(args.dest, Some(PathBuf::from("/d")));
    }

    #[test]
    fn test_cli_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["dupfind", "-v", "-q", "scan", "/path"]).is_err());
    }

    #[test]
    fn test_stage_args_apply_only_given_flags() {
        let cli = Cli::try_parse_from(["dupfind", "scan", "/p", "--no-recursive", "--hash", "sha256"])
            .unwrap();
        let Commands::Scan(args) = cli.command else {
            panic!("Expected Scan command");
        };
        let mut config = Config {
            io_threads: 7,
            ..Config::default()
        };
        args.stage.apply(&mut config);

        assert!(!config.recursive);
        assert_eq!(config.hash_algorithm, HashAlgorithm::Sha256);
        assert_eq!(config.io_threads, 7);
        assert_eq!(config.header_min_size, Config::default().header_min_size);
    }
}
