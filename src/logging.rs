//! Logging setup for dupfind.
//!
//! Library code logs through the `log` facade only; the binary installs an
//! `env_logger` backend once at startup. Levels are chosen by (in priority
//! order):
//!
//! 1. `RUST_LOG`, when set
//! 2. `--quiet` (errors only) or `-v`/`-vv` (debug/trace)
//! 3. Default: info
//!
//! Stage summaries are logged at info, per-group details at debug and
//! per-file digests at trace.
//!
//! # Example
//!
//! ```rust,no_run
//! use dupfind::logging::init_logging;
//!
//! init_logging(1, false);
//! log::debug!("visible with -v");
//! ```

use std::env;
use std::io::Write;

use env_logger::Builder;
use log::LevelFilter;

/// Initialize the logging backend from CLI verbosity flags.
///
/// Calling it a second time is harmless: the later call is ignored.
pub fn init_logging(verbose: u8, quiet: bool) {
    let mut builder = Builder::new();

    let from_env = env::var("RUST_LOG").is_ok();
    if from_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }

    let with_module = verbose >= 1;
    builder.format(move |buf, record| {
        let level = record.level();
        let style = buf.default_level_style(level);
        if with_module {
            writeln!(
                buf,
                "{} {style}{:<5}{style:#} [{}] {}",
                buf.timestamp_seconds(),
                level,
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        } else {
            writeln!(buf, "{style}{:<5}{style:#} {}", level, record.args())
        }
    });

    if builder.try_init().is_ok() {
        if from_env {
            log::debug!("Logging configured from RUST_LOG");
        } else {
            log::debug!("Logging initialized at level {}", log::max_level());
        }
    }
}

/// Map the CLI flags to a level filter. `quiet` wins over `verbose`.
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determine_level_default() {
        assert_eq!(determine_level(0, false), LevelFilter::Info);
    }

    #[test]
    fn test_determine_level_verbose() {
        assert_eq!(determine_level(1, false), LevelFilter::Debug);
        assert_eq!(determine_level(2, false), LevelFilter::Trace);
        assert_eq!(determine_level(5, false), LevelFilter::Trace);
    }

    #[test]
    fn test_determine_level_quiet_overrides_verbose() {
        assert_eq!(determine_level(0, true), LevelFilter::Error);
        assert_eq!(determine_level(2, true), LevelFilter::Error);
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init_logging(0, true);
        init_logging(2, false);
    }
}
