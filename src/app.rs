//! Command dispatch for the `dupfind` binary.
//!
//! Library errors surface here as `anyhow` errors with path context.
//! Interruption propagates as [`StageError::Interrupted`], which the binary
//! maps to exit code 130.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};

use crate::actions::{RelocationReport, RelocationScope, Relocator};
use crate::cli::{Cli, Commands, CompareArgs, OutputFormat, ScanArgs};
use crate::config::Config;
use crate::duplicates::{
    CrossMatcher, FileIndex, FullStageOptions, HeaderStageOptions, Side, StageConfig, StageError,
};
use crate::error::ExitCode;
use crate::logging::init_logging;
use crate::output::{
    CompareSummary, CompareTextOutput, JsonCompareOutput, JsonOutput, ScanSummary, TextOutput,
};
use crate::progress::Progress;
use crate::signal::{install_handler, ShutdownHandler};

/// Run a parsed command line.
///
/// # Errors
///
/// Returns an error if configuration is invalid, a root cannot be indexed,
/// the roots of a comparison overlap, the destination cannot be created, or
/// the run was interrupted.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    init_logging(cli.verbose, cli.quiet);
    let shutdown = install_handler().context("cannot install Ctrl+C handler")?;

    let config = Config::load(cli.config.as_deref()).context("cannot load configuration")?;
    log::debug!("Effective configuration: {:?}", config);

    match cli.command {
        Commands::Scan(args) => run_scan(&args, config, &shutdown, cli.quiet),
        Commands::Compare(args) => run_compare(&args, config, &shutdown, cli.quiet),
        Commands::ShowConfig(args) => {
            print!("{}", config.to_toml()?);
            if args.save {
                let path = cli
                    .config
                    .or_else(Config::default_path)
                    .context("no configuration directory; pass --config")?;
                config.save(&path)?;
                log::info!("Configuration written to {}", path.display());
            }
            Ok(ExitCode::Success)
        }
    }
}

fn stage_config(
    config: &Config,
    shutdown: &ShutdownHandler,
    output: OutputFormat,
    quiet: bool,
) -> StageConfig {
    let hide_progress = quiet || output == OutputFormat::Json;
    config
        .stage_config()
        .with_shutdown_flag(shutdown.get_flag())
        .with_progress_callback(Arc::new(Progress::new(hide_progress)))
}

fn build_index(root: &Path, config: &Config, shutdown: &ShutdownHandler) -> Result<FileIndex> {
    let index =
        FileIndex::build_with_shutdown(root, &config.walker_config(), Some(shutdown.get_flag()))
            .with_context(|| format!("cannot index {}", root.display()))?;
    if shutdown.is_shutdown_requested() {
        return Err(StageError::Interrupted.into());
    }
    log::info!(
        "Indexed {} files under {}",
        index.len(),
        index.root().display()
    );
    Ok(index)
}

fn relocate(
    index: &mut FileIndex,
    scope: RelocationScope,
    dest: Option<&Path>,
    config: &Config,
    shutdown: &ShutdownHandler,
) -> Result<RelocationReport> {
    let relocator = Relocator::new(config.relocate_config().with_shutdown_flag(shutdown.get_flag()));
    let report = relocator
        .move_duplicates(index, scope, dest)
        .with_context(|| format!("cannot relocate files of {}", index.root().display()))?;
    log::info!("{}", report.summary());
    for failure in &report.failures {
        log::warn!("{}", failure);
    }
    Ok(report)
}

fn relocation_failed(report: Option<&RelocationReport>) -> bool {
    report.is_some_and(|r| !r.all_succeeded() || r.aborted.is_some())
}

fn run_scan(
    args: &ScanArgs,
    mut config: Config,
    shutdown: &ShutdownHandler,
    quiet: bool,
) -> Result<ExitCode> {
    args.stage.apply(&mut config);
    if args.paranoid {
        config.paranoid = true;
    }
    let started = Instant::now();
    let stages = stage_config(&config, shutdown, args.stage.output, quiet);

    let mut index = build_index(&args.root, &config, shutdown)?;

    let mut header_options = HeaderStageOptions::default().with_min_size(config.header_min_size);
    let mut full_options = FullStageOptions::default();
    if let Some(limit) = args.stage.limit {
        header_options = header_options.with_limit(limit);
        full_options = full_options.with_limit(limit);
    }
    if let Some(min) = args.min_size {
        full_options = full_options.with_min_size(min);
    }
    if let Some(max) = args.max_size {
        full_options = full_options.with_max_size(max);
    }

    let header = index.find_header_candidates(&header_options, &stages)?;
    let full = index.find_duplicates(&full_options, &stages)?;

    let groups = index.duplicate_groups_list(None);
    let mut summary = ScanSummary::new(&index, &full, started.elapsed());
    summary.failed_files += header.failed_files;

    let relocation = if args.move_duplicates {
        Some(relocate(
            &mut index,
            RelocationScope::Within,
            args.dest.as_deref(),
            &config,
            shutdown,
        )?)
    } else {
        None
    };
    summary.interrupted = relocation.as_ref().is_some_and(|r| r.interrupted);

    let had_errors = summary.scan_errors > 0
        || summary.failed_files > 0
        || relocation_failed(relocation.as_ref());
    let exit_code =
        ExitCode::for_outcome(summary.duplicate_groups > 0, had_errors, summary.interrupted);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.stage.output {
        OutputFormat::Text => {
            TextOutput::new(&groups, &summary).write_to(&mut out)?;
            if let Some(report) = &relocation {
                writeln!(out, "{}", report.summary())?;
            }
        }
        OutputFormat::Json => {
            let mut json = JsonOutput::new(&groups, &summary, exit_code);
            if let Some(report) = &relocation {
                json = json.with_relocation(report);
            }
            json.write_to(&mut out, true)?;
        }
    }

    Ok(exit_code)
}

fn run_compare(
    args: &CompareArgs,
    mut config: Config,
    shutdown: &ShutdownHandler,
    quiet: bool,
) -> Result<ExitCode> {
    args.stage.apply(&mut config);
    let started = Instant::now();
    let stages = stage_config(&config, shutdown, args.stage.output, quiet);

    let mut ours = build_index(&args.root, &config, shutdown)?;
    let mut theirs = build_index(&args.other, &config, shutdown)?;

    let (headers, matched) = {
        let mut matcher = CrossMatcher::new(&mut ours, &mut theirs)?;
        let headers = matcher.intersect_headers(&stages)?;
        let matched = matcher.intersect_full_hashes(&headers, args.stage.limit, &stages)?;
        (headers, matched)
    };
    for (index, side) in [(&mut ours, Side::Ours), (&mut theirs, Side::Theirs)] {
        index.apply_cross_headers(&headers, side)?;
        index.apply_cross_match(&matched, side)?;
    }

    let mut summary = CompareSummary::new(&ours, &theirs, &matched, started.elapsed());
    summary.failed_files += headers.report().failed_files;
    let scan_errors = ours.scan_errors().len() + theirs.scan_errors().len();

    // Text and JSON list paths from the indices, so render before moving.
    let mut rendered = Vec::new();
    if args.stage.output == OutputFormat::Text {
        CompareTextOutput::new(&ours, &theirs, &matched, &summary).write_to(&mut rendered)?;
    }
    let json = (args.stage.output == OutputFormat::Json)
        .then(|| JsonCompareOutput::new(&ours, &theirs, &matched, &summary, ExitCode::Success));

    let target = if args.move_ours {
        Some(&mut ours)
    } else if args.move_theirs {
        Some(&mut theirs)
    } else {
        None
    };
    let relocation = match target {
        Some(index) => Some(relocate(
            index,
            RelocationScope::AgainstOther,
            args.dest.as_deref(),
            &config,
            shutdown,
        )?),
        None => None,
    };

    let interrupted = relocation.as_ref().is_some_and(|r| r.interrupted);
    let had_errors =
        scan_errors > 0 || summary.failed_files > 0 || relocation_failed(relocation.as_ref());
    let exit_code = ExitCode::for_outcome(summary.pairs > 0, had_errors, interrupted);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Some(json) = json {
        let mut json = json.with_exit_code(exit_code);
        if let Some(report) = &relocation {
            json = json.with_relocation(report);
        }
        json.write_to(&mut out, true)?;
    } else {
        out.write_all(&rendered)?;
        if let Some(report) = &relocation {
            writeln!(out, "{}", report.summary())?;
        }
    }

    Ok(exit_code)
}
