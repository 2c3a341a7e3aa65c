//! du-walker - Incremental filesystem usage indexer
//!
//! Entry point for the CLI application.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use du_walker::config::{parse_disk_usage, CliArgs, Command, DbArgs, TimeRangeArgs, WalkConfig};
use du_walker::fs::{FileSystem, LocalFs};
use du_walker::progress::{
    print_error, print_header, print_log, print_summary, print_usage, update_bar,
    ProgressReporter,
};
use du_walker::scan::{RebuildController, RunMode, ScanSummary, Scanner};
use du_walker::stats::AggregateStats;
use du_walker::store::{RocksOptions, RocksStore, ScanControl, Store};
use du_walker::WalkerError;
use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    match args.command {
        Command::Scan(scan) => {
            let config = WalkConfig::from_args(scan, args.quiet, args.verbose)
                .context("Invalid configuration")?;
            run_scan(config)
        }
        Command::Stats {
            db,
            prefix,
            disk_usage,
            top,
            save,
        } => {
            let du = parse_disk_usage(&disk_usage).context("Invalid --du")?;
            let store = open_store(&db, !save)?;
            let prefix = prefix.unwrap_or_default();
            let stats = AggregateStats::collect(&store, &prefix, &du)
                .context("Failed to aggregate usage")?;
            print_usage(&stats, top);
            if save {
                store.save_stats(&stats.snapshot(Utc::now())?)?;
                store.close()?;
                info!("Saved stats snapshot");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Logs { db, range } => {
            let (from, to) = parse_range(&range)?;
            let store = open_store(&db, true)?;
            store.visit_logs(from, to, &mut |log| {
                print_log(&log);
                ScanControl::Continue
            })?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Errors { db, prefix, range } => {
            let (from, to) = parse_range(&range)?;
            let store = open_store(&db, true)?;
            store.visit_errors_with_prefix(prefix.as_deref().unwrap_or(""), &mut |err| {
                if err.time >= from && err.time <= to {
                    print_error(&err);
                }
                ScanControl::Continue
            })?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Clear { db, category } => {
            let store = open_store(&db, false)?;
            for category in category.categories() {
                let removed = store.clear(category)?;
                println!("Removed {} {:?} records", removed, category);
            }
            store.close()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_scan(config: WalkConfig) -> Result<ExitCode> {
    let fs: Arc<dyn FileSystem> = Arc::new(LocalFs::new());

    let root_stat = fs
        .lstat(&config.root)
        .with_context(|| format!("Cannot access scan root '{}'", config.root))?;
    if !root_stat.is_dir() {
        bail!("Scan root '{}' is not a directory", config.root);
    }

    let mode_name = match (config.run_mode, config.incremental) {
        (RunMode::InPlace, true) => "incremental, in place",
        (RunMode::InPlace, false) => "full, in place",
        (RunMode::CopyOnWrite, true) => "incremental, copy-on-write",
        (RunMode::CopyOnWrite, false) => "full, copy-on-write",
    };
    let db_display = config.db_path.display().to_string();

    // Print header
    if config.show_progress {
        print_header(&config.root, config.worker_count, &db_display, mode_name);
    }

    // Setup signal handler for graceful shutdown
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, shutting down...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    // Create progress reporter
    let progress = config.show_progress.then(ProgressReporter::new);

    let filter = Arc::new(config.exclude.clone());
    let options = config.scan_options();
    let controller = RebuildController::new(&config.db_path, config.store_options());
    let start = Instant::now();
    let mut partial: Option<ScanSummary> = None;

    let result = controller.run(config.run_mode, config.incremental, |target, baseline| {
        let scanner = Scanner::new(fs, target, baseline, filter, options)
            .with_shutdown(Arc::clone(&shutdown));
        let result = match &progress {
            Some(reporter) => {
                let bar = reporter.bar();
                scanner.run_with_progress(&config.root, move |p| update_bar(&bar, &p))
            }
            None => scanner.run(&config.root),
        };
        if result.is_err() {
            partial = Some(scanner.summary(start.elapsed()));
        }
        result
    });

    let (summary, code) = match result {
        Ok(summary) => (summary, ExitCode::SUCCESS),
        Err(WalkerError::Cancelled) => {
            info!("Scan was interrupted before completion");
            (partial.unwrap_or_default(), ExitCode::from(130))
        }
        Err(e) => {
            if let Some(reporter) = &progress {
                reporter.finish_and_clear();
            }
            return Err(e).context("Scan failed");
        }
    };

    // Finish progress
    if let Some(reporter) = &progress {
        if summary.completed {
            reporter.finish("Scan completed");
        } else {
            reporter.finish("Scan interrupted");
        }
    }

    // Print summary
    if config.show_progress {
        print_summary(&summary, &db_display, dir_size(&config.db_path));
    }

    if summary.errors > 0 {
        info!(errors = summary.errors, "Scan completed with errors");
    }

    Ok(code)
}

fn open_store(db: &DbArgs, read_only: bool) -> Result<RocksStore> {
    let options = RocksOptions {
        read_only,
        lock_timeout: Duration::from_secs(db.lock_timeout),
        ..RocksOptions::default()
    };
    RocksStore::open(&db.db, options)
        .with_context(|| format!("Failed to open store '{}'", db.db.display()))
}

fn parse_range(range: &TimeRangeArgs) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let parse = |value: &Option<String>, default: DateTime<Utc>| -> Result<DateTime<Utc>> {
        match value {
            Some(s) => Ok(DateTime::parse_from_rfc3339(s)
                .with_context(|| format!("Invalid time '{}'", s))?
                .with_timezone(&Utc)),
            None => Ok(default),
        }
    };
    Ok((
        parse(&range.since, DateTime::<Utc>::MIN_UTC)?,
        parse(&range.until, DateTime::<Utc>::MAX_UTC)?,
    ))
}

/// Total size of the files of a store directory
fn dir_size(path: &Path) -> Option<u64> {
    let entries = std::fs::read_dir(path).ok()?;
    Some(
        entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.metadata().ok())
            .filter(|m| m.is_file())
            .map(|m| m.len())
            .sum(),
    )
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("du_walker=debug,warn")
    } else {
        EnvFilter::new("du_walker=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
