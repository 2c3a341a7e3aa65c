//! Configuration types for du-walker
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - Path-scoped exclusion patterns

use crate::du::DiskUsage;
use crate::error::ConfigError;
use crate::fs::is_within;
use crate::scan::{RunMode, ScanOptions};
use crate::store::{Category, RocksOptions};
use clap::{Args, Parser, Subcommand, ValueEnum};
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;

/// Maximum reasonable worker count
const MAX_WORKERS: usize = 512;

/// Store write batch limits
const MIN_BATCH_SIZE: usize = 100;
const MAX_BATCH_SIZE: usize = 1_000_000;

/// Incremental filesystem usage indexer
#[derive(Parser, Debug, Clone)]
#[command(
    name = "du-walker",
    version,
    about = "Incremental filesystem usage indexer",
    long_about = "Walks a directory tree and records one compact metadata record per directory \
                  in a RocksDB store.\n\n\
                  Later runs only re-read directories whose mtime or mode changed; per-user and \
                  per-group usage is computed from the store without touching the filesystem.",
    after_help = "EXAMPLES:\n    \
        du-walker scan /data --db /var/lib/du/data.db\n    \
        du-walker scan /data --db data.db --full --exclude '/\\.snapshot$'\n    \
        du-walker stats --db data.db --du raid0:65536x4 -n 10\n    \
        du-walker errors --db data.db --prefix /data/projects\n    \
        du-walker clear --db data.db errors"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Scan a directory tree into the store
    Scan(ScanArgs),

    /// Show usage aggregated from stored records
    Stats {
        #[command(flatten)]
        db: DbArgs,

        /// Only aggregate directories under this path
        #[arg(long, value_name = "PATH")]
        prefix: Option<String>,

        /// Disk usage model: identity, allocated, block:SIZE or raid0:CHUNKxDISKS
        #[arg(long = "du", default_value = "identity", value_name = "MODEL")]
        disk_usage: String,

        /// Number of users/groups to show
        #[arg(short = 'n', long, default_value = "20")]
        top: usize,

        /// Persist the aggregate as a stats snapshot
        #[arg(long)]
        save: bool,
    },

    /// List run logs
    Logs {
        #[command(flatten)]
        db: DbArgs,

        #[command(flatten)]
        range: TimeRangeArgs,
    },

    /// List recorded per-path errors
    Errors {
        #[command(flatten)]
        db: DbArgs,

        /// Only errors for paths starting with this prefix
        #[arg(long, value_name = "PATH")]
        prefix: Option<String>,

        #[command(flatten)]
        range: TimeRangeArgs,
    },

    /// Remove all records of one category
    Clear {
        #[command(flatten)]
        db: DbArgs,

        #[arg(value_enum)]
        category: ClearTarget,
    },
}

/// Store location
#[derive(Args, Debug, Clone)]
pub struct DbArgs {
    /// Store directory
    #[arg(long, default_value = "du.db", value_name = "PATH")]
    pub db: PathBuf,

    /// Seconds to wait for another process holding the store
    #[arg(long, default_value = "30", value_name = "SECS")]
    pub lock_timeout: u64,
}

/// Optional time window (RFC 3339)
#[derive(Args, Debug, Clone)]
pub struct TimeRangeArgs {
    /// Earliest time, e.g. 2024-01-31T00:00:00Z
    #[arg(long, value_name = "TIME")]
    pub since: Option<String>,

    /// Latest time
    #[arg(long, value_name = "TIME")]
    pub until: Option<String>,
}

/// Records that `clear` can remove
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearTarget {
    Logs,
    Errors,
    Stats,
    All,
}

impl ClearTarget {
    pub fn categories(&self) -> Vec<Category> {
        match self {
            ClearTarget::Logs => vec![Category::Logs],
            ClearTarget::Errors => vec![Category::Errors],
            ClearTarget::Stats => vec![Category::Stats],
            ClearTarget::All => Category::ALL.to_vec(),
        }
    }
}

/// Arguments of the `scan` subcommand
#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Directory to scan
    #[arg(value_name = "ROOT")]
    pub root: String,

    #[command(flatten)]
    pub db: DbArgs,

    /// Number of directory workers
    #[arg(short = 'w', long, default_value_t = default_workers(), value_name = "NUM")]
    pub workers: usize,

    /// Threads in the lstat pool used for large directories
    #[arg(long, default_value = "16", value_name = "NUM")]
    pub stat_workers: usize,

    /// Directories with more entries than this are stat'ed in parallel
    #[arg(long, default_value = "256", value_name = "NUM")]
    pub large_dir_threshold: usize,

    /// Store write batch size
    #[arg(short = 'b', long, default_value = "10000", value_name = "NUM")]
    pub batch_size: usize,

    /// Maximum directory depth (unlimited if not set)
    #[arg(short = 'd', long, value_name = "NUM")]
    pub max_depth: Option<usize>,

    /// Rescan every directory instead of reusing unchanged ones
    #[arg(long)]
    pub full: bool,

    /// Force writing into the live store (default for incremental runs)
    #[arg(long, conflicts_with = "copy_on_write")]
    pub in_place: bool,

    /// Build a new store and swap it in on success (default for --full)
    #[arg(long)]
    pub copy_on_write: bool,

    /// Exclude directories matching pattern (can be repeated)
    #[arg(long = "exclude", value_name = "PATTERN", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Exclude pattern that only applies below a path: PREFIX=PATTERN
    #[arg(long = "exclude-under", value_name = "PREFIX=PATTERN", action = clap::ArgAction::Append)]
    pub scoped_excludes: Vec<String>,

    /// Disable the RocksDB write-ahead log (faster, not crash safe)
    #[arg(long)]
    pub no_wal: bool,
}

fn default_workers() -> usize {
    num_cpus::get().max(1)
}

/// Regex exclusions scoped by path prefix
///
/// For a path, only the patterns attached to the longest configured prefix
/// containing it are consulted. Unscoped patterns live under the empty
/// prefix and apply wherever no scoped entry does.
#[derive(Debug, Clone, Default)]
pub struct ExcludeFilter {
    scopes: Vec<(String, Vec<Regex>)>,
}

impl ExcludeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a pattern to `prefix` ("" for every path)
    pub fn add(&mut self, prefix: &str, pattern: &str) -> Result<(), ConfigError> {
        let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidExcludePattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        let prefix = normalize_prefix(prefix);
        match self.scopes.iter_mut().find(|(p, _)| *p == prefix) {
            Some((_, patterns)) => patterns.push(regex),
            None => {
                self.scopes.push((prefix, vec![regex]));
                // Longest prefix first
                self.scopes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
            }
        }
        Ok(())
    }

    /// Parse a `PREFIX=PATTERN` argument
    pub fn add_scoped(&mut self, arg: &str) -> Result<(), ConfigError> {
        let (prefix, pattern) =
            arg.split_once('=')
                .ok_or_else(|| ConfigError::InvalidExcludePattern {
                    pattern: arg.to_string(),
                    reason: "expected PREFIX=PATTERN".to_string(),
                })?;
        if !prefix.starts_with('/') {
            return Err(ConfigError::InvalidExcludePattern {
                pattern: arg.to_string(),
                reason: "prefix must be an absolute path".to_string(),
            });
        }
        self.add(prefix, pattern)
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Check if a directory path should be skipped
    pub fn is_excluded(&self, path: &str) -> bool {
        self.scopes
            .iter()
            .find(|(prefix, _)| prefix.is_empty() || is_within(path, prefix))
            .is_some_and(|(_, patterns)| patterns.iter().any(|re| re.is_match(path)))
    }
}

fn normalize_prefix(prefix: &str) -> String {
    match prefix.trim_end_matches('/') {
        "" if prefix.starts_with('/') => "/".to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// Validated configuration of a scan run
#[derive(Debug, Clone)]
pub struct WalkConfig {
    /// Directory to scan
    pub root: String,

    /// Store directory
    pub db_path: PathBuf,

    /// Reuse unchanged directories
    pub incremental: bool,

    /// In-place or copy-on-write
    pub run_mode: RunMode,

    /// Number of directory workers
    pub worker_count: usize,

    /// Threads in the lstat pool
    pub stat_workers: usize,

    /// Entry count above which the pool is used
    pub large_dir_threshold: usize,

    /// Store write batch size
    pub batch_size: usize,

    /// Maximum traversal depth
    pub max_depth: Option<usize>,

    /// Compiled exclusions
    pub exclude: ExcludeFilter,

    /// Wait for the store lock at most this long
    pub lock_timeout: Duration,

    /// Skip the write-ahead log
    pub disable_wal: bool,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl WalkConfig {
    /// Create and validate configuration from `scan` arguments
    pub fn from_args(args: ScanArgs, quiet: bool, verbose: bool) -> Result<Self, ConfigError> {
        // Validate root
        let root = args.root.trim().to_string();
        if root.is_empty() {
            return Err(ConfigError::InvalidRoot {
                path: args.root.clone(),
                reason: "path is empty".to_string(),
            });
        }

        // Validate worker counts
        for count in [args.workers, args.stat_workers] {
            if count == 0 || count > MAX_WORKERS {
                return Err(ConfigError::InvalidWorkerCount {
                    count,
                    max: MAX_WORKERS,
                });
            }
        }

        // Validate batch size
        if args.batch_size < MIN_BATCH_SIZE || args.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidBatchSize {
                size: args.batch_size,
                min: MIN_BATCH_SIZE,
                max: MAX_BATCH_SIZE,
            });
        }

        // Compile exclude patterns
        let mut exclude = ExcludeFilter::new();
        for pattern in &args.exclude_patterns {
            exclude.add("", pattern)?;
        }
        for arg in &args.scoped_excludes {
            exclude.add_scoped(arg)?;
        }

        // Validate store location
        if let Some(parent) = args.db.db.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(ConfigError::InvalidDbPath {
                    path: args.db.db.clone(),
                    reason: format!("Parent directory '{}' does not exist", parent.display()),
                });
            }
        }

        let incremental = !args.full;
        let run_mode = if args.copy_on_write {
            RunMode::CopyOnWrite
        } else if args.in_place || incremental {
            RunMode::InPlace
        } else {
            RunMode::CopyOnWrite
        };

        Ok(Self {
            root,
            db_path: args.db.db,
            incremental,
            run_mode,
            worker_count: args.workers,
            stat_workers: args.stat_workers,
            large_dir_threshold: args.large_dir_threshold,
            batch_size: args.batch_size,
            max_depth: args.max_depth,
            exclude,
            lock_timeout: Duration::from_secs(args.db.lock_timeout),
            disable_wal: args.no_wal,
            show_progress: !quiet,
            verbose,
        })
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            workers: self.worker_count,
            stat_workers: self.stat_workers,
            large_dir_threshold: self.large_dir_threshold,
            max_depth: self.max_depth,
            incremental: self.incremental,
        }
    }

    pub fn store_options(&self) -> RocksOptions {
        RocksOptions {
            read_only: false,
            lock_timeout: self.lock_timeout,
            batch_size: self.batch_size,
            disable_wal: self.disable_wal,
        }
    }
}

/// Parse a `--du` argument
pub fn parse_disk_usage(arg: &str) -> Result<DiskUsage, ConfigError> {
    arg.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_args(extra: &[&str]) -> ScanArgs {
        let mut argv = vec!["du-walker", "scan", "/data"];
        argv.extend_from_slice(extra);
        match CliArgs::parse_from(argv).command {
            Command::Scan(args) => args,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_incremental_defaults_to_in_place() {
        let config = WalkConfig::from_args(scan_args(&[]), false, false).unwrap();
        assert!(config.incremental);
        assert_eq!(config.run_mode, RunMode::InPlace);
        assert_eq!(config.root, "/data");
    }

    #[test]
    fn test_full_defaults_to_copy_on_write() {
        let config = WalkConfig::from_args(scan_args(&["--full"]), false, false).unwrap();
        assert!(!config.incremental);
        assert_eq!(config.run_mode, RunMode::CopyOnWrite);

        let config =
            WalkConfig::from_args(scan_args(&["--full", "--in-place"]), false, false).unwrap();
        assert_eq!(config.run_mode, RunMode::InPlace);
    }

    #[test]
    fn test_invalid_worker_count() {
        let err = WalkConfig::from_args(scan_args(&["-w", "0"]), false, false).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWorkerCount { count: 0, .. }));
    }

    #[test]
    fn test_invalid_batch_size() {
        let err = WalkConfig::from_args(scan_args(&["-b", "5"]), false, false).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBatchSize { size: 5, .. }));
    }

    #[test]
    fn test_invalid_exclude_pattern() {
        let err =
            WalkConfig::from_args(scan_args(&["--exclude", "(unclosed"]), false, false).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidExcludePattern { .. }));
    }

    #[test]
    fn test_exclude_pattern() {
        let mut filter = ExcludeFilter::new();
        filter.add("", r"/\.snapshot$").unwrap();

        assert!(filter.is_excluded("/data/.snapshot"));
        assert!(!filter.is_excluded("/data/snapshots"));
    }

    #[test]
    fn test_longest_prefix_decides() {
        let mut filter = ExcludeFilter::new();
        filter.add("", r"/tmp$").unwrap();
        filter.add_scoped("/data/scratch=/cache$").unwrap();

        // Global scope
        assert!(filter.is_excluded("/home/tmp"));
        // Inside the scoped prefix only its own patterns apply
        assert!(!filter.is_excluded("/data/scratch/tmp"));
        assert!(filter.is_excluded("/data/scratch/x/cache"));
        // Sibling sharing a name prefix falls back to the global scope
        assert!(!filter.is_excluded("/data/scratch2/cache"));
        assert!(filter.is_excluded("/data/scratch2/tmp"));
    }

    #[test]
    fn test_scoped_exclude_syntax() {
        let mut filter = ExcludeFilter::new();
        assert!(filter.add_scoped("no-separator").is_err());
        assert!(filter.add_scoped("relative=x").is_err());
        assert!(filter.is_empty());
    }

    #[test]
    fn test_clear_targets() {
        assert_eq!(ClearTarget::All.categories().len(), 3);
        assert_eq!(ClearTarget::Errors.categories(), vec![Category::Errors]);
    }

    #[test]
    fn test_parse_disk_usage() {
        assert_eq!(
            parse_disk_usage("block:4096").unwrap(),
            DiskUsage::Block { size: 4096 }
        );
        assert!(parse_disk_usage("bogus").is_err());
    }
}
