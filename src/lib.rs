//! du-walker - Incremental Filesystem Usage Indexer
//!
//! Walks a directory tree and keeps one compact metadata record per
//! directory in a key/value store. Repeated scans only re-read directories
//! whose mtime or mode changed, so measuring usage over very large trees
//! does not require a full re-stat of every file.
//!
//! # Features
//!
//! - **Incremental Scans**: a directory whose stored record still matches
//!   its mtime and mode is reused; descent continues through the stored
//!   child list.
//!
//! - **Compact Records**: per-file owners are stored as bitmaps over file
//!   positions, and only when they differ from the directory's owner.
//!
//! - **Parallel Scanning**: work-stealing directory workers plus a bounded
//!   lstat pool for very large directories.
//!
//! - **Safe Rebuilds**: full scans build a new store next to the live one
//!   and swap it in only on success.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Filesystem (lstat, readdir)                 │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Directory Workers                           │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐         ┌─────────┐     │
//! │  │Worker 1 │  │Worker 2 │  │Worker 3 │  ...    │Worker N │     │
//! │  └────┬────┘  └────┬────┘  └────┬────┘         └────┬────┘     │
//! │       │ unchanged? reuse : list + stat + build       │          │
//! │       └────────────┼────────────┼────────────────────┘          │
//! │                    ▼            ▼                               │
//! │            ┌──────────────────────────┐                         │
//! │            │  Stat Pool + Sequencer   │ large directories       │
//! │            └──────────────────────────┘                         │
//! │                         │ PrefixInfo::encode                    │
//! │                         ▼                                       │
//! │            ┌──────────────────────────┐                         │
//! │            │    Batched Store Writer  │                         │
//! │            └──────────────────────────┘                         │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//!               ┌──────────────────────────────┐
//!               │ RocksDB: prefixes, errors,   │
//!               │ logs, stats, meta            │
//!               └──────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # First scan, then cheap incremental rescans
//! du-walker scan /data --db data.db
//! du-walker scan /data --db data.db
//!
//! # Usage by user and group on a RAID0 volume
//! du-walker stats --db data.db --du raid0:65536x4
//! ```

pub mod codec;
pub mod config;
pub mod du;
pub mod error;
pub mod fs;
pub mod prefix;
pub mod progress;
pub mod scan;
pub mod stats;
pub mod store;

pub use config::{CliArgs, ExcludeFilter, WalkConfig};
pub use du::DiskUsage;
pub use error::{Result, WalkerError};
pub use prefix::{FileEntry, PrefixBuilder, PrefixInfo};
pub use scan::{Baseline, RebuildController, RunMode, ScanOptions, ScanSummary, Scanner};
pub use store::{MemoryStore, RocksStore, Store, StoreHandle};
