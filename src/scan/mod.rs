//! Incremental scanning
//!
//! # Module Structure
//!
//! - `engine`: work-stealing walk and the per-directory reuse/rescan decision
//! - `stat_pool`: bounded lstat pool for large directories
//! - `sequencer`: reorders pool results into submission order
//! - `rebuild`: in-place vs copy-on-write store lifecycle

pub mod engine;
pub mod rebuild;
pub mod sequencer;
pub mod stat_pool;

pub use engine::{Baseline, ScanOptions, ScanProgress, ScanSummary, Scanner};
pub use rebuild::{RebuildController, RunMode};
pub use stat_pool::StatPool;
