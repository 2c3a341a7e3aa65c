//! Filesystem access
//!
//! The scanner only needs two operations from a filesystem: `lstat` a path
//! and list a directory. Both live behind the [`FileSystem`] trait so the
//! scan engine can run against the local disk or an in-memory tree in tests.
//!
//! ```text
//! ┌───────────────────────────────┐
//! │          Scanner              │
//! │  dir workers + stat pool      │
//! └──────────────┬────────────────┘
//!                │ lstat / list_directory
//!                ▼
//! ┌───────────────────────────────┐
//! │   dyn FileSystem (Send+Sync)  │
//! │   LocalFs: symlink_metadata   │
//! └───────────────────────────────┘
//! ```

mod local;
pub mod types;

use crate::error::FsResult;

pub use local::{LocalFs, PlatformMeta};
pub use types::{is_within, join_path, DirEntry, EntryType, FileStat};

/// Filesystem collaborator used by the scanner
///
/// Implementations must be safe to call from many worker threads at once.
pub trait FileSystem: Send + Sync {
    /// Stat a path without following a trailing symlink
    fn lstat(&self, path: &str) -> FsResult<FileStat>;

    /// List a directory, sorted by name, excluding `.` and `..`
    fn list_directory(&self, path: &str) -> FsResult<Vec<DirEntry>>;
}
