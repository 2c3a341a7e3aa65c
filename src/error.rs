//! Error types for du-walker
//!
//! This module defines the error hierarchy used across the crate:
//! - Filesystem errors from lstat/readdir
//! - Codec errors from encoding and decoding prefix records
//! - Store errors from the key/value persistence layer
//! - Configuration and worker errors
//!
//! Per-directory filesystem errors are isolated and recorded; store-level
//! errors abort the whole run.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for du-walker
#[derive(Error, Debug)]
pub enum WalkerError {
    /// Filesystem errors
    #[error("Filesystem error: {0}")]
    Fs(#[from] FsError),

    /// Prefix record encoding errors
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Persistence errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// I/O errors outside the scanned tree (renames, removals)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Interrupted by signal
    #[error("Scan cancelled")]
    Cancelled,
}

impl WalkerError {
    /// Cancellation is a cooperative shutdown, not a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WalkerError::Cancelled)
    }
}

/// Errors returned by the filesystem collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    /// Path vanished
    #[error("Path not found: '{path}'")]
    NotFound { path: String },

    /// Permission denied
    #[error("Permission denied: '{path}'")]
    PermissionDenied { path: String },

    /// Stale handle (network filesystems)
    #[error("Stale file handle for '{path}' - filesystem changed during scan")]
    Stale { path: String },

    /// Anything else
    #[error("Failed to access '{path}': {reason}")]
    Other { path: String, reason: String },
}

#[cfg(target_os = "linux")]
const ESTALE: i32 = 116;

impl FsError {
    /// Classify an I/O error for the given path
    pub fn from_io(path: &str, err: &io::Error) -> Self {
        #[cfg(target_os = "linux")]
        {
            if err.raw_os_error() == Some(ESTALE) {
                return FsError::Stale { path: path.to_string() };
            }
        }

        match err.kind() {
            io::ErrorKind::NotFound => FsError::NotFound { path: path.to_string() },
            io::ErrorKind::PermissionDenied => FsError::PermissionDenied {
                path: path.to_string(),
            },
            _ => FsError::Other {
                path: path.to_string(),
                reason: err.to_string(),
            },
        }
    }

    /// Check if this error is recoverable (skip and continue)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FsError::PermissionDenied { .. } | FsError::NotFound { .. } | FsError::Stale { .. }
        )
    }

    /// Check if this error means the path no longer exists
    pub fn is_vanished(&self) -> bool {
        matches!(self, FsError::NotFound { .. } | FsError::Stale { .. })
    }

    /// Path associated with this error
    pub fn path(&self) -> &str {
        match self {
            FsError::NotFound { path }
            | FsError::PermissionDenied { path }
            | FsError::Stale { path }
            | FsError::Other { path, .. } => path,
        }
    }
}

/// Prefix record encoding and decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Format version byte does not match
    #[error("Unsupported record version {found} (expected {expected})")]
    UnsupportedVersion { found: u8, expected: u8 },

    /// Input ended before the record was complete
    #[error("Insufficient data: needed {needed} bytes, {remaining} remaining")]
    InsufficientData { needed: usize, remaining: usize },

    /// Structurally invalid input
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Ownership bitmaps do not partition the file positions
    #[error("Invalid ownership index: {0}")]
    InvalidOwnershipIndex(String),
}

/// Persistence errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// RocksDB operation failed
    #[error("RocksDB error: {0}")]
    Rocks(#[from] rocksdb::Error),

    /// Store lock could not be acquired in time
    #[error("Timed out after {waited:?} waiting for store lock on '{path}'")]
    Timeout { path: PathBuf, waited: Duration },

    /// Store was written by an incompatible version
    #[error("Store '{path}' has format version {found}, expected {expected}")]
    UnsupportedVersion {
        path: PathBuf,
        found: u8,
        expected: u8,
    },

    /// Store does not exist
    #[error("Store not found: '{0}'")]
    NotFound(PathBuf),

    /// Bucket (column family) missing from an opened store
    #[error("Bucket '{0}' missing from store")]
    MissingBucket(&'static str),

    /// Write attempted on a read-only handle
    #[error("Store is opened read-only")]
    ReadOnly,

    /// Store was closed
    #[error("Store is closed")]
    Closed,

    /// Record envelope could not be decoded
    #[error("Corrupt record in bucket '{bucket}': {reason}")]
    Corrupt { bucket: &'static str, reason: String },

    /// Stats payload serialization failed
    #[error("Serialization error: {0}")]
    Bincode(String),

    /// Writer thread failed
    #[error("Writer failed: {0}")]
    Writer(String),

    /// I/O error (directory creation, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Lock contention is retryable by the caller
    pub fn is_timeout(&self) -> bool {
        matches!(self, StoreError::Timeout { .. })
    }
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid batch size
    #[error("Invalid batch size {size}: must be between {min} and {max}")]
    InvalidBatchSize { size: usize, min: usize, max: usize },

    /// Invalid exclude pattern
    #[error("Invalid exclude pattern '{pattern}': {reason}")]
    InvalidExcludePattern { pattern: String, reason: String },

    /// Invalid disk usage model
    #[error("Invalid disk usage model '{value}': {reason}")]
    InvalidDiskUsage { value: String, reason: String },

    /// Scan root problems
    #[error("Invalid scan root '{path}': {reason}")]
    InvalidRoot { path: String, reason: String },

    /// Database path problems
    #[error("Invalid database path '{path}': {reason}")]
    InvalidDbPath { path: PathBuf, reason: String },
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("Worker '{name}' panicked")]
    Panicked { name: String },

    /// Thread could not be spawned
    #[error("Failed to spawn worker '{name}': {reason}")]
    SpawnFailed { name: String, reason: String },
}

/// Result type alias for WalkerError
pub type Result<T> = std::result::Result<T, WalkerError>;

/// Result type alias for FsError
pub type FsResult<T> = std::result::Result<T, FsError>;

/// Result type alias for CodecError
pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// Result type alias for StoreError
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_error_recoverable() {
        let perm_denied = FsError::PermissionDenied {
            path: "/test".into(),
        };
        assert!(perm_denied.is_recoverable());
        assert!(!perm_denied.is_vanished());

        let other = FsError::Other {
            path: "/test".into(),
            reason: "EIO".into(),
        };
        assert!(!other.is_recoverable());
    }

    #[test]
    fn test_fs_error_from_io() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(
            FsError::from_io("/x", &err),
            FsError::NotFound { path: "/x".into() }
        );

        let err = io::Error::new(io::ErrorKind::PermissionDenied, "no");
        assert!(matches!(
            FsError::from_io("/x", &err),
            FsError::PermissionDenied { .. }
        ));
    }

    #[test]
    fn test_error_conversion() {
        let fs_err = FsError::NotFound {
            path: "/missing".into(),
        };
        let walker_err: WalkerError = fs_err.into();
        assert!(matches!(walker_err, WalkerError::Fs(_)));
        assert!(!walker_err.is_cancelled());
        assert!(WalkerError::Cancelled.is_cancelled());
    }
}
