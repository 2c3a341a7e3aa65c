//! Key/value persistence
//!
//! One physical store holds five disjoint buckets:
//!
//! | bucket     | key                         | value                 |
//! |------------|-----------------------------|-----------------------|
//! | `prefixes` | directory path              | encoded `PrefixInfo`  |
//! | `errors`   | path, `0x00`, time key      | [`ErrorRecord`]       |
//! | `logs`     | time key of the run start   | [`LogRecord`]         |
//! | `stats`    | time key of the snapshot    | [`StatsSnapshot`]     |
//! | `meta`     | `format_version`            | one byte              |
//!
//! Engines implement the primitive bucket operations of [`Store`]; every
//! record-level operation is a provided method so all engines share one
//! layout.
//!
//! # Module Structure
//!
//! - `records`: log/error/stats envelopes
//! - `memory`: in-process engine
//! - `rocks`: RocksDB engine (column family per bucket)
//! - `writer`: RocksDB writer thread that coalesces batches

pub mod memory;
pub mod records;
pub mod rocks;
mod writer;

use crate::codec::time_key;
use crate::error::StoreResult;
use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use std::sync::Arc;

pub use memory::MemoryStore;
pub use records::{ErrorRecord, LogRecord, StatsSnapshot};
pub use rocks::{RocksOptions, RocksStore};

/// Store format written to the `meta` bucket
pub const STORE_FORMAT_VERSION: u8 = 1;

/// Key of the format version in the `meta` bucket
pub const META_FORMAT_VERSION: &[u8] = b"format_version";

/// Number of prefix keys deleted per write when removing a subtree
const DELETE_CHUNK: usize = 10_000;

/// Shared handle to any store engine
pub type StoreHandle = Arc<dyn Store>;

/// Storage namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Prefixes,
    Errors,
    Logs,
    Stats,
    Meta,
}

impl Bucket {
    pub const ALL: [Bucket; 5] = [
        Bucket::Prefixes,
        Bucket::Errors,
        Bucket::Logs,
        Bucket::Stats,
        Bucket::Meta,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Bucket::Prefixes => "prefixes",
            Bucket::Errors => "errors",
            Bucket::Logs => "logs",
            Bucket::Stats => "stats",
            Bucket::Meta => "meta",
        }
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

/// Record categories that can be cleared independently of prefix records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Logs,
    Errors,
    Stats,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Logs, Category::Errors, Category::Stats];

    pub fn bucket(&self) -> Bucket {
        match self {
            Category::Logs => Bucket::Logs,
            Category::Errors => Bucket::Errors,
            Category::Stats => Bucket::Stats,
        }
    }
}

/// A single mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put {
        bucket: Bucket,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        bucket: Bucket,
        key: Vec<u8>,
    },
}

/// Returned by scan visitors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanControl {
    Continue,
    Stop,
}

/// Persistence contract
///
/// Writes may be buffered by the engine; they are guaranteed visible to
/// reads after [`Store::flush`] returns.
pub trait Store: Send + Sync {
    /// Opened without write access
    fn read_only(&self) -> bool;

    fn get_raw(&self, bucket: Bucket, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Apply mutations in order
    fn write(&self, ops: Vec<WriteOp>) -> StoreResult<()>;

    /// Visit entries in key order starting at `start`
    fn scan_raw(
        &self,
        bucket: Bucket,
        start: &[u8],
        visit: &mut dyn FnMut(&[u8], &[u8]) -> ScanControl,
    ) -> StoreResult<()>;

    /// Entry with the greatest key
    fn last_raw(&self, bucket: Bucket) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>>;

    /// Commit buffered writes
    fn flush(&self) -> StoreResult<()>;

    /// Flush and release the store; later writes fail with `Closed`
    fn close(&self) -> StoreResult<()>;

    // ---- prefix records ----

    fn get(&self, path: &str) -> StoreResult<Option<Vec<u8>>> {
        self.get_raw(Bucket::Prefixes, path.as_bytes())
    }

    fn set(&self, path: &str, value: Vec<u8>) -> StoreResult<()> {
        self.write(vec![WriteOp::Put {
            bucket: Bucket::Prefixes,
            key: path.as_bytes().to_vec(),
            value,
        }])
    }

    fn set_batch(&self, records: Vec<(String, Vec<u8>)>) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.write(
            records
                .into_iter()
                .map(|(path, value)| WriteOp::Put {
                    bucket: Bucket::Prefixes,
                    key: path.into_bytes(),
                    value,
                })
                .collect(),
        )
    }

    fn delete(&self, path: &str) -> StoreResult<()> {
        self.write(vec![WriteOp::Delete {
            bucket: Bucket::Prefixes,
            key: path.as_bytes().to_vec(),
        }])
    }

    /// Remove the record for `dir` and every record beneath it
    ///
    /// Returns the number of records removed.
    fn delete_prefix(&self, dir: &str) -> StoreResult<u64> {
        // Pending puts under `dir` must be visible to the scan below
        self.flush()?;

        let mut keys = Vec::new();
        let matched = |key: &[u8]| {
            std::str::from_utf8(key)
                .map(|k| crate::fs::is_within(k, dir))
                .unwrap_or(false)
        };
        self.scan_raw(Bucket::Prefixes, dir.as_bytes(), &mut |key, _| {
            if matched(key) {
                keys.push(key.to_vec());
                ScanControl::Continue
            } else if key.starts_with(dir.as_bytes()) {
                // Sibling sharing the name prefix, e.g. "/a/b-old" after "/a/b"
                ScanControl::Continue
            } else {
                ScanControl::Stop
            }
        })?;

        let removed = keys.len() as u64;
        let mut ops = Vec::with_capacity(keys.len().min(DELETE_CHUNK));
        for key in keys {
            ops.push(WriteOp::Delete {
                bucket: Bucket::Prefixes,
                key,
            });
            if ops.len() >= DELETE_CHUNK {
                self.write(std::mem::take(&mut ops))?;
            }
        }
        if !ops.is_empty() {
            self.write(ops)?;
        }
        Ok(removed)
    }

    /// Visit prefix records whose path starts with `prefix`, in key order
    fn scan(
        &self,
        prefix: &str,
        visit: &mut dyn FnMut(&str, &[u8]) -> ScanControl,
    ) -> StoreResult<()> {
        self.scan_raw(Bucket::Prefixes, prefix.as_bytes(), &mut |key, value| {
            if !key.starts_with(prefix.as_bytes()) {
                return ScanControl::Stop;
            }
            match std::str::from_utf8(key) {
                Ok(path) => visit(path, value),
                Err(_) => ScanControl::Continue,
            }
        })
    }

    /// Send prefix records under `prefix` to a channel
    ///
    /// Stops early when the receiver goes away. Returns the number sent.
    fn stream(&self, prefix: &str, tx: Sender<(String, Vec<u8>)>) -> StoreResult<u64> {
        let mut sent = 0u64;
        self.scan(prefix, &mut |path, value| {
            if tx.send((path.to_string(), value.to_vec())).is_err() {
                return ScanControl::Stop;
            }
            sent += 1;
            ScanControl::Continue
        })?;
        Ok(sent)
    }

    /// Number of entries in a bucket
    fn count(&self, bucket: Bucket) -> StoreResult<u64> {
        let mut n = 0u64;
        self.scan_raw(bucket, &[], &mut |_, _| {
            n += 1;
            ScanControl::Continue
        })?;
        Ok(n)
    }

    // ---- logs ----

    fn append_log(&self, log: &LogRecord) -> StoreResult<()> {
        self.write(vec![WriteOp::Put {
            bucket: Bucket::Logs,
            key: log.key(),
            value: log.encode(),
        }])
    }

    fn last_log(&self) -> StoreResult<Option<LogRecord>> {
        match self.last_raw(Bucket::Logs)? {
            Some((_, value)) => LogRecord::decode(&value).map(Some),
            None => Ok(None),
        }
    }

    /// Visit logs whose start lies in `[from, to]`
    fn visit_logs(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        visit: &mut dyn FnMut(LogRecord) -> ScanControl,
    ) -> StoreResult<()> {
        let end = time_key(&to);
        let mut failure = None;
        self.scan_raw(Bucket::Logs, &time_key(&from), &mut |key, value| {
            if key > &end[..] {
                return ScanControl::Stop;
            }
            match LogRecord::decode(value) {
                Ok(log) => visit(log),
                Err(e) => {
                    failure = Some(e);
                    ScanControl::Stop
                }
            }
        })?;
        failure.map_or(Ok(()), Err)
    }

    // ---- errors ----

    fn append_error(&self, error: &ErrorRecord) -> StoreResult<()> {
        self.write(vec![WriteOp::Put {
            bucket: Bucket::Errors,
            key: error.key(),
            value: error.encode(),
        }])
    }

    /// Visit errors whose path starts with `prefix`
    fn visit_errors_with_prefix(
        &self,
        prefix: &str,
        visit: &mut dyn FnMut(ErrorRecord) -> ScanControl,
    ) -> StoreResult<()> {
        let mut failure = None;
        self.scan_raw(Bucket::Errors, prefix.as_bytes(), &mut |key, value| {
            if !key.starts_with(prefix.as_bytes()) {
                return ScanControl::Stop;
            }
            match ErrorRecord::decode(key, value) {
                Ok(error) => visit(error),
                Err(e) => {
                    failure = Some(e);
                    ScanControl::Stop
                }
            }
        })?;
        failure.map_or(Ok(()), Err)
    }

    /// Visit errors recorded in `[from, to]`, in path order
    fn visit_errors(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        visit: &mut dyn FnMut(ErrorRecord) -> ScanControl,
    ) -> StoreResult<()> {
        self.visit_errors_with_prefix("", &mut |error| {
            if error.time < from || error.time > to {
                ScanControl::Continue
            } else {
                visit(error)
            }
        })
    }

    // ---- stats ----

    fn save_stats(&self, snapshot: &StatsSnapshot) -> StoreResult<()> {
        self.write(vec![WriteOp::Put {
            bucket: Bucket::Stats,
            key: snapshot.key(),
            value: snapshot.encode(),
        }])
    }

    fn last_stats(&self) -> StoreResult<Option<StatsSnapshot>> {
        match self.last_raw(Bucket::Stats)? {
            Some((_, value)) => StatsSnapshot::decode(&value).map(Some),
            None => Ok(None),
        }
    }

    /// Visit snapshots taken in `[from, to]`
    fn visit_stats(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        visit: &mut dyn FnMut(StatsSnapshot) -> ScanControl,
    ) -> StoreResult<()> {
        let end = time_key(&to);
        let mut failure = None;
        self.scan_raw(Bucket::Stats, &time_key(&from), &mut |key, value| {
            if key > &end[..] {
                return ScanControl::Stop;
            }
            match StatsSnapshot::decode(value) {
                Ok(snapshot) => visit(snapshot),
                Err(e) => {
                    failure = Some(e);
                    ScanControl::Stop
                }
            }
        })?;
        failure.map_or(Ok(()), Err)
    }

    // ---- maintenance ----

    /// Remove every record of one category; prefix records are untouched
    fn clear(&self, category: Category) -> StoreResult<u64> {
        self.flush()?;
        let bucket = category.bucket();
        let mut keys = Vec::new();
        self.scan_raw(bucket, &[], &mut |key, _| {
            keys.push(key.to_vec());
            ScanControl::Continue
        })?;
        let removed = keys.len() as u64;
        for chunk in keys.chunks(DELETE_CHUNK) {
            self.write(
                chunk
                    .iter()
                    .map(|key| WriteOp::Delete {
                        bucket,
                        key: key.clone(),
                    })
                    .collect(),
            )?;
        }
        self.flush()?;
        Ok(removed)
    }

    /// Copy every record of one category into another store
    fn copy_category(&self, category: Category, dest: &dyn Store) -> StoreResult<u64> {
        let bucket = category.bucket();
        let mut batch = Vec::new();
        let mut copied = 0u64;
        let mut failure = None;
        self.scan_raw(bucket, &[], &mut |key, value| {
            batch.push(WriteOp::Put {
                bucket,
                key: key.to_vec(),
                value: value.to_vec(),
            });
            copied += 1;
            if batch.len() >= DELETE_CHUNK {
                if let Err(e) = dest.write(std::mem::take(&mut batch)) {
                    failure = Some(e);
                    return ScanControl::Stop;
                }
            }
            ScanControl::Continue
        })?;
        if let Some(e) = failure {
            return Err(e);
        }
        if !batch.is_empty() {
            dest.write(batch)?;
        }
        Ok(copied)
    }
}
