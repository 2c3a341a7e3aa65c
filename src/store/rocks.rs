//! RocksDB store engine
//!
//! Each bucket is a column family. Writable stores take RocksDB's exclusive
//! lock, so a second writer waits up to `lock_timeout` and then fails with
//! [`StoreError::Timeout`]. Read-only opens take no lock and can coexist
//! with each other and with a writer.

use super::writer::{WriterConfig, WriterHandle};
use super::{Bucket, ScanControl, Store, WriteOp, META_FORMAT_VERSION, STORE_FORMAT_VERSION};
use crate::error::{StoreError, StoreResult};
use parking_lot::Mutex;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, DB};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Delay between lock acquisition attempts
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Options for opening a RocksDB store
#[derive(Debug, Clone)]
pub struct RocksOptions {
    /// Open without write access
    pub read_only: bool,
    /// How long to wait for another writer to release the store
    pub lock_timeout: Duration,
    /// Operations per committed batch
    pub batch_size: usize,
    /// Skip the write-ahead log
    pub disable_wal: bool,
}

impl Default for RocksOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            lock_timeout: Duration::from_secs(30),
            batch_size: 10_000,
            disable_wal: false,
        }
    }
}

impl RocksOptions {
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }
}

/// Column family options for prefix records (point lookups + range scans)
fn prefixes_cf_options() -> Options {
    let mut opts = Options::default();

    opts.set_write_buffer_size(32 * 1024 * 1024);
    opts.set_max_write_buffer_number(2);
    opts.set_min_write_buffer_number_to_merge(1);

    opts.set_level_compaction_dynamic_level_bytes(true);
    opts.set_max_bytes_for_level_base(256 * 1024 * 1024);

    // Bloom filter for point lookups (10 bits/key)
    let mut block_opts = rocksdb::BlockBasedOptions::default();
    block_opts.set_bloom_filter(10.0, false);
    block_opts.set_cache_index_and_filter_blocks(true);
    opts.set_block_based_table_factory(&block_opts);

    opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

    opts
}

/// Column family options for small append-only buckets
fn records_cf_options() -> Options {
    let mut opts = Options::default();
    opts.set_write_buffer_size(4 * 1024 * 1024);
    opts.set_max_write_buffer_number(2);
    opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
    opts
}

fn db_options() -> Options {
    let mut opts = Options::default();
    opts.create_if_missing(true);
    opts.create_missing_column_families(true);
    opts.increase_parallelism(num_cpus::get() as i32);
    opts.set_max_background_jobs(4);
    opts
}

fn cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    Bucket::ALL
        .iter()
        .map(|bucket| {
            let opts = match bucket {
                Bucket::Prefixes => prefixes_cf_options(),
                _ => records_cf_options(),
            };
            ColumnFamilyDescriptor::new(bucket.name(), opts)
        })
        .collect()
}

/// RocksDB lock contention surfaces as an IO error on the LOCK file, e.g.
/// `IO error: While lock file: /db/LOCK: Resource temporarily unavailable`
fn is_lock_error(err: &rocksdb::Error) -> bool {
    is_lock_message(&err.to_string())
}

fn is_lock_message(msg: &str) -> bool {
    msg.contains("While lock file")
        || msg.contains("/LOCK:")
        || msg.contains("lock hold by current process")
}

/// RocksDB-backed store
pub struct RocksStore {
    path: PathBuf,
    db: Arc<DB>,
    read_only: bool,
    writer: Mutex<Option<WriterHandle>>,
    closed: Mutex<bool>,
}

impl std::fmt::Debug for RocksStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksStore")
            .field("path", &self.path)
            .field("read_only", &self.read_only)
            .finish()
    }
}

impl RocksStore {
    /// Open (or create, unless read-only) the store at `path`
    pub fn open<P: AsRef<Path>>(path: P, options: RocksOptions) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let db = if options.read_only {
            Self::open_read_only(&path)?
        } else {
            Self::open_writable(&path, options.lock_timeout)?
        };
        let db = Arc::new(db);

        let store = Self {
            path: path.clone(),
            db: Arc::clone(&db),
            read_only: options.read_only,
            writer: Mutex::new(None),
            closed: Mutex::new(false),
        };
        store.check_version()?;

        if !options.read_only {
            let writer = WriterHandle::spawn(
                db,
                WriterConfig {
                    batch_size: options.batch_size.max(1),
                    disable_wal: options.disable_wal,
                },
            )?;
            *store.writer.lock() = Some(writer);
        }

        info!(path = %path.display(), read_only = options.read_only, "Opened store");
        Ok(store)
    }

    fn open_read_only(path: &Path) -> StoreResult<DB> {
        if !path.exists() {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }
        let names = Bucket::ALL.iter().map(|b| b.name());
        Ok(DB::open_cf_for_read_only(&db_options(), path, names, false)?)
    }

    fn open_writable(path: &Path, timeout: Duration) -> StoreResult<DB> {
        let started = Instant::now();
        loop {
            match DB::open_cf_descriptors(&db_options(), path, cf_descriptors()) {
                Ok(db) => return Ok(db),
                Err(e) if is_lock_error(&e) => {
                    if started.elapsed() >= timeout {
                        return Err(StoreError::Timeout {
                            path: path.to_path_buf(),
                            waited: started.elapsed(),
                        });
                    }
                    debug!(path = %path.display(), "Store locked, retrying");
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Refuse stores written in another format; stamp new ones
    fn check_version(&self) -> StoreResult<()> {
        let meta = self.cf(Bucket::Meta)?;
        match self.db.get_cf(meta, META_FORMAT_VERSION)? {
            Some(value) if value.as_slice() == [STORE_FORMAT_VERSION] => Ok(()),
            Some(value) => Err(StoreError::UnsupportedVersion {
                path: self.path.clone(),
                found: value.first().copied().unwrap_or(0),
                expected: STORE_FORMAT_VERSION,
            }),
            None if self.read_only => Err(StoreError::UnsupportedVersion {
                path: self.path.clone(),
                found: 0,
                expected: STORE_FORMAT_VERSION,
            }),
            None => {
                self.db
                    .put_cf(meta, META_FORMAT_VERSION, [STORE_FORMAT_VERSION])?;
                Ok(())
            }
        }
    }

    fn cf(&self, bucket: Bucket) -> StoreResult<&ColumnFamily> {
        self.db
            .cf_handle(bucket.name())
            .ok_or(StoreError::MissingBucket(bucket.name()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if *self.closed.lock() {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

impl Store for RocksStore {
    fn read_only(&self) -> bool {
        self.read_only
    }

    fn get_raw(&self, bucket: Bucket, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        Ok(self.db.get_cf(self.cf(bucket)?, key)?)
    }

    fn write(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        match self.writer.lock().as_ref() {
            Some(writer) => writer.send(ops),
            None => Err(StoreError::Closed),
        }
    }

    fn scan_raw(
        &self,
        bucket: Bucket,
        start: &[u8],
        visit: &mut dyn FnMut(&[u8], &[u8]) -> ScanControl,
    ) -> StoreResult<()> {
        self.ensure_open()?;
        let iter = self
            .db
            .iterator_cf(self.cf(bucket)?, IteratorMode::From(start, Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if visit(&key, &value) == ScanControl::Stop {
                break;
            }
        }
        Ok(())
    }

    fn last_raw(&self, bucket: Bucket) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>> {
        self.ensure_open()?;
        let mut iter = self.db.iterator_cf(self.cf(bucket)?, IteratorMode::End);
        match iter.next() {
            Some(item) => {
                let (key, value) = item?;
                Ok(Some((key.to_vec(), value.to_vec())))
            }
            None => Ok(None),
        }
    }

    fn flush(&self) -> StoreResult<()> {
        if self.read_only {
            return Ok(());
        }
        match self.writer.lock().as_ref() {
            Some(writer) => writer.flush(),
            None => Err(StoreError::Closed),
        }
    }

    fn close(&self) -> StoreResult<()> {
        let mut closed = self.closed.lock();
        if *closed {
            return Ok(());
        }
        *closed = true;

        if let Some(writer) = self.writer.lock().take() {
            writer.shutdown()?;
            self.db.flush()?;
        }
        info!(path = %self.path.display(), "Closed store");
        Ok(())
    }
}

impl Drop for RocksStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = %self.path.display(), error = %e, "Failed to close store cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LogRecord;
    use chrono::Utc;
    use tempfile::tempdir;

    #[test]
    fn test_write_flush_read() {
        let dir = tempdir().unwrap();
        let store = RocksStore::open(dir.path().join("db"), RocksOptions::default()).unwrap();

        store.set("/data", vec![1, 2, 3]).unwrap();
        store.flush().unwrap();
        assert_eq!(store.get("/data").unwrap(), Some(vec![1, 2, 3]));

        store.delete("/data").unwrap();
        store.flush().unwrap();
        assert!(store.get("/data").unwrap().is_none());
    }

    #[test]
    fn test_reopen_read_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        {
            let store = RocksStore::open(&path, RocksOptions::default()).unwrap();
            store.set("/a", vec![7]).unwrap();
            store
                .append_log(&LogRecord {
                    start: Utc::now(),
                    stop: Utc::now(),
                    summary: "done".into(),
                })
                .unwrap();
            store.close().unwrap();
        }

        let first = RocksStore::open(&path, RocksOptions::read_only()).unwrap();
        let second = RocksStore::open(&path, RocksOptions::read_only()).unwrap();
        assert_eq!(first.get("/a").unwrap(), Some(vec![7]));
        assert_eq!(second.last_log().unwrap().unwrap().summary, "done");
        assert!(matches!(first.set("/b", vec![]), Err(StoreError::ReadOnly)));
    }

    #[test]
    fn test_read_only_missing_store() {
        let dir = tempdir().unwrap();
        let err = RocksStore::open(dir.path().join("none"), RocksOptions::read_only()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_second_writer_times_out() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        let _owner = RocksStore::open(&path, RocksOptions::default()).unwrap();

        let err = RocksStore::open(
            &path,
            RocksOptions {
                lock_timeout: Duration::from_millis(250),
                ..RocksOptions::default()
            },
        )
        .unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_version_mismatch_refuses_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        {
            let store = RocksStore::open(&path, RocksOptions::default()).unwrap();
            store
                .write(vec![WriteOp::Put {
                    bucket: Bucket::Meta,
                    key: META_FORMAT_VERSION.to_vec(),
                    value: vec![9],
                }])
                .unwrap();
            store.close().unwrap();
        }

        let err = RocksStore::open(&path, RocksOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::UnsupportedVersion {
                found: 9,
                expected: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_writes_after_close_fail() {
        let dir = tempdir().unwrap();
        let store = RocksStore::open(dir.path().join("db"), RocksOptions::default()).unwrap();
        store.close().unwrap();
        assert!(matches!(store.set("/a", vec![]), Err(StoreError::Closed)));
    }

    #[test]
    fn test_lock_message_classification() {
        assert!(is_lock_message(
            "IO error: While lock file: /tmp/db/LOCK: Resource temporarily unavailable"
        ));
        assert!(is_lock_message(
            "IO error: lock hold by current process, acquire time 1700000000"
        ));
        assert!(!is_lock_message(
            "Corruption: block checksum mismatch: stored = 1, computed = 2"
        ));
        assert!(!is_lock_message("Invalid argument: Column family not found: blocks"));
    }

    #[test]
    fn test_non_lock_open_error_fails_fast() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        std::fs::write(&path, b"not a store").unwrap();

        let started = Instant::now();
        let err = RocksStore::open(
            &path,
            RocksOptions {
                lock_timeout: Duration::from_secs(30),
                ..RocksOptions::default()
            },
        )
        .unwrap_err();
        assert!(!err.is_timeout());
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
