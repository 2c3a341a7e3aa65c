//! RocksDB writer thread
//!
//! All writes to a RocksDB store go through one dedicated thread that
//! coalesces queued operations into bounded `WriteBatch`es. Callers only
//! block on the bounded channel (backpressure) or on an explicit flush.

use super::{Bucket, WriteOp};
use crate::error::{StoreError, StoreResult, WorkerError};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use rocksdb::{WriteBatch, WriteOptions, DB};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Queue depth between producers and the writer thread
const CHANNEL_CAPACITY: usize = 1024;

/// Configuration for the writer thread
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Operations per committed batch
    pub batch_size: usize,
    /// Skip the write-ahead log
    pub disable_wal: bool,
}

pub(crate) enum WriterMessage {
    Ops(Vec<WriteOp>),
    /// Commit everything queued so far and report the outcome
    Flush(Sender<StoreResult<()>>),
    Shutdown,
}

/// Handle to a running writer thread
pub(crate) struct WriterHandle {
    tx: Sender<WriterMessage>,
    thread: Option<JoinHandle<()>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl WriterHandle {
    pub fn spawn(db: Arc<DB>, config: WriterConfig) -> StoreResult<Self> {
        let (tx, rx) = bounded(CHANNEL_CAPACITY);
        let failure = Arc::new(Mutex::new(None));
        let thread_failure = Arc::clone(&failure);

        let thread = thread::Builder::new()
            .name("store-writer".to_string())
            .spawn(move || writer_loop(db, rx, config, thread_failure))
            .map_err(|e| {
                StoreError::Writer(
                    WorkerError::SpawnFailed {
                        name: "store-writer".into(),
                        reason: e.to_string(),
                    }
                    .to_string(),
                )
            })?;

        Ok(Self {
            tx,
            thread: Some(thread),
            failure,
        })
    }

    fn check(&self) -> StoreResult<()> {
        match self.failure.lock().as_ref() {
            Some(msg) => Err(StoreError::Writer(msg.clone())),
            None => Ok(()),
        }
    }

    pub fn send(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
        self.check()?;
        self.tx
            .send(WriterMessage::Ops(ops))
            .map_err(|_| StoreError::Writer("writer thread exited".into()))
    }

    /// Block until every queued operation is committed
    pub fn flush(&self) -> StoreResult<()> {
        let (ack_tx, ack_rx) = bounded(1);
        self.tx
            .send(WriterMessage::Flush(ack_tx))
            .map_err(|_| StoreError::Writer("writer thread exited".into()))?;
        ack_rx
            .recv()
            .map_err(|_| StoreError::Writer("writer thread exited".into()))?
    }

    /// Commit pending writes and stop the thread
    pub fn shutdown(mut self) -> StoreResult<()> {
        let _ = self.tx.send(WriterMessage::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                return Err(StoreError::Writer(
                    WorkerError::Panicked {
                        name: "store-writer".into(),
                    }
                    .to_string(),
                ));
            }
        }
        self.check()
    }
}

struct PendingBatch {
    batch: WriteBatch,
    ops: usize,
}

impl PendingBatch {
    fn new() -> Self {
        Self {
            batch: WriteBatch::default(),
            ops: 0,
        }
    }
}

/// Accumulates operations and commits a batch every `batch_size` ops,
/// splitting large messages across several batches
struct BatchWriter<'a> {
    db: &'a DB,
    write_opts: WriteOptions,
    batch_size: usize,
    pending: PendingBatch,
    total_ops: u64,
    batches: u64,
    largest_batch: usize,
}

impl<'a> BatchWriter<'a> {
    fn new(db: &'a DB, config: &WriterConfig) -> Self {
        let mut write_opts = WriteOptions::default();
        if config.disable_wal {
            write_opts.disable_wal(true);
        }
        Self {
            db,
            write_opts,
            batch_size: config.batch_size.max(1),
            pending: PendingBatch::new(),
            total_ops: 0,
            batches: 0,
            largest_batch: 0,
        }
    }

    fn append(&mut self, ops: Vec<WriteOp>) -> StoreResult<()> {
        for op in ops {
            match op {
                WriteOp::Put { bucket, key, value } => {
                    self.pending.batch.put_cf(cf(self.db, bucket)?, key, value);
                }
                WriteOp::Delete { bucket, key } => {
                    self.pending.batch.delete_cf(cf(self.db, bucket)?, key);
                }
            }
            self.pending.ops += 1;
            if self.pending.ops >= self.batch_size {
                self.commit()?;
            }
        }
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        if self.pending.ops == 0 {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.pending.batch);
        let ops = std::mem::take(&mut self.pending.ops);
        self.total_ops += ops as u64;
        self.batches += 1;
        self.largest_batch = self.largest_batch.max(ops);
        self.db.write_opt(batch, &self.write_opts)?;
        Ok(())
    }
}

fn writer_loop(
    db: Arc<DB>,
    rx: Receiver<WriterMessage>,
    config: WriterConfig,
    failure: Arc<Mutex<Option<String>>>,
) {
    debug!("Store writer thread started");

    let mut writer = BatchWriter::new(&db, &config);

    let record_failure = |err: StoreError| {
        error!(error = %err, "Store write failed; further writes are rejected");
        let mut slot = failure.lock();
        if slot.is_none() {
            *slot = Some(err.to_string());
        }
    };

    while let Ok(msg) = rx.recv() {
        match msg {
            WriterMessage::Ops(ops) => {
                if failure.lock().is_some() {
                    continue;
                }
                if let Err(e) = writer.append(ops) {
                    record_failure(e);
                }
            }
            WriterMessage::Flush(ack) => {
                let result = match writer.commit() {
                    Ok(()) => match failure.lock().as_ref() {
                        Some(msg) => Err(StoreError::Writer(msg.clone())),
                        None => Ok(()),
                    },
                    Err(e) => {
                        let msg = e.to_string();
                        record_failure(e);
                        Err(StoreError::Writer(msg))
                    }
                };
                let _ = ack.send(result);
            }
            WriterMessage::Shutdown => break,
        }
    }

    if let Err(e) = writer.commit() {
        record_failure(e);
    }

    info!(
        ops = writer.total_ops,
        batches = writer.batches,
        largest_batch = writer.largest_batch,
        "Store writer thread finished"
    );
}

fn cf(db: &DB, bucket: Bucket) -> StoreResult<&rocksdb::ColumnFamily> {
    db.cf_handle(bucket.name())
        .ok_or(StoreError::MissingBucket(bucket.name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocksdb::Options;
    use tempfile::tempdir;

    fn open_db(path: &std::path::Path) -> DB {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        DB::open_cf(&opts, path, Bucket::ALL.iter().map(|b| b.name())).unwrap()
    }

    fn puts(count: usize) -> Vec<WriteOp> {
        (0..count)
            .map(|i| WriteOp::Put {
                bucket: Bucket::Prefixes,
                key: format!("/k/{:05}", i).into_bytes(),
                value: vec![1],
            })
            .collect()
    }

    #[test]
    fn test_large_message_split_into_bounded_batches() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        let config = WriterConfig {
            batch_size: 100,
            disable_wal: false,
        };
        let mut writer = BatchWriter::new(&db, &config);

        writer.append(puts(10_000)).unwrap();
        writer.commit().unwrap();

        assert_eq!(writer.total_ops, 10_000);
        assert_eq!(writer.batches, 100);
        assert_eq!(writer.largest_batch, 100);
    }

    #[test]
    fn test_partial_batch_waits_for_commit() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        let config = WriterConfig {
            batch_size: 100,
            disable_wal: false,
        };
        let mut writer = BatchWriter::new(&db, &config);

        writer.append(puts(150)).unwrap();
        assert_eq!(writer.batches, 1);
        assert_eq!(writer.pending.ops, 50);

        let cf = db.cf_handle(Bucket::Prefixes.name()).unwrap();
        assert!(db.get_cf(cf, b"/k/00149").unwrap().is_none());

        writer.commit().unwrap();
        assert!(db.get_cf(cf, b"/k/00149").unwrap().is_some());
        assert_eq!(writer.largest_batch, 100);
    }
}
