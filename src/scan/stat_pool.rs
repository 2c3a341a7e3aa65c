//! Bounded pool for metadata fetches in large directories
//!
//! Small directories are stat'ed inline by the directory worker. Once a
//! directory has more entries than the configured threshold, its lstat
//! calls are fanned out to a fixed set of threads shared by the whole
//! scan, so the number of outstanding lstat calls never exceeds the pool
//! size no matter how many directory workers are busy.
//!
//! ```text
//! dir worker ──(seq, path)──▶ job channel ──▶ stat-0 .. stat-N
//!     ▲                                            │
//!     └──── ReorderBuffer ◀── reply channel ◀──────┘
//! ```

use super::sequencer::ReorderBuffer;
use crate::error::{FsResult, Result, WalkerError, WorkerError};
use crate::fs::{join_path, FileStat, FileSystem};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace};

struct StatJob {
    seq: usize,
    path: String,
    reply: Sender<(usize, FsResult<FileStat>)>,
}

/// Shared lstat pool
pub struct StatPool {
    fs: Arc<dyn FileSystem>,
    threshold: usize,
    jobs: Option<Sender<StatJob>>,
    threads: Vec<JoinHandle<()>>,
}

impl StatPool {
    /// Start `workers` stat threads; directories with more than `threshold`
    /// entries use them
    pub fn new(fs: Arc<dyn FileSystem>, workers: usize, threshold: usize) -> Result<Self> {
        let workers = workers.max(1);
        let (tx, rx) = bounded::<StatJob>(workers * 4);

        let mut threads = Vec::with_capacity(workers);
        for id in 0..workers {
            let rx = rx.clone();
            let fs = Arc::clone(&fs);
            let handle = thread::Builder::new()
                .name(format!("stat-{}", id))
                .spawn(move || stat_loop(fs, rx))
                .map_err(|e| WorkerError::SpawnFailed {
                    name: format!("stat-{}", id),
                    reason: e.to_string(),
                })?;
            threads.push(handle);
        }

        debug!(workers, threshold, "Stat pool started");
        Ok(Self {
            fs,
            threshold,
            jobs: Some(tx),
            threads,
        })
    }

    /// Stat every name in `dir`, returning results in the order given
    ///
    /// Returns `Cancelled` as soon as `cancelled()` reports true; the
    /// partial results are discarded.
    pub fn fetch<F>(&self, dir: &str, names: &[String], cancelled: F) -> Result<Vec<FsResult<FileStat>>>
    where
        F: Fn() -> bool,
    {
        if names.len() <= self.threshold {
            let mut results = Vec::with_capacity(names.len());
            for name in names {
                if cancelled() {
                    return Err(WalkerError::Cancelled);
                }
                results.push(self.fs.lstat(&join_path(dir, name)));
            }
            return Ok(results);
        }

        let jobs = self.jobs.as_ref().ok_or(WalkerError::Cancelled)?;
        trace!(dir = %dir, entries = names.len(), "Fetching through stat pool");

        let (reply_tx, reply_rx) = unbounded();
        let mut submitted = 0;
        for (seq, name) in names.iter().enumerate() {
            if cancelled() {
                break;
            }
            let job = StatJob {
                seq,
                path: join_path(dir, name),
                reply: reply_tx.clone(),
            };
            if jobs.send(job).is_err() {
                break;
            }
            submitted += 1;
        }
        // Replies stop once every submitted job has answered
        drop(reply_tx);

        let mut reorder = ReorderBuffer::new();
        let mut results = Vec::with_capacity(submitted);
        for (seq, result) in reply_rx.iter() {
            reorder.push(seq, result);
            while let Some(ready) = reorder.pop_ready() {
                results.push(ready);
            }
        }

        if results.len() < names.len() {
            return Err(WalkerError::Cancelled);
        }
        Ok(results)
    }
}

impl Drop for StatPool {
    fn drop(&mut self) {
        self.jobs.take();
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

fn stat_loop(fs: Arc<dyn FileSystem>, rx: Receiver<StatJob>) {
    while let Ok(job) = rx.recv() {
        let result = fs.lstat(&job.path);
        // The requester may have gone away after cancellation
        let _ = job.reply.send((job.seq, result));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FsError;
    use crate::fs::DirEntry;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Every path stats as a file whose size is the trailing number; slower
    /// for low numbers so completions arrive out of order
    struct SlowFs {
        calls: AtomicUsize,
    }

    impl FileSystem for SlowFs {
        fn lstat(&self, path: &str) -> FsResult<FileStat> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let n: i64 = path
                .rsplit('/')
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| FsError::NotFound { path: path.into() })?;
            thread::sleep(Duration::from_micros(((50 - n.min(50)) * 20) as u64));
            Ok(FileStat {
                size: n,
                mode: 0o100644,
                mtime: Utc.timestamp_opt(0, 0).unwrap(),
                uid: 0,
                gid: 0,
                device: 0,
                inode: n as u64,
                blocks: 0,
            })
        }

        fn list_directory(&self, _path: &str) -> FsResult<Vec<DirEntry>> {
            Ok(Vec::new())
        }
    }

    fn pool(threshold: usize) -> (Arc<SlowFs>, StatPool) {
        let fs = Arc::new(SlowFs {
            calls: AtomicUsize::new(0),
        });
        let pool = StatPool::new(fs.clone(), 4, threshold).unwrap();
        (fs, pool)
    }

    #[test]
    fn test_pool_preserves_submission_order() {
        let (_, pool) = pool(2);
        let mut names: Vec<String> = (0..40).map(|i| i.to_string()).collect();
        names.push("bad".into());

        let results = pool.fetch("/d", &names, || false).unwrap();
        assert_eq!(results.len(), 41);
        for (i, result) in results.iter().take(40).enumerate() {
            assert_eq!(result.as_ref().unwrap().size, i as i64);
        }
        assert!(results[40].is_err());
    }

    #[test]
    fn test_small_directory_is_inline() {
        let (fs, pool) = pool(10);
        let names: Vec<String> = vec!["1".into(), "2".into()];
        let results = pool.fetch("/d", &names, || false).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(fs.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cancel_stops_submitting() {
        let (fs, pool) = pool(0);
        let names: Vec<String> = (0..100).map(|i| i.to_string()).collect();
        let err = pool.fetch("/d", &names, || true).unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(fs.calls.load(Ordering::SeqCst), 0);
    }
}
