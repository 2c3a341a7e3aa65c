//! Incremental scan engine
//!
//! Directories are processed by a pool of work-stealing workers. For each
//! directory the worker decides, from the record persisted by an earlier
//! run, whether the directory can be reused as-is or must be listed and
//! stat'ed again:
//!
//! ```text
//! Discovered ─▶ excluded? ──yes──▶ SkippedExcluded
//!                  │no
//!                  ▼
//!                lstat ──EACCES──▶ SkippedPermission
//!                  │  ──ENOENT──▶ subtree deleted
//!                  │  ──other───▶ Failed (error record)
//!                  ▼
//!        incremental && record matches mtime+mode?
//!          │yes                         │no
//!          ▼                            ▼
//!    UnchangedReuse               Rescan ─▶ list, stat, build, persist
//!    (descend stored subdirs)           (diff children, queue subdirs)
//! ```
//!
//! Per-directory failures are isolated. Store failures and cancellation
//! stop the whole walk.

use super::stat_pool::StatPool;
use crate::config::ExcludeFilter;
use crate::error::{FsError, Result, WalkerError, WorkerError};
use crate::fs::{is_within, join_path, FileStat, FileSystem};
use crate::prefix::{ChildEntry, FileEntry, PrefixBuilder, PrefixInfo};
use crate::store::{ErrorRecord, ScanControl, StoreHandle};
use crossbeam_deque::{Injector, Steal, Stealer, Worker as DequeWorker};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Where previously persisted records are read from
#[derive(Clone)]
pub enum Baseline {
    /// Fresh index; every directory is scanned
    None,
    /// Records are read from and written to the same store
    SameStore,
    /// Records are read from a previous store and copied into the target
    Separate(StoreHandle),
}

/// Scan tuning
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Directory workers
    pub workers: usize,
    /// Threads in the shared lstat pool
    pub stat_workers: usize,
    /// Directories with more entries than this use the lstat pool
    pub large_dir_threshold: usize,
    /// Do not descend below this depth (root is 0)
    pub max_depth: Option<usize>,
    /// Reuse unchanged directories from the baseline
    pub incremental: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().max(1),
            stat_workers: 16,
            large_dir_threshold: 256,
            max_depth: None,
            incremental: true,
        }
    }
}

/// Directory work item
#[derive(Debug, Clone)]
struct DirTask {
    path: String,
    depth: usize,
    /// Already fetched by the parent's rescan
    stat: Option<FileStat>,
}

/// Terminal state of one directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirOutcome {
    SkippedExcluded,
    SkippedPermission,
    Failed,
    Vanished,
    UnchangedReuse,
    Scanned,
}

/// Result of a scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Directories listed and re-recorded
    pub scanned: u64,
    /// Directories whose record was reused
    pub reused: u64,
    pub excluded: u64,
    pub permission_skipped: u64,
    /// Directories that could not be stat'ed or listed
    pub failed: u64,
    /// Directory records removed because the directory is gone
    pub deleted: u64,
    /// Non-directory entries seen (scanned or reused)
    pub files: u64,
    pub bytes: u64,
    /// Error records written
    pub errors: u64,
    /// Stored records that could not be decoded
    pub decode_failures: u64,
    pub duration: Duration,
    pub completed: bool,
}

impl fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scanned={} reused={} excluded={} permission_skipped={} failed={} deleted={} \
             files={} bytes={} errors={} decode_failures={} secs={:.3} completed={}",
            self.scanned,
            self.reused,
            self.excluded,
            self.permission_skipped,
            self.failed,
            self.deleted,
            self.files,
            self.bytes,
            self.errors,
            self.decode_failures,
            self.duration.as_secs_f64(),
            self.completed
        )
    }
}

/// Live progress for display
#[derive(Debug, Clone, Default)]
pub struct ScanProgress {
    pub scanned: u64,
    pub reused: u64,
    pub files: u64,
    pub bytes: u64,
    pub errors: u64,
    pub active_workers: usize,
    pub total_workers: usize,
    pub elapsed: Duration,
}

impl ScanProgress {
    pub fn dirs_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.scanned + self.reused) as f64 / secs
        } else {
            0.0
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    scanned: AtomicU64,
    reused: AtomicU64,
    excluded: AtomicU64,
    permission_skipped: AtomicU64,
    failed: AtomicU64,
    deleted: AtomicU64,
    files: AtomicU64,
    bytes: AtomicU64,
    errors: AtomicU64,
    decode_failures: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// State shared by all workers of one scanner
struct Shared {
    fs: Arc<dyn FileSystem>,
    target: StoreHandle,
    baseline: Baseline,
    filter: Arc<ExcludeFilter>,
    options: ScanOptions,
    shutdown: Arc<AtomicBool>,
    /// Set on the first fatal error
    abort: AtomicBool,
    fatal: Mutex<Option<WalkerError>>,
    counters: Counters,
    active_workers: AtomicUsize,
}

impl Shared {
    fn is_stopping(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed) || self.abort.load(Ordering::Relaxed)
    }

    fn fail(&self, err: WalkerError) {
        let mut slot = self.fatal.lock();
        if slot.is_none() {
            error!(error = %err, "Scan aborted");
            *slot = Some(err);
        }
        self.abort.store(true, Ordering::SeqCst);
    }
}

/// Incremental scanner over one filesystem into one store
pub struct Scanner {
    shared: Arc<Shared>,
}

impl Scanner {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        target: StoreHandle,
        baseline: Baseline,
        filter: Arc<ExcludeFilter>,
        options: ScanOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                fs,
                target,
                baseline,
                filter,
                options,
                shutdown: Arc::new(AtomicBool::new(false)),
                abort: AtomicBool::new(false),
                fatal: Mutex::new(None),
                counters: Counters::default(),
                active_workers: AtomicUsize::new(0),
            }),
        }
    }

    /// Use an externally owned shutdown flag (e.g. set by a signal handler)
    ///
    /// Worker threads only hold the shared state while `run` executes, so a
    /// scanner taken by value is its sole owner.
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        match Arc::get_mut(&mut self.shared) {
            Some(shared) => shared.shutdown = shutdown,
            None => {
                debug_assert!(false, "scanner state shared while configuring shutdown");
                warn!("Scanner state is shared; external shutdown flag not installed");
            }
        }
        self
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shared.shutdown)
    }

    pub fn progress(&self, elapsed: Duration) -> ScanProgress {
        progress_of(&self.shared, elapsed)
    }

    /// Counters so far, e.g. after a cancelled run
    pub fn summary(&self, duration: Duration) -> ScanSummary {
        let c = &self.shared.counters;
        ScanSummary {
            scanned: c.scanned.load(Ordering::Relaxed),
            reused: c.reused.load(Ordering::Relaxed),
            excluded: c.excluded.load(Ordering::Relaxed),
            permission_skipped: c.permission_skipped.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            deleted: c.deleted.load(Ordering::Relaxed),
            files: c.files.load(Ordering::Relaxed),
            bytes: c.bytes.load(Ordering::Relaxed),
            errors: c.errors.load(Ordering::Relaxed),
            decode_failures: c.decode_failures.load(Ordering::Relaxed),
            duration,
            completed: false,
        }
    }

    /// Walk the tree below `root`
    pub fn run(&self, root: &str) -> Result<ScanSummary> {
        let start = Instant::now();
        let shared = &self.shared;
        let root = normalize_root(root);
        let worker_count = shared.options.workers.max(1);

        info!(
            root = %root,
            workers = worker_count,
            incremental = shared.options.incremental,
            "Starting scan"
        );

        let pool = Arc::new(StatPool::new(
            Arc::clone(&shared.fs),
            shared.options.stat_workers,
            shared.options.large_dir_threshold,
        )?);

        // Work-stealing deque for directories
        let injector: Arc<Injector<DirTask>> = Arc::new(Injector::new());
        // Queued plus in-progress directories
        let pending_work = Arc::new(AtomicU64::new(1));
        injector.push(DirTask {
            path: root.clone(),
            depth: 0,
            stat: None,
        });

        let mut workers_local: Vec<DequeWorker<DirTask>> = Vec::new();
        let mut stealers: Vec<Stealer<DirTask>> = Vec::new();
        for _ in 0..worker_count {
            let w = DequeWorker::new_fifo();
            stealers.push(w.stealer());
            workers_local.push(w);
        }
        let stealers = Arc::new(stealers);

        let mut handles: Vec<JoinHandle<()>> = Vec::new();
        for (id, local) in workers_local.into_iter().enumerate() {
            let shared = Arc::clone(shared);
            let pool = Arc::clone(&pool);
            let injector = Arc::clone(&injector);
            let stealers = Arc::clone(&stealers);
            let pending_work = Arc::clone(&pending_work);

            let spawned = thread::Builder::new()
                .name(format!("scan-{}", id))
                .spawn(move || {
                    worker_loop(id, &shared, &pool, local, &injector, &stealers, &pending_work)
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    self.shared.fail(
                        WorkerError::SpawnFailed {
                            name: format!("scan-{}", id),
                            reason: e.to_string(),
                        }
                        .into(),
                    );
                    break;
                }
            }
        }

        for (id, handle) in handles.into_iter().enumerate() {
            if handle.join().is_err() {
                shared.fail(
                    WorkerError::Panicked {
                        name: format!("scan-{}", id),
                    }
                    .into(),
                );
            }
        }
        drop(pool);

        if let Some(err) = shared.fatal.lock().take() {
            // Keep whatever was queued; the run is reported as failed anyway
            if let Err(e) = shared.target.flush() {
                warn!(error = %e, "Flush after failed scan also failed");
            }
            return Err(err);
        }

        // Pending batches are committed before reporting either outcome
        shared.target.flush()?;

        if shared.shutdown.load(Ordering::Relaxed) {
            info!("Scan cancelled");
            return Err(WalkerError::Cancelled);
        }

        let mut summary = self.summary(start.elapsed());
        summary.completed = true;

        info!(
            scanned = summary.scanned,
            reused = summary.reused,
            deleted = summary.deleted,
            errors = summary.errors,
            secs = summary.duration.as_secs_f64(),
            "Scan complete"
        );
        Ok(summary)
    }

    /// Run while reporting progress to `progress_callback` every 100ms
    pub fn run_with_progress<F>(&self, root: &str, progress_callback: F) -> Result<ScanSummary>
    where
        F: Fn(ScanProgress) + Send + 'static,
    {
        let start = Instant::now();
        let done = Arc::new(AtomicBool::new(false));
        let shared = Arc::clone(&self.shared);
        let done_flag = Arc::clone(&done);

        let progress_handle = thread::spawn(move || {
            while !done_flag.load(Ordering::Relaxed) {
                progress_callback(progress_of(&shared, start.elapsed()));
                thread::sleep(Duration::from_millis(100));
            }
        });

        let result = self.run(root);

        done.store(true, Ordering::SeqCst);
        let _ = progress_handle.join();

        result
    }
}

fn progress_of(shared: &Shared, elapsed: Duration) -> ScanProgress {
    let c = &shared.counters;
    ScanProgress {
        scanned: c.scanned.load(Ordering::Relaxed),
        reused: c.reused.load(Ordering::Relaxed),
        files: c.files.load(Ordering::Relaxed),
        bytes: c.bytes.load(Ordering::Relaxed),
        errors: c.errors.load(Ordering::Relaxed),
        active_workers: shared.active_workers.load(Ordering::Relaxed),
        total_workers: shared.options.workers.max(1),
        elapsed,
    }
}

fn normalize_root(root: &str) -> String {
    let trimmed = root.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Worker thread: pop a directory, process it, push its subdirectories
fn worker_loop(
    id: usize,
    shared: &Shared,
    pool: &StatPool,
    local: DequeWorker<DirTask>,
    injector: &Injector<DirTask>,
    stealers: &[Stealer<DirTask>],
    pending_work: &AtomicU64,
) {
    debug!("Worker {} started", id);

    let mut idle_spins = 0;
    const MAX_IDLE_SPINS: u32 = 1000;

    loop {
        if shared.is_stopping() {
            break;
        }

        // Local queue first, then the injector, then steal
        let task = local.pop().or_else(|| {
            loop {
                match injector.steal_batch_and_pop(&local) {
                    Steal::Success(t) => return Some(t),
                    Steal::Empty => break,
                    Steal::Retry => continue,
                }
            }
            for (i, stealer) in stealers.iter().enumerate() {
                if i == id {
                    continue;
                }
                loop {
                    match stealer.steal() {
                        Steal::Success(t) => return Some(t),
                        Steal::Empty => break,
                        Steal::Retry => continue,
                    }
                }
            }
            None
        });

        let task = match task {
            Some(t) => {
                idle_spins = 0;
                t
            }
            None => {
                if pending_work.load(Ordering::SeqCst) == 0 {
                    break;
                }
                idle_spins += 1;
                if idle_spins > MAX_IDLE_SPINS {
                    thread::sleep(Duration::from_micros(100));
                    idle_spins = 0;
                }
                continue;
            }
        };

        shared.active_workers.fetch_add(1, Ordering::Relaxed);
        match process_directory(shared, pool, &task) {
            Ok((outcome, subdirs)) => {
                trace!(worker = id, path = %task.path, ?outcome, "Directory done");
                for sub in subdirs {
                    pending_work.fetch_add(1, Ordering::SeqCst);
                    local.push(sub);
                }
            }
            Err(WalkerError::Cancelled) => {}
            Err(e) => shared.fail(e),
        }
        shared.active_workers.fetch_sub(1, Ordering::Relaxed);

        // Mark this work item as done
        pending_work.fetch_sub(1, Ordering::SeqCst);
    }

    debug!("Worker {} finished", id);
}

/// Run one directory through the state machine
fn process_directory(
    shared: &Shared,
    pool: &StatPool,
    task: &DirTask,
) -> Result<(DirOutcome, Vec<DirTask>)> {
    let path = task.path.as_str();
    let counters = &shared.counters;

    if shared.filter.is_excluded(path) {
        debug!(path = %path, "Excluded");
        Counters::bump(&counters.excluded);
        return Ok((DirOutcome::SkippedExcluded, Vec::new()));
    }

    let stat = match &task.stat {
        Some(stat) => stat.clone(),
        None => match shared.fs.lstat(path) {
            Ok(stat) => stat,
            Err(e) => return handle_fs_error(shared, path, e).map(|o| (o, Vec::new())),
        },
    };

    if !stat.is_dir() {
        // Replaced by a non-directory since it was listed
        remove_subtree(shared, path)?;
        return Ok((DirOutcome::Vanished, Vec::new()));
    }

    let previous = load_previous(shared, path)?;

    if shared.options.incremental {
        if let Some((prev, raw)) = &previous {
            if prev.unchanged_stat(&stat) {
                return reuse(shared, task, prev, raw);
            }
        }
    }

    rescan(shared, pool, task, &stat, previous.map(|(prev, _)| prev))
}

fn handle_fs_error(shared: &Shared, path: &str, err: FsError) -> Result<DirOutcome> {
    let counters = &shared.counters;
    match err {
        FsError::PermissionDenied { .. } => {
            warn!(path = %path, "Permission denied, skipping");
            Counters::bump(&counters.permission_skipped);
            Ok(DirOutcome::SkippedPermission)
        }
        ref e if e.is_vanished() => {
            debug!(path = %path, error = %e, "Directory vanished");
            remove_subtree(shared, path)?;
            Ok(DirOutcome::Vanished)
        }
        e => {
            warn!(path = %path, error = %e, "Directory failed");
            Counters::bump(&counters.failed);
            record_error(shared, path, e.to_string())?;
            Ok(DirOutcome::Failed)
        }
    }
}

/// Stored record for `path` plus its raw bytes; undecodable records count
/// as absent
fn load_previous(shared: &Shared, path: &str) -> Result<Option<(PrefixInfo, Vec<u8>)>> {
    let raw = match &shared.baseline {
        Baseline::None => return Ok(None),
        Baseline::SameStore => shared.target.get(path)?,
        Baseline::Separate(store) => store.get(path)?,
    };
    let Some(raw) = raw else {
        return Ok(None);
    };

    match PrefixInfo::decode(&raw) {
        Ok(info) => Ok(Some((info, raw))),
        Err(e) => {
            debug!(path = %path, error = %e, "Stored record undecodable, rescanning");
            Counters::bump(&shared.counters.decode_failures);
            Ok(None)
        }
    }
}

fn within_depth(shared: &Shared, depth: usize) -> bool {
    shared.options.max_depth.map_or(true, |max| depth <= max)
}

fn reuse(
    shared: &Shared,
    task: &DirTask,
    prev: &PrefixInfo,
    raw: &[u8],
) -> Result<(DirOutcome, Vec<DirTask>)> {
    let counters = &shared.counters;

    if matches!(shared.baseline, Baseline::Separate(_)) {
        shared.target.set(&task.path, raw.to_vec())?;
    }

    Counters::bump(&counters.reused);
    let (files, bytes) = file_totals(prev.files().iter());
    counters.files.fetch_add(files, Ordering::Relaxed);
    counters.bytes.fetch_add(bytes, Ordering::Relaxed);

    let depth = task.depth + 1;
    let subdirs = if within_depth(shared, depth) {
        prev.subdirs()
            .map(|child| DirTask {
                path: join_path(&task.path, &child.name),
                depth,
                stat: None,
            })
            .collect()
    } else {
        Vec::new()
    };

    trace!(path = %task.path, subdirs = subdirs.len(), "Reused");
    Ok((DirOutcome::UnchangedReuse, subdirs))
}

fn rescan(
    shared: &Shared,
    pool: &StatPool,
    task: &DirTask,
    stat: &FileStat,
    previous: Option<PrefixInfo>,
) -> Result<(DirOutcome, Vec<DirTask>)> {
    let path = task.path.as_str();
    let counters = &shared.counters;

    let listing = match shared.fs.list_directory(path) {
        Ok(listing) => listing,
        Err(e) => return handle_fs_error(shared, path, e).map(|o| (o, Vec::new())),
    };

    let names: Vec<String> = listing.iter().map(|e| e.name.clone()).collect();
    let results = pool.fetch(path, &names, || shared.is_stopping())?;

    let mut builder = PrefixBuilder::new(stat);
    let mut children = Vec::with_capacity(listing.len());
    let mut subdirs = Vec::new();
    let mut failures = Vec::new();
    let depth = task.depth + 1;
    let descend = within_depth(shared, depth);

    for (entry, result) in listing.into_iter().zip(results) {
        match result {
            Ok(child_stat) => {
                let file = FileEntry::from_stat(entry.name.as_str(), &child_stat);
                // lstat is authoritative over the listing's type
                children.push(ChildEntry::new(entry.name, file.entry_type));
                if child_stat.is_dir() && descend {
                    subdirs.push(DirTask {
                        path: join_path(path, &file.name),
                        depth,
                        stat: Some(child_stat),
                    });
                }
                builder.append_file(file);
            }
            Err(e) if e.is_vanished() => {
                trace!(path = %path, name = %entry.name, "Entry vanished before stat");
            }
            Err(e) => {
                children.push(ChildEntry::from(entry));
                failures.push(e.to_string());
            }
        }
    }
    builder.append_child_entries(children);

    let info = builder.finalize()?;
    let (files, bytes) = file_totals(info.files().iter());
    shared.target.set(path, info.encode())?;

    if !failures.is_empty() {
        debug!(path = %path, failed = failures.len(), "Some entries could not be stat'ed");
        record_error(shared, path, failures.join("; "))?;
    }

    if let Some(prev) = previous {
        let current: HashSet<&str> = info.subdirs().map(|c| c.name.as_str()).collect();
        for gone in prev.subdirs().filter(|c| !current.contains(c.name.as_str())) {
            remove_subtree(shared, &join_path(path, &gone.name))?;
        }
    }

    Counters::bump(&counters.scanned);
    counters.files.fetch_add(files, Ordering::Relaxed);
    counters.bytes.fetch_add(bytes, Ordering::Relaxed);

    Ok((DirOutcome::Scanned, subdirs))
}

fn file_totals<'a>(files: impl Iterator<Item = &'a FileEntry>) -> (u64, u64) {
    files
        .filter(|f| !f.entry_type.is_dir())
        .fold((0, 0), |(n, b), f| (n + 1, b + f.size.max(0) as u64))
}

fn record_error(shared: &Shared, path: &str, detail: String) -> Result<()> {
    shared
        .target
        .append_error(&ErrorRecord::new(path, detail))?;
    Counters::bump(&shared.counters.errors);
    Ok(())
}

/// Remove the records of a directory that no longer exists
fn remove_subtree(shared: &Shared, path: &str) -> Result<()> {
    let removed = match &shared.baseline {
        Baseline::Separate(store) => {
            // The target never received these records; count what the
            // previous index held
            let mut n = 0u64;
            store.scan(path, &mut |key, _| {
                if is_within(key, path) {
                    n += 1;
                }
                ScanControl::Continue
            })?;
            shared.target.delete_prefix(path)?;
            n
        }
        _ => shared.target.delete_prefix(path)?,
    };

    if removed > 0 {
        debug!(path = %path, removed, "Removed records of deleted subtree");
        shared.counters.deleted.fetch_add(removed, Ordering::Relaxed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_shutdown_flag_cancels_run() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let root = dir.path().to_string_lossy().into_owned();

        let external = Arc::new(AtomicBool::new(false));
        let target: StoreHandle = Arc::new(crate::store::MemoryStore::new());
        let scanner = Scanner::new(
            Arc::new(crate::fs::LocalFs::new()),
            Arc::clone(&target),
            Baseline::SameStore,
            Arc::new(ExcludeFilter::new()),
            ScanOptions {
                workers: 2,
                ..ScanOptions::default()
            },
        )
        .with_shutdown(Arc::clone(&external));
        assert!(Arc::ptr_eq(&scanner.shutdown_flag(), &external));

        external.store(true, Ordering::SeqCst);
        assert!(matches!(scanner.run(&root), Err(WalkerError::Cancelled)));
        assert!(target.get(&root).unwrap().is_none());
    }

    #[test]
    fn test_normalize_root() {
        assert_eq!(normalize_root("/data/"), "/data");
        assert_eq!(normalize_root("/"), "/");
        assert_eq!(normalize_root("rel/dir"), "rel/dir");
    }

    #[test]
    fn test_progress_rate() {
        let progress = ScanProgress {
            scanned: 60,
            reused: 40,
            elapsed: Duration::from_secs(10),
            ..Default::default()
        };
        assert!((progress.dirs_per_second() - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_file_totals_skip_directories() {
        use crate::prefix::test_support::{dir_stat, file_stat};
        let files = [
            FileEntry::from_stat("a", &file_stat(0, 0, 10)),
            FileEntry::from_stat("d", &dir_stat(0, 0)),
            FileEntry::from_stat("b", &file_stat(0, 0, 5)),
        ];
        assert_eq!(file_totals(files.iter()), (2, 15));
    }
}
