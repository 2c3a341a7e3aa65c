//! Rebuild/swap controller
//!
//! Incremental runs write straight into the existing store. Full runs can
//! instead build a fresh store next to the live one and swap it in once the
//! scan succeeds, so readers keep a complete index the whole time:
//!
//! ```text
//! <db>          live store (read-only during the run)
//! <db>.rebuild  new store being written
//! <db>.bak      previous store after the swap
//! ```

use super::engine::{Baseline, ScanSummary};
use crate::error::{Result, WalkerError};
use crate::store::{Category, LogRecord, RocksOptions, RocksStore, Store, StoreHandle};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a run writes its records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Write into the existing store
    InPlace,
    /// Write into a new store and swap it in on success
    CopyOnWrite,
}

/// Owns the store lifecycle of one run
#[derive(Debug, Clone)]
pub struct RebuildController {
    db_path: PathBuf,
    options: RocksOptions,
}

impl RebuildController {
    pub fn new<P: AsRef<Path>>(db_path: P, options: RocksOptions) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            options: RocksOptions {
                read_only: false,
                ..options
            },
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn rebuild_path(&self) -> PathBuf {
        with_suffix(&self.db_path, "rebuild")
    }

    pub fn backup_path(&self) -> PathBuf {
        with_suffix(&self.db_path, "bak")
    }

    /// Open the stores for `mode`, hand them to `scan`, then finish the run
    ///
    /// `scan` receives the store to write into and where earlier records
    /// should be read from.
    pub fn run<F>(&self, mode: RunMode, incremental: bool, scan: F) -> Result<ScanSummary>
    where
        F: FnOnce(StoreHandle, Baseline) -> Result<ScanSummary>,
    {
        match mode {
            RunMode::InPlace => self.run_in_place(scan),
            RunMode::CopyOnWrite => self.run_copy_on_write(incremental, scan),
        }
    }

    fn run_in_place<F>(&self, scan: F) -> Result<ScanSummary>
    where
        F: FnOnce(StoreHandle, Baseline) -> Result<ScanSummary>,
    {
        let start = Utc::now();
        let store: StoreHandle = Arc::new(RocksStore::open(&self.db_path, self.options.clone())?);
        info!(path = %self.db_path.display(), "Scanning in place");

        let result = scan(Arc::clone(&store), Baseline::SameStore);

        // Interrupted runs are logged too
        let summary = match &result {
            Ok(summary) => summary.to_string(),
            Err(e) => format!("interrupted: {}", e),
        };
        store.append_log(&LogRecord {
            start,
            stop: Utc::now(),
            summary,
        })?;
        store.close()?;
        result
    }

    fn run_copy_on_write<F>(&self, incremental: bool, scan: F) -> Result<ScanSummary>
    where
        F: FnOnce(StoreHandle, Baseline) -> Result<ScanSummary>,
    {
        let start = Utc::now();
        let rebuild_path = self.rebuild_path();

        if rebuild_path.exists() {
            warn!(path = %rebuild_path.display(), "Removing leftover rebuild store");
            fs::remove_dir_all(&rebuild_path)?;
        }

        let previous: Option<StoreHandle> = if self.db_path.exists() {
            let store = RocksStore::open(&self.db_path, RocksOptions::read_only())?;
            Some(Arc::new(store))
        } else {
            None
        };

        let outcome = self.build(start, &rebuild_path, previous.clone(), incremental, scan);

        if let Some(previous) = previous {
            previous.close()?;
        }

        match outcome {
            Ok(summary) => {
                self.swap(&rebuild_path)?;
                Ok(summary)
            }
            Err(e) => {
                if let Err(rm) = fs::remove_dir_all(&rebuild_path) {
                    warn!(path = %rebuild_path.display(), error = %rm, "Failed to remove rebuild store");
                }
                Err(e)
            }
        }
    }

    /// Populate the rebuild store; it is closed and released on return
    fn build<F>(
        &self,
        start: chrono::DateTime<Utc>,
        rebuild_path: &Path,
        previous: Option<StoreHandle>,
        incremental: bool,
        scan: F,
    ) -> Result<ScanSummary>
    where
        F: FnOnce(StoreHandle, Baseline) -> Result<ScanSummary>,
    {
        let target: StoreHandle = Arc::new(RocksStore::open(rebuild_path, self.options.clone())?);
        info!(
            path = %rebuild_path.display(),
            incremental,
            "Rebuilding into a new store"
        );

        let baseline = match previous {
            Some(previous) => {
                for category in Category::ALL {
                    let copied = previous.copy_category(category, target.as_ref())?;
                    debug!(?category, copied, "Copied records from previous store");
                }
                if incremental {
                    Baseline::Separate(previous)
                } else {
                    Baseline::None
                }
            }
            None => Baseline::None,
        };

        let summary = match scan(Arc::clone(&target), baseline) {
            Ok(summary) => summary,
            Err(e) => {
                let _ = target.close();
                return Err(e);
            }
        };

        target.append_log(&LogRecord {
            start,
            stop: Utc::now(),
            summary: summary.to_string(),
        })?;
        target.close()?;
        Ok(summary)
    }

    /// Move the live store aside and the rebuilt one into place
    fn swap(&self, rebuild_path: &Path) -> Result<()> {
        let backup = self.backup_path();
        let had_previous = self.db_path.exists();

        if had_previous {
            if backup.exists() {
                fs::remove_dir_all(&backup)?;
            }
            fs::rename(&self.db_path, &backup)?;
        }

        if let Err(e) = fs::rename(rebuild_path, &self.db_path) {
            if had_previous {
                if let Err(restore) = fs::rename(&backup, &self.db_path) {
                    warn!(error = %restore, "Failed to restore previous store after swap failure");
                }
            }
            return Err(WalkerError::Io(e));
        }

        info!(path = %self.db_path.display(), "Swapped rebuilt store into place");
        Ok(())
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ScanControl;
    use std::time::Duration;
    use tempfile::tempdir;

    fn fast_options() -> RocksOptions {
        RocksOptions {
            lock_timeout: Duration::from_millis(500),
            ..RocksOptions::default()
        }
    }

    fn keys(path: &Path) -> Vec<String> {
        let store = RocksStore::open(path, RocksOptions::read_only()).unwrap();
        let mut keys = Vec::new();
        store
            .scan("", &mut |key, _| {
                keys.push(key.to_string());
                ScanControl::Continue
            })
            .unwrap();
        keys
    }

    fn finished() -> ScanSummary {
        ScanSummary {
            completed: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_paths() {
        let ctl = RebuildController::new("/var/lib/du.db", RocksOptions::default());
        assert_eq!(ctl.rebuild_path(), PathBuf::from("/var/lib/du.db.rebuild"));
        assert_eq!(ctl.backup_path(), PathBuf::from("/var/lib/du.db.bak"));
    }

    #[test]
    fn test_copy_on_write_creates_store() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("index");
        let ctl = RebuildController::new(&db, fast_options());

        ctl.run(RunMode::CopyOnWrite, false, |target, baseline| {
            assert!(matches!(baseline, Baseline::None));
            target.set("/a", vec![1])?;
            Ok(finished())
        })
        .unwrap();

        assert!(db.exists());
        assert!(!ctl.rebuild_path().exists());
        assert!(!ctl.backup_path().exists());
        assert_eq!(keys(&db), vec!["/a".to_string()]);
    }

    #[test]
    fn test_copy_on_write_swaps_and_keeps_history() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("index");
        let ctl = RebuildController::new(&db, fast_options());

        ctl.run(RunMode::InPlace, true, |target, _| {
            target.set("/old", vec![1])?;
            Ok(finished())
        })
        .unwrap();

        ctl.run(RunMode::CopyOnWrite, false, |target, _| {
            target.set("/new", vec![2])?;
            Ok(finished())
        })
        .unwrap();

        assert_eq!(keys(&db), vec!["/new".to_string()]);
        assert_eq!(keys(&ctl.backup_path()), vec!["/old".to_string()]);

        let store = RocksStore::open(&db, RocksOptions::read_only()).unwrap();
        // One log from the in-place run, copied, plus the rebuild's own
        assert_eq!(store.count(crate::store::Bucket::Logs).unwrap(), 2);
    }

    #[test]
    fn test_failed_rebuild_leaves_original() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("index");
        let ctl = RebuildController::new(&db, fast_options());

        ctl.run(RunMode::InPlace, true, |target, _| {
            target.set("/kept", vec![1])?;
            Ok(finished())
        })
        .unwrap();

        let err = ctl
            .run(RunMode::CopyOnWrite, true, |target, baseline| {
                assert!(matches!(baseline, Baseline::Separate(_)));
                target.set("/partial", vec![2])?;
                Err(WalkerError::Cancelled)
            })
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(!ctl.rebuild_path().exists());
        assert_eq!(keys(&db), vec!["/kept".to_string()]);
    }

    #[test]
    fn test_leftover_rebuild_is_removed() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("index");
        let ctl = RebuildController::new(&db, fast_options());

        fs::create_dir_all(ctl.rebuild_path()).unwrap();
        fs::write(ctl.rebuild_path().join("garbage"), b"x").unwrap();

        ctl.run(RunMode::CopyOnWrite, false, |_, _| Ok(finished()))
            .unwrap();
        assert!(db.exists());
        assert!(!ctl.rebuild_path().exists());
    }

    #[test]
    fn test_in_place_logs_interrupted_run() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("index");
        let ctl = RebuildController::new(&db, fast_options());

        let result = ctl.run(RunMode::InPlace, true, |_, _| Err(WalkerError::Cancelled));
        assert!(result.is_err());

        let store = RocksStore::open(&db, RocksOptions::read_only()).unwrap();
        let log = store.last_log().unwrap().unwrap();
        assert!(log.summary.starts_with("interrupted"));
    }
}
