//! Shared helpers for integration tests

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use du_walker::error::{FsError, FsResult};
use du_walker::fs::{DirEntry, FileStat, FileSystem};
use du_walker::store::{Bucket, MemoryStore};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

const S_IFDIR: u32 = 0o040000;
const S_IFREG: u32 = 0o100000;

#[derive(Default)]
struct Tree {
    nodes: BTreeMap<String, FileStat>,
    denied: HashSet<String>,
    broken: HashSet<String>,
    clock: i64,
    next_inode: u64,
}

/// In-memory filesystem whose directories change mtime on every mutation
pub struct MemoryFs {
    tree: Mutex<Tree>,
    listings: Mutex<Vec<String>>,
}

fn parent_of(path: &str) -> Option<&str> {
    match path.rfind('/') {
        Some(0) if path.len() > 1 => Some("/"),
        Some(0) | None => None,
        Some(idx) => Some(&path[..idx]),
    }
}

fn name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

impl Tree {
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        Utc.timestamp_opt(1_700_000_000 + self.clock, 0).unwrap()
    }

    fn insert(&mut self, path: &str, mode: u32, uid: u32, gid: u32, size: i64) {
        let now = self.tick();
        self.next_inode += 1;
        self.nodes.insert(
            path.to_string(),
            FileStat {
                size,
                mode,
                mtime: now,
                uid,
                gid,
                device: 1,
                inode: self.next_inode,
                blocks: ((size.max(0) as u64) + 511) / 512,
            },
        );
        self.touch_parent(path);
    }

    fn touch_parent(&mut self, path: &str) {
        if let Some(parent) = parent_of(path) {
            let now = self.tick();
            if let Some(stat) = self.nodes.get_mut(parent) {
                stat.mtime = now;
            }
        }
    }
}

impl MemoryFs {
    /// Filesystem containing only the directory `root`
    pub fn new(root: &str) -> Self {
        let fs = Self {
            tree: Mutex::new(Tree::default()),
            listings: Mutex::new(Vec::new()),
        };
        fs.mkdir(root, 0, 0);
        fs
    }

    pub fn mkdir(&self, path: &str, uid: u32, gid: u32) {
        self.tree.lock().insert(path, S_IFDIR | 0o755, uid, gid, 4096);
    }

    pub fn add_file(&self, path: &str, uid: u32, gid: u32, size: i64) {
        self.tree.lock().insert(path, S_IFREG | 0o644, uid, gid, size);
    }

    /// Remove `path` and everything below it
    pub fn remove(&self, path: &str) {
        let mut tree = self.tree.lock();
        let below = format!("{}/", path);
        tree.nodes.retain(|p, _| p != path && !p.starts_with(&below));
        tree.touch_parent(path);
    }

    /// Change permission bits without touching mtime
    pub fn chmod(&self, path: &str, perm: u32) {
        let mut tree = self.tree.lock();
        if let Some(stat) = tree.nodes.get_mut(path) {
            stat.mode = (stat.mode & 0o170000) | perm;
        }
    }

    /// Make listing `path` fail with permission denied
    pub fn deny(&self, path: &str) {
        self.tree.lock().denied.insert(path.to_string());
    }

    /// Make lstat of `path` fail with an I/O error
    pub fn break_stat(&self, path: &str) {
        self.tree.lock().broken.insert(path.to_string());
    }

    /// Directories listed so far
    pub fn listings(&self) -> Vec<String> {
        let mut listed = self.listings.lock().clone();
        listed.sort();
        listed
    }

    pub fn reset_listings(&self) {
        self.listings.lock().clear();
    }
}

impl FileSystem for MemoryFs {
    fn lstat(&self, path: &str) -> FsResult<FileStat> {
        let tree = self.tree.lock();
        if tree.broken.contains(path) {
            return Err(FsError::Other {
                path: path.to_string(),
                reason: "Input/output error".to_string(),
            });
        }
        tree.nodes.get(path).cloned().ok_or_else(|| FsError::NotFound {
            path: path.to_string(),
        })
    }

    fn list_directory(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let tree = self.tree.lock();
        if tree.denied.contains(path) {
            return Err(FsError::PermissionDenied {
                path: path.to_string(),
            });
        }
        match tree.nodes.get(path) {
            Some(stat) if stat.is_dir() => {}
            _ => {
                return Err(FsError::NotFound {
                    path: path.to_string(),
                })
            }
        }
        self.listings.lock().push(path.to_string());

        let mut entries: Vec<DirEntry> = tree
            .nodes
            .iter()
            .filter(|(p, _)| parent_of(p) == Some(path))
            .map(|(p, stat)| DirEntry::new(name_of(p), stat.entry_type()))
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

/// Filesystem wrapper that raises a shutdown flag after `limit` lstats
pub struct CancelAfterFs {
    inner: Arc<dyn FileSystem>,
    limit: usize,
    calls: AtomicUsize,
    shutdown: Arc<AtomicBool>,
}

impl CancelAfterFs {
    pub fn new(inner: Arc<dyn FileSystem>, limit: usize, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            inner,
            limit,
            calls: AtomicUsize::new(0),
            shutdown,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FileSystem for CancelAfterFs {
    fn lstat(&self, path: &str) -> FsResult<FileStat> {
        if self.calls.fetch_add(1, Ordering::SeqCst) + 1 >= self.limit {
            self.shutdown.store(true, Ordering::SeqCst);
        }
        self.inner.lstat(path)
    }

    fn list_directory(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        self.inner.list_directory(path)
    }
}

/// Prefix keys currently in a memory store
pub fn prefix_keys(store: &MemoryStore) -> Vec<String> {
    store
        .keys(Bucket::Prefixes)
        .into_iter()
        .map(|k| String::from_utf8(k).unwrap())
        .collect()
}
