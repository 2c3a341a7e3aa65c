//! Directory ("prefix") metadata records
//!
//! A [`PrefixInfo`] describes one directory: its own identity (owner, mode,
//! mtime), the names and types of its entries, and the metadata of each
//! entry that could be stat'ed. Records are assembled with a
//! [`PrefixBuilder`] during a scan and frozen by [`PrefixBuilder::finalize`],
//! which builds the ownership indices. Only a finalized record can be
//! encoded, queried for ownership or turned into statistics.
//!
//! ```text
//!   FileStat ──▶ PrefixBuilder ──append──▶ finalize() ──▶ PrefixInfo
//!                                                           │   ▲
//!                                                     encode│   │decode
//!                                                           ▼   │
//!                                                          bytes
//! ```

mod encoding;
pub mod idmap;
pub mod usage;

use crate::du::DiskUsage;
use crate::error::CodecResult;
use crate::fs::{DirEntry, EntryType, FileStat};
use chrono::{DateTime, Utc};

pub use idmap::{next_set_bit, BitScan, IdMap, OwnedPositions, OwnershipIndex};
pub use usage::{PrefixStats, UsageStats};

/// Name and type of a directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    pub name: String,
    pub entry_type: EntryType,
}

impl ChildEntry {
    pub fn new(name: impl Into<String>, entry_type: EntryType) -> Self {
        Self {
            name: name.into(),
            entry_type,
        }
    }
}

impl From<DirEntry> for ChildEntry {
    fn from(entry: DirEntry) -> Self {
        Self {
            name: entry.name,
            entry_type: entry.entry_type,
        }
    }
}

/// Raw platform identifiers, kept in memory only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMeta {
    pub device: u64,
    pub inode: u64,
}

/// Metadata of one stat'ed entry inside a prefix
///
/// `uid`/`gid` hold the entry's owner while the record is being built.
/// After finalize they are `None` when no entry diverges from the
/// directory's owner for that kind, and otherwise the id whose bitmap
/// contains the entry.
#[derive(Debug, Clone, Eq)]
pub struct FileEntry {
    pub name: String,
    pub entry_type: EntryType,
    pub mode: u32,
    pub size: i64,
    /// Allocated 512-byte blocks
    pub blocks: u64,
    pub mtime: DateTime<Utc>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub raw: Option<RawMeta>,
}

impl FileEntry {
    pub fn from_stat(name: impl Into<String>, stat: &FileStat) -> Self {
        Self {
            name: name.into(),
            entry_type: stat.entry_type(),
            mode: stat.mode,
            size: stat.size,
            blocks: stat.blocks,
            mtime: stat.mtime,
            uid: Some(stat.uid),
            gid: Some(stat.gid),
            raw: Some(RawMeta {
                device: stat.device,
                inode: stat.inode,
            }),
        }
    }
}

// Equality ignores raw platform metadata, which is never persisted
impl PartialEq for FileEntry {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.entry_type == other.entry_type
            && self.mode == other.mode
            && self.size == other.size
            && self.blocks == other.blocks
            && self.mtime == other.mtime
            && self.uid == other.uid
            && self.gid == other.gid
    }
}

/// An open prefix record that entries can be appended to
#[derive(Debug, Clone)]
pub struct PrefixBuilder {
    uid: u32,
    gid: u32,
    size: i64,
    mode: u32,
    mtime: DateTime<Utc>,
    children: Vec<ChildEntry>,
    files: Vec<FileEntry>,
}

impl PrefixBuilder {
    /// Start a record from the directory's own stat
    pub fn new(stat: &FileStat) -> Self {
        Self {
            uid: stat.uid,
            gid: stat.gid,
            size: stat.size,
            mode: stat.mode,
            mtime: stat.mtime,
            children: Vec::new(),
            files: Vec::new(),
        }
    }

    pub fn append_file(&mut self, file: FileEntry) {
        self.files.push(file);
    }

    pub fn append_files<I>(&mut self, files: I)
    where
        I: IntoIterator<Item = FileEntry>,
    {
        self.files.extend(files);
    }

    pub fn append_child_entries<I>(&mut self, children: I)
    where
        I: IntoIterator<Item = ChildEntry>,
    {
        self.children.extend(children);
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Build the ownership indices and freeze the record
    pub fn finalize(self) -> CodecResult<PrefixInfo> {
        let uid = self.uid;
        let gid = self.gid;
        let users = OwnershipIndex::build(self.files.iter().map(|f| f.uid.unwrap_or(uid)), uid);
        let groups = OwnershipIndex::build(self.files.iter().map(|f| f.gid.unwrap_or(gid)), gid);
        users.validate()?;
        groups.validate()?;

        let mut info = PrefixInfo {
            uid,
            gid,
            size: self.size,
            mode: self.mode,
            mtime: self.mtime,
            children: self.children,
            files: self.files,
            users,
            groups,
        };
        info.annotate_owners();
        Ok(info)
    }
}

/// A finalized, read-only prefix record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixInfo {
    uid: u32,
    gid: u32,
    size: i64,
    mode: u32,
    mtime: DateTime<Utc>,
    children: Vec<ChildEntry>,
    files: Vec<FileEntry>,
    users: OwnershipIndex,
    groups: OwnershipIndex,
}

impl PrefixInfo {
    /// Rewrite per-file owner annotations from the indices
    fn annotate_owners(&mut self) {
        annotate(&mut self.files, &self.users, |f| &mut f.uid);
        annotate(&mut self.files, &self.groups, |f| &mut f.gid);
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn gid(&self) -> u32 {
        self.gid
    }

    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }

    pub fn mtime(&self) -> DateTime<Utc> {
        self.mtime
    }

    pub fn children(&self) -> &[ChildEntry] {
        &self.children
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn users(&self) -> &OwnershipIndex {
        &self.users
    }

    pub fn groups(&self) -> &OwnershipIndex {
        &self.groups
    }

    /// Same mtime and mode as another record
    pub fn unchanged(&self, other: &PrefixInfo) -> bool {
        self.mtime == other.mtime && self.mode == other.mode
    }

    /// Same mtime and mode as a fresh stat of the directory
    pub fn unchanged_stat(&self, stat: &FileStat) -> bool {
        self.mtime == stat.mtime && self.mode == stat.mode
    }

    /// Child entries that are directories
    pub fn subdirs(&self) -> impl Iterator<Item = &ChildEntry> {
        self.children.iter().filter(|c| c.entry_type.is_dir())
    }

    /// No subdirectories to descend into
    pub fn is_leaf(&self) -> bool {
        self.subdirs().next().is_none()
    }

    /// Files owned by user `uid`
    pub fn user_scan(&self, uid: u32) -> OwnedFiles<'_> {
        OwnedFiles {
            files: &self.files,
            positions: self.users.scan(uid),
        }
    }

    /// Files owned by group `gid`
    pub fn group_scan(&self, gid: u32) -> OwnedFiles<'_> {
        OwnedFiles {
            files: &self.files,
            positions: self.groups.scan(gid),
        }
    }

    /// Usage totals plus per-user and per-group breakdowns
    pub fn compute_stats(&self, du: &DiskUsage) -> PrefixStats {
        let mut stats = PrefixStats::default();
        for file in &self.files {
            stats.totals.add_entry(file, du);
        }
        for (uid, positions) in self.users.owners() {
            let usage = stats.users.entry(uid).or_default();
            for pos in positions {
                usage.add_entry(&self.files[pos], du);
            }
        }
        for (gid, positions) in self.groups.owners() {
            let usage = stats.groups.entry(gid).or_default();
            for pos in positions {
                usage.add_entry(&self.files[pos], du);
            }
        }
        // An owner bitmap with no positions contributes nothing
        stats.users.retain(|_, u| !u.is_empty());
        stats.groups.retain(|_, g| !g.is_empty());
        stats
    }
}

fn annotate<F>(files: &mut [FileEntry], index: &OwnershipIndex, field: F)
where
    F: Fn(&mut FileEntry) -> &mut Option<u32>,
{
    if !index.is_divergent() {
        for file in files.iter_mut() {
            *field(file) = None;
        }
        return;
    }
    for (id, positions) in index.owners() {
        for pos in positions {
            if let Some(file) = files.get_mut(pos) {
                *field(file) = Some(id);
            }
        }
    }
}

/// Iterator over the files owned by one id
#[derive(Debug, Clone)]
pub struct OwnedFiles<'a> {
    files: &'a [FileEntry],
    positions: OwnedPositions<'a>,
}

impl<'a> Iterator for OwnedFiles<'a> {
    type Item = (usize, &'a FileEntry);

    fn next(&mut self) -> Option<Self::Item> {
        let pos = self.positions.next()?;
        self.files.get(pos).map(|f| (pos, f))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::TimeZone;

    pub fn stat(uid: u32, gid: u32, mode: u32, size: i64) -> FileStat {
        FileStat {
            size,
            mode,
            mtime: Utc.timestamp_opt(1_700_000_000, 42).unwrap(),
            uid,
            gid,
            device: 1,
            inode: 100,
            blocks: (size as u64).div_ceil(512),
        }
    }

    pub fn dir_stat(uid: u32, gid: u32) -> FileStat {
        stat(uid, gid, 0o040755, 4096)
    }

    pub fn file_stat(uid: u32, gid: u32, size: i64) -> FileStat {
        stat(uid, gid, 0o100644, size)
    }
}
