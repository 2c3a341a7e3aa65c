//! Local filesystem implementation

use super::types::{DirEntry, EntryType, FileStat};
use super::FileSystem;
use crate::error::{FsError, FsResult};
use chrono::{DateTime, Utc};
use std::fs::{self, Metadata};
use tracing::trace;

/// Platform-specific metadata fields
///
/// On Unix these come straight from the stat buffer. Elsewhere ownership
/// and inode fields are reported as zero.
pub trait PlatformMeta {
    fn uid(&self) -> u32;
    fn gid(&self) -> u32;
    fn device(&self) -> u64;
    fn inode(&self) -> u64;
    fn blocks(&self) -> u64;
    fn mode_bits(&self) -> u32;
    fn mtime_utc(&self) -> DateTime<Utc>;
}

#[cfg(unix)]
impl PlatformMeta for Metadata {
    fn uid(&self) -> u32 {
        std::os::unix::fs::MetadataExt::uid(self)
    }

    fn gid(&self) -> u32 {
        std::os::unix::fs::MetadataExt::gid(self)
    }

    fn device(&self) -> u64 {
        std::os::unix::fs::MetadataExt::dev(self)
    }

    fn inode(&self) -> u64 {
        std::os::unix::fs::MetadataExt::ino(self)
    }

    fn blocks(&self) -> u64 {
        std::os::unix::fs::MetadataExt::blocks(self)
    }

    fn mode_bits(&self) -> u32 {
        std::os::unix::fs::MetadataExt::mode(self)
    }

    fn mtime_utc(&self) -> DateTime<Utc> {
        use std::os::unix::fs::MetadataExt;
        let nanos = u32::try_from(self.mtime_nsec()).unwrap_or(0);
        DateTime::from_timestamp(self.mtime(), nanos).unwrap_or_default()
    }
}

#[cfg(not(unix))]
impl PlatformMeta for Metadata {
    fn uid(&self) -> u32 {
        0
    }

    fn gid(&self) -> u32 {
        0
    }

    fn device(&self) -> u64 {
        0
    }

    fn inode(&self) -> u64 {
        0
    }

    fn blocks(&self) -> u64 {
        self.len().div_ceil(512)
    }

    fn mode_bits(&self) -> u32 {
        let perms = if self.permissions().readonly() { 0o555 } else { 0o755 };
        entry_type_of(&self.file_type()).mode_bits() | perms
    }

    fn mtime_utc(&self) -> DateTime<Utc> {
        self.modified().map(DateTime::<Utc>::from).unwrap_or_default()
    }
}

fn entry_type_of(ft: &fs::FileType) -> EntryType {
    if ft.is_dir() {
        return EntryType::Directory;
    }
    if ft.is_symlink() {
        return EntryType::Symlink;
    }
    if ft.is_file() {
        return EntryType::File;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        if ft.is_block_device() {
            return EntryType::BlockDevice;
        }
        if ft.is_char_device() {
            return EntryType::CharDevice;
        }
        if ft.is_fifo() {
            return EntryType::Fifo;
        }
        if ft.is_socket() {
            return EntryType::Socket;
        }
    }
    EntryType::Unknown
}

/// Filesystem backed by the local kernel
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for LocalFs {
    fn lstat(&self, path: &str) -> FsResult<FileStat> {
        let meta = fs::symlink_metadata(path).map_err(|e| FsError::from_io(path, &e))?;

        Ok(FileStat {
            size: i64::try_from(meta.len()).unwrap_or(i64::MAX),
            mode: meta.mode_bits(),
            mtime: meta.mtime_utc(),
            uid: PlatformMeta::uid(&meta),
            gid: PlatformMeta::gid(&meta),
            device: meta.device(),
            inode: meta.inode(),
            blocks: PlatformMeta::blocks(&meta),
        })
    }

    fn list_directory(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let reader = fs::read_dir(path).map_err(|e| FsError::from_io(path, &e))?;

        let mut entries = Vec::new();
        for entry in reader {
            let entry = entry.map_err(|e| FsError::from_io(path, &e))?;
            // Non-UTF-8 names are kept lossily; lstat on them will fail and
            // be recorded as a per-entry error.
            let name = entry.file_name().to_string_lossy().into_owned();
            let entry_type = match entry.file_type() {
                Ok(ft) => entry_type_of(&ft),
                Err(_) => EntryType::Unknown,
            };
            entries.push(DirEntry { name, entry_type });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        trace!(path = %path, entries = entries.len(), "Listed directory");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lstat_and_list() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_str().unwrap().to_string();
        fs::write(dir.path().join("b.txt"), b"hello").unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();

        let fs = LocalFs::new();
        let entries = fs.list_directory(&root).unwrap();
        assert_eq!(
            entries,
            vec![
                DirEntry::new("a", EntryType::Directory),
                DirEntry::new("b.txt", EntryType::File),
            ]
        );

        let stat = fs.lstat(&format!("{}/b.txt", root)).unwrap();
        assert_eq!(stat.size, 5);
        assert_eq!(stat.entry_type(), EntryType::File);

        let stat = fs.lstat(&root).unwrap();
        assert!(stat.is_dir());
    }

    #[test]
    fn test_lstat_missing() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = LocalFs::new().lstat(missing.to_str().unwrap()).unwrap_err();
        assert!(err.is_vanished());
    }

    #[cfg(unix)]
    #[test]
    fn test_lstat_does_not_follow_symlink() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("target")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("target"), dir.path().join("link")).unwrap();

        let stat = LocalFs::new()
            .lstat(dir.path().join("link").to_str().unwrap())
            .unwrap();
        assert_eq!(stat.entry_type(), EntryType::Symlink);
    }
}
