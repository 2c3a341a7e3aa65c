//! Filesystem entry types and stat data
//!
//! These are the values the scanner receives from the filesystem
//! collaborator. They carry everything a prefix record needs plus a few
//! raw platform fields (device, inode) that are never persisted.

use chrono::{DateTime, Utc};

/// Type of filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EntryType {
    /// Regular file
    File = 0,
    /// Directory
    Directory = 1,
    /// Symbolic link
    Symlink = 2,
    /// Block device
    BlockDevice = 3,
    /// Character device
    CharDevice = 4,
    /// Named pipe (FIFO)
    Fifo = 5,
    /// Unix socket
    Socket = 6,
    /// Unknown type
    Unknown = 255,
}

impl EntryType {
    /// Convert from u8 (persisted value)
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => EntryType::File,
            1 => EntryType::Directory,
            2 => EntryType::Symlink,
            3 => EntryType::BlockDevice,
            4 => EntryType::CharDevice,
            5 => EntryType::Fifo,
            6 => EntryType::Socket,
            _ => EntryType::Unknown,
        }
    }

    /// Convert from the type bits of a POSIX mode
    pub fn from_mode(mode: u32) -> Self {
        match mode & 0o170000 {
            0o100000 => EntryType::File,        // S_IFREG
            0o040000 => EntryType::Directory,   // S_IFDIR
            0o120000 => EntryType::Symlink,     // S_IFLNK
            0o060000 => EntryType::BlockDevice, // S_IFBLK
            0o020000 => EntryType::CharDevice,  // S_IFCHR
            0o010000 => EntryType::Fifo,        // S_IFIFO
            0o140000 => EntryType::Socket,      // S_IFSOCK
            _ => EntryType::Unknown,
        }
    }

    /// Type bits for this entry type, used when a platform has no mode
    pub fn mode_bits(&self) -> u32 {
        match self {
            EntryType::File => 0o100000,
            EntryType::Directory => 0o040000,
            EntryType::Symlink => 0o120000,
            EntryType::BlockDevice => 0o060000,
            EntryType::CharDevice => 0o020000,
            EntryType::Fifo => 0o010000,
            EntryType::Socket => 0o140000,
            EntryType::Unknown => 0,
        }
    }

    /// Check if this is a directory
    pub fn is_dir(&self) -> bool {
        *self == EntryType::Directory
    }

    /// Check if this is a symbolic link
    pub fn is_symlink(&self) -> bool {
        *self == EntryType::Symlink
    }

    /// Persisted representation
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/// Result of an lstat call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    /// Size in bytes
    pub size: i64,

    /// File mode (type + permissions)
    pub mode: u32,

    /// Last modification time
    pub mtime: DateTime<Utc>,

    /// Owner user ID
    pub uid: u32,

    /// Owner group ID
    pub gid: u32,

    /// Device ID (not persisted)
    pub device: u64,

    /// Inode number (not persisted)
    pub inode: u64,

    /// Number of 512-byte blocks allocated
    pub blocks: u64,
}

impl FileStat {
    /// Get the entry type from mode
    pub fn entry_type(&self) -> EntryType {
        EntryType::from_mode(self.mode)
    }

    pub fn is_dir(&self) -> bool {
        self.entry_type().is_dir()
    }
}

/// A directory entry returned from a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name (not full path)
    pub name: String,

    /// Entry type
    pub entry_type: EntryType,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, entry_type: EntryType) -> Self {
        Self {
            name: name.into(),
            entry_type,
        }
    }
}

/// Join a directory path and an entry name
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Check whether `path` is `dir` itself or lies beneath it
pub fn is_within(path: &str, dir: &str) -> bool {
    if dir == "/" {
        return path.starts_with('/');
    }
    match path.strip_prefix(dir) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
