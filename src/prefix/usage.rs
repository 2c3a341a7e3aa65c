//! Per-id usage totals

use super::FileEntry;
use crate::du::DiskUsage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Usage accumulated for one id (or for everything)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    /// Non-directory entries
    pub files: u64,
    /// Directory entries
    pub prefixes: u64,
    /// Logical bytes of non-directory entries
    pub bytes: i64,
    /// Bytes on disk of non-directory entries
    pub storage_bytes: i64,
    /// Bytes consumed by directory entries themselves
    pub prefix_bytes: i64,
}

impl UsageStats {
    pub fn add_entry(&mut self, entry: &FileEntry, du: &DiskUsage) {
        if entry.entry_type.is_dir() {
            self.prefixes += 1;
            self.prefix_bytes += entry.size;
        } else {
            self.files += 1;
            self.bytes += entry.size;
            self.storage_bytes += du.bytes_on_disk(entry.size, entry.blocks);
        }
    }

    pub fn merge(&mut self, other: &UsageStats) {
        self.files += other.files;
        self.prefixes += other.prefixes;
        self.bytes += other.bytes;
        self.storage_bytes += other.storage_bytes;
        self.prefix_bytes += other.prefix_bytes;
    }

    pub fn is_empty(&self) -> bool {
        *self == UsageStats::default()
    }
}

/// Usage of one prefix broken down by user and group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixStats {
    pub totals: UsageStats,
    pub users: BTreeMap<u32, UsageStats>,
    pub groups: BTreeMap<u32, UsageStats>,
}

impl PrefixStats {
    pub fn merge(&mut self, other: &PrefixStats) {
        self.totals.merge(&other.totals);
        for (id, usage) in &other.users {
            self.users.entry(*id).or_default().merge(usage);
        }
        for (id, usage) in &other.groups {
            self.groups.entry(*id).or_default().merge(usage);
        }
    }
}
