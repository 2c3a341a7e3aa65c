//! Usage statistics computed from stored records
//!
//! Aggregates per-directory [`PrefixStats`] over every record under a path
//! without touching the filesystem.

use crate::du::DiskUsage;
use crate::error::StoreResult;
use crate::fs::is_within;
use crate::prefix::{PrefixInfo, PrefixStats, UsageStats};
use crate::store::{ScanControl, StatsSnapshot, Store};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Usage of a single uid or gid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerUsage {
    pub id: u32,
    pub usage: UsageStats,
}

/// Usage aggregated over a subtree of the index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStats {
    /// Subtree the aggregate covers ("" for everything)
    pub prefix: String,
    /// Disk usage model used for `storage_bytes`
    pub disk_usage: String,
    /// Directory records aggregated
    pub directories: u64,
    /// Records skipped because they could not be decoded
    pub undecodable: u64,
    pub totals: UsageStats,
    pub users: BTreeMap<u32, UsageStats>,
    pub groups: BTreeMap<u32, UsageStats>,
}

impl AggregateStats {
    pub fn new(prefix: &str, du: &DiskUsage) -> Self {
        Self {
            prefix: prefix.to_string(),
            disk_usage: du.to_string(),
            ..Default::default()
        }
    }

    /// Aggregate every record at or below `prefix`
    pub fn collect(store: &dyn Store, prefix: &str, du: &DiskUsage) -> StoreResult<Self> {
        let mut stats = Self::new(prefix, du);
        store.scan(prefix, &mut |path, value| {
            if !prefix.is_empty() && !is_within(path, prefix) {
                return ScanControl::Continue;
            }
            match PrefixInfo::decode(value) {
                Ok(info) => stats.add_record(&info, du),
                Err(e) => {
                    debug!(path = %path, error = %e, "Skipping undecodable record");
                    stats.undecodable += 1;
                }
            }
            ScanControl::Continue
        })?;

        info!(
            prefix = %prefix,
            directories = stats.directories,
            files = stats.totals.files,
            "Aggregated usage"
        );
        Ok(stats)
    }

    pub fn add_record(&mut self, info: &PrefixInfo, du: &DiskUsage) {
        self.directories += 1;
        self.merge(&info.compute_stats(du));
    }

    fn merge(&mut self, stats: &PrefixStats) {
        self.totals.merge(&stats.totals);
        for (id, usage) in &stats.users {
            self.users.entry(*id).or_default().merge(usage);
        }
        for (id, usage) in &stats.groups {
            self.groups.entry(*id).or_default().merge(usage);
        }
    }

    /// Users ordered by bytes on disk, largest first
    pub fn top_users(&self, n: usize) -> Vec<OwnerUsage> {
        top_by_storage(&self.users, n)
    }

    /// Groups ordered by bytes on disk, largest first
    pub fn top_groups(&self, n: usize) -> Vec<OwnerUsage> {
        top_by_storage(&self.groups, n)
    }

    /// Serialize as a stats snapshot taken at `time`
    pub fn snapshot(&self, time: DateTime<Utc>) -> StoreResult<StatsSnapshot> {
        StatsSnapshot::new(time, self)
    }
}

fn top_by_storage(map: &BTreeMap<u32, UsageStats>, n: usize) -> Vec<OwnerUsage> {
    let mut results: Vec<_> = map
        .iter()
        .map(|(id, usage)| OwnerUsage {
            id: *id,
            usage: *usage,
        })
        .collect();
    // Sort by storage bytes descending, ties by id
    results.sort_by(|a, b| {
        b.usage
            .storage_bytes
            .cmp(&a.usage.storage_bytes)
            .then(a.id.cmp(&b.id))
    });
    results.truncate(n);
    results
}
