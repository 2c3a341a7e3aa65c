//! Disk usage models
//!
//! Converts a file's logical size into the bytes it occupies on the
//! underlying storage. Only statistics use this; prefix records always keep
//! the logical size.

use crate::error::ConfigError;
use std::fmt;
use std::str::FromStr;

/// How logical sizes map to consumed storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiskUsage {
    /// Storage equals logical size
    #[default]
    Identity,
    /// Use the allocated 512-byte block count reported by lstat
    Allocated,
    /// Round up to a fixed block size
    Block { size: u64 },
    /// Round up to a full RAID0 stripe of `chunk * data_disks`
    Raid0 { chunk: u64, data_disks: u64 },
}

impl DiskUsage {
    /// Bytes on disk for a file of `size` bytes with `blocks` allocated
    pub fn bytes_on_disk(&self, size: i64, blocks: u64) -> i64 {
        if size <= 0 && !matches!(self, DiskUsage::Allocated) {
            return size.max(0);
        }
        match *self {
            DiskUsage::Identity => size,
            DiskUsage::Allocated => i64::try_from(blocks.saturating_mul(512)).unwrap_or(i64::MAX),
            DiskUsage::Block { size: block } => round_up(size, block),
            DiskUsage::Raid0 { chunk, data_disks } => {
                round_up(size, chunk.saturating_mul(data_disks))
            }
        }
    }
}

fn round_up(size: i64, unit: u64) -> i64 {
    let Ok(unit) = i64::try_from(unit) else {
        return size;
    };
    if unit <= 1 {
        return size;
    }
    let rem = size % unit;
    if rem == 0 {
        size
    } else {
        size.saturating_add(unit - rem)
    }
}

impl fmt::Display for DiskUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiskUsage::Identity => write!(f, "identity"),
            DiskUsage::Allocated => write!(f, "allocated"),
            DiskUsage::Block { size } => write!(f, "block:{}", size),
            DiskUsage::Raid0 { chunk, data_disks } => write!(f, "raid0:{}x{}", chunk, data_disks),
        }
    }
}

impl FromStr for DiskUsage {
    type Err = ConfigError;

    /// Parse `identity`, `allocated`, `block:<bytes>` or `raid0:<chunk>x<disks>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidDiskUsage {
            value: s.to_string(),
            reason: reason.to_string(),
        };
        let parse_positive = |v: &str| -> Result<u64, ConfigError> {
            match v.trim().parse::<u64>() {
                Ok(0) | Err(_) => Err(invalid("expected a positive integer")),
                Ok(n) => Ok(n),
            }
        };

        let (kind, arg) = match s.split_once(':') {
            Some((kind, arg)) => (kind, Some(arg)),
            None => (s, None),
        };

        match (kind.to_ascii_lowercase().as_str(), arg) {
            ("identity", None) => Ok(DiskUsage::Identity),
            ("allocated", None) => Ok(DiskUsage::Allocated),
            ("block", Some(arg)) => Ok(DiskUsage::Block {
                size: parse_positive(arg)?,
            }),
            ("raid0", Some(arg)) => {
                let (chunk, disks) = arg
                    .split_once('x')
                    .ok_or_else(|| invalid("expected raid0:<chunk>x<data_disks>"))?;
                Ok(DiskUsage::Raid0 {
                    chunk: parse_positive(chunk)?,
                    data_disks: parse_positive(disks)?,
                })
            }
            _ => Err(invalid(
                "expected identity, allocated, block:<bytes> or raid0:<chunk>x<data_disks>",
            )),
        }
    }
}
