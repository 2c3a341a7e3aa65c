//! In-process store engine
//!
//! Buckets are ordered maps behind a shared lock. Handles created with
//! [`MemoryStore::reader`] see the same data but refuse writes, which
//! mirrors opening the same on-disk store read-only.

use super::{Bucket, ScanControl, Store, WriteOp};
use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

#[derive(Debug, Default)]
struct Inner {
    buckets: [Map; 5],
    closed: bool,
}

/// Memory-backed store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
    read_only: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only handle over the same data
    pub fn reader(&self) -> MemoryStore {
        MemoryStore {
            inner: Arc::clone(&self.inner),
            read_only: true,
        }
    }

    /// Reopen a closed store, keeping its contents
    pub fn reopen(&self) -> MemoryStore {
        self.inner.write().closed = false;
        self.clone()
    }

    /// All keys of a bucket, for assertions
    pub fn keys(&self, bucket: Bucket) -> Vec<Vec<u8>> {
        self.inner.read().buckets[bucket.index()]
            .keys()
            .cloned()
            .collect()
    }
}

impl Store for MemoryStore {
    fn read_only(&self) -> bool {
        self.read_only
    }

    fn get_raw(&self, bucket: Bucket, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let inner = self.inner.read();
        if inner.closed {
            return Err(StoreError::Closed);
        }
        Ok(inner.buckets[bucket.index()].get(key).cloned())
    }

    fn write(&self, ops: Vec<WriteOp>) -> StoreResult<()> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(StoreError::Closed);
        }
        for op in ops {
            match op {
                WriteOp::Put { bucket, key, value } => {
                    inner.buckets[bucket.index()].insert(key, value);
                }
                WriteOp::Delete { bucket, key } => {
                    inner.buckets[bucket.index()].remove(&key);
                }
            }
        }
        Ok(())
    }

    fn scan_raw(
        &self,
        bucket: Bucket,
        start: &[u8],
        visit: &mut dyn FnMut(&[u8], &[u8]) -> ScanControl,
    ) -> StoreResult<()> {
        // Snapshot first so visitors may write back into the store
        let entries: Vec<(Vec<u8>, Vec<u8>)> = {
            let inner = self.inner.read();
            if inner.closed {
                return Err(StoreError::Closed);
            }
            inner.buckets[bucket.index()]
                .range::<[u8], _>((Bound::Included(start), Bound::Unbounded))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };

        for (key, value) in &entries {
            if visit(key, value) == ScanControl::Stop {
                break;
            }
        }
        Ok(())
    }

    fn last_raw(&self, bucket: Bucket) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>> {
        let inner = self.inner.read();
        if inner.closed {
            return Err(StoreError::Closed);
        }
        Ok(inner.buckets[bucket.index()]
            .last_key_value()
            .map(|(k, v)| (k.clone(), v.clone())))
    }

    fn flush(&self) -> StoreResult<()> {
        Ok(())
    }

    fn close(&self) -> StoreResult<()> {
        if !self.read_only {
            self.inner.write().closed = true;
        }
        Ok(())
    }
}
