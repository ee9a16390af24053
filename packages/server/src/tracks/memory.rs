//! In-memory store adapters with failure injection, for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::TrackId;
use tokio::sync::RwLock;

use super::{DescriptorRecord, DescriptorStore, LocatorWrite, OwnershipRecord, OwnershipStore, StoreError};

fn injected() -> StoreError {
    StoreError::Unavailable("injected failure".into())
}

#[derive(Default)]
pub struct MemoryOwnershipStore {
    rows: RwLock<HashMap<TrackId, OwnershipRecord>>,
    fail_deletes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryOwnershipStore {
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl OwnershipStore for MemoryOwnershipStore {
    async fn insert(&self, record: &OwnershipRecord) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&record.id) {
            return Err(StoreError::Duplicate);
        }
        rows.insert(record.id, record.clone());
        Ok(())
    }

    async fn get(&self, id: TrackId) -> Result<Option<OwnershipRecord>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected());
        }
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<OwnershipRecord>, StoreError> {
        let mut all: Vec<_> = self.rows.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(all)
    }

    async fn touch(&self, id: TrackId, at: DateTime<Utc>) -> Result<bool, StoreError> {
        Ok(match self.rows.write().await.get_mut(&id) {
            Some(row) => {
                row.updated_at = at;
                true
            }
            None => false,
        })
    }

    async fn delete(&self, id: TrackId) -> Result<bool, StoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(injected());
        }
        Ok(self.rows.write().await.remove(&id).is_some())
    }
}

#[derive(Default)]
pub struct MemoryDescriptorStore {
    docs: RwLock<HashMap<TrackId, DescriptorRecord>>,
    fail_inserts: AtomicBool,
    fail_locator_writes: AtomicBool,
}

impl MemoryDescriptorStore {
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_locator_writes(&self, fail: bool) {
        self.fail_locator_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DescriptorStore for MemoryDescriptorStore {
    async fn insert(&self, record: &DescriptorRecord) -> Result<(), StoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(injected());
        }
        let mut docs = self.docs.write().await;
        if docs.contains_key(&record.id) {
            return Err(StoreError::Duplicate);
        }
        docs.insert(record.id, record.clone());
        Ok(())
    }

    async fn get(&self, id: TrackId) -> Result<Option<DescriptorRecord>, StoreError> {
        Ok(self.docs.read().await.get(&id).cloned())
    }

    async fn get_many(&self, ids: &[TrackId]) -> Result<Vec<DescriptorRecord>, StoreError> {
        let docs = self.docs.read().await;
        Ok(ids.iter().filter_map(|id| docs.get(id).cloned()).collect())
    }

    async fn update(&self, record: &DescriptorRecord) -> Result<bool, StoreError> {
        Ok(match self.docs.write().await.get_mut(&record.id) {
            Some(doc) => {
                doc.descriptor = record.descriptor.clone();
                doc.updated_at = record.updated_at;
                true
            }
            None => false,
        })
    }

    async fn set_locator(
        &self,
        id: TrackId,
        locator: &str,
        at: DateTime<Utc>,
    ) -> Result<LocatorWrite, StoreError> {
        if self.fail_locator_writes.load(Ordering::SeqCst) {
            return Err(injected());
        }
        let mut docs = self.docs.write().await;
        let Some(doc) = docs.get_mut(&id) else {
            return Ok(LocatorWrite::Missing);
        };
        Ok(match doc.locator.as_deref() {
            None => {
                doc.locator = Some(locator.to_string());
                doc.updated_at = at;
                LocatorWrite::Written
            }
            Some(existing) if existing == locator => LocatorWrite::Unchanged,
            Some(existing) => LocatorWrite::Conflict(existing.to_string()),
        })
    }

    async fn delete(&self, id: TrackId) -> Result<bool, StoreError> {
        Ok(self.docs.write().await.remove(&id).is_some())
    }
}
