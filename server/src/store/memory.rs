use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ClaimGuard, IdempotencyStore, InflightClaims, ItemStore, StoreError, StoreResult};
use crate::model::{Fingerprint, IdempotencyRecord, Item, ItemChanges};

pub type Db = Arc<RwLock<HashMap<Uuid, Item>>>;

#[derive(Clone, Default)]
pub struct MemoryItemStore {
    items: Db,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn create(&self, item: Item) -> StoreResult<Item> {
        self.items.write().await.insert(item.id, item.clone());
        Ok(item)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Item>> {
        Ok(self.items.read().await.get(&id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Item>> {
        let mut items: Vec<Item> = self.items.read().await.values().cloned().collect();
        items.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(items)
    }

    async fn update_if_version(
        &self,
        id: Uuid,
        expected_version: i64,
        changes: &ItemChanges,
    ) -> StoreResult<Item> {
        let mut items = self.items.write().await;
        let item = items.get_mut(&id).ok_or(StoreError::NotFound)?;
        if item.version != expected_version {
            return Err(StoreError::VersionMismatch {
                current: item.version,
            });
        }
        changes.apply_to(item);
        item.version += 1;
        Ok(item.clone())
    }
}

#[derive(Clone, Default)]
pub struct MemoryIdempotencyStore {
    records: Arc<RwLock<HashMap<Fingerprint, IdempotencyRecord>>>,
    claims: InflightClaims,
}

impl MemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl IdempotencyStore for MemoryIdempotencyStore {
    async fn lookup(&self, fingerprint: &Fingerprint) -> StoreResult<Option<IdempotencyRecord>> {
        Ok(self.records.read().await.get(fingerprint).cloned())
    }

    async fn insert(&self, record: IdempotencyRecord) -> StoreResult<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.fingerprint) {
            return Err(StoreError::DuplicateKey);
        }
        records.insert(record.fingerprint.clone(), record);
        Ok(())
    }

    async fn claim(&self, fingerprint: &Fingerprint) -> ClaimGuard {
        self.claims.claim(fingerprint).await
    }
}
