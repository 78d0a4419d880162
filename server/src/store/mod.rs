//! Persistence contracts for items and idempotency records.
//!
//! Both stores come in two flavours: [`memory`] keeps everything behind a
//! lock in the process, [`sqlite`] persists through `sqlx`. The compare and
//! uniqueness checks the service relies on live in the store implementations,
//! never in handler code.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{Fingerprint, IdempotencyRecord, Item, ItemChanges};

mod inflight;
pub mod memory;
pub mod sqlite;

pub use inflight::{ClaimGuard, InflightClaims};
pub use memory::{MemoryIdempotencyStore, MemoryItemStore};
pub use sqlite::SqliteStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("stored version is {current}")]
    VersionMismatch { current: i64 },
    #[error("idempotency fingerprint already recorded")]
    DuplicateKey,
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn create(&self, item: Item) -> StoreResult<Item>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Item>>;

    /// All items, newest first.
    async fn list(&self) -> StoreResult<Vec<Item>>;

    /// Applies `changes` and bumps the version by one, but only while the
    /// stored version still equals `expected_version`. The comparison and the
    /// write happen as one atomic step.
    async fn update_if_version(
        &self,
        id: Uuid,
        expected_version: i64,
        changes: &ItemChanges,
    ) -> StoreResult<Item>;
}

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    async fn lookup(&self, fingerprint: &Fingerprint) -> StoreResult<Option<IdempotencyRecord>>;

    /// Fails with [`StoreError::DuplicateKey`] when the fingerprint tuple is
    /// already recorded.
    async fn insert(&self, record: IdempotencyRecord) -> StoreResult<()>;

    /// Waits until no other request in this process holds `fingerprint`.
    async fn claim(&self, fingerprint: &Fingerprint) -> ClaimGuard;
}
