use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use uuid::Uuid;

use super::{ClaimGuard, IdempotencyStore, InflightClaims, ItemStore, StoreError, StoreResult};
use crate::model::{Fingerprint, IdempotencyRecord, Item, ItemChanges};

const ITEM_COLUMNS: &str = "id, title, done, created_at, version";

/// SQLite-backed item and idempotency store.
///
/// One pool serves both tables. Version checks are folded into the
/// `UPDATE` statement and fingerprint uniqueness is a unique index, so both
/// guarantees hold across every process sharing the database file.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    claims: InflightClaims,
}

impl SqliteStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            claims: InflightClaims::new(),
        };
        store.migrate().await?;
        tracing::info!(database_url, "sqlite store ready");
        Ok(store)
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    // Fixed width keeps lexical order equal to chronological order.
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| StoreError::Corrupt(format!("created_at {raw:?}: {err}")))
}

fn parse_id(raw: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(raw).map_err(|err| StoreError::Corrupt(format!("id {raw:?}: {err}")))
}

fn item_from_row(row: &SqliteRow) -> StoreResult<Item> {
    let id: String = row.try_get("id")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(Item {
        id: parse_id(&id)?,
        title: row.try_get("title")?,
        done: row.try_get("done")?,
        created_at: parse_timestamp(&created_at)?,
        version: row.try_get("version")?,
    })
}

fn record_from_row(row: &SqliteRow) -> StoreResult<IdempotencyRecord> {
    let id: String = row.try_get("id")?;
    let created_at: String = row.try_get("created_at")?;
    let status_code: i64 = row.try_get("status_code")?;
    Ok(IdempotencyRecord {
        id: parse_id(&id)?,
        fingerprint: Fingerprint {
            key: row.try_get("key")?,
            method: row.try_get("method")?,
            path_and_query: row.try_get("path_and_query")?,
            request_hash: row.try_get("request_hash")?,
        },
        status_code: u16::try_from(status_code)
            .map_err(|_| StoreError::Corrupt(format!("status_code {status_code}")))?,
        content_type: row.try_get("content_type")?,
        response_body: row.try_get("response_body")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[async_trait]
impl ItemStore for SqliteStore {
    async fn create(&self, item: Item) -> StoreResult<Item> {
        sqlx::query(
            "INSERT INTO items (id, title, done, created_at, version) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(item.id.to_string())
        .bind(&item.title)
        .bind(item.done)
        .bind(format_timestamp(item.created_at))
        .bind(item.version)
        .execute(&self.pool)
        .await?;
        Ok(item)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Item>> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn list(&self) -> StoreResult<Vec<Item>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items ORDER BY created_at DESC, rowid DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(item_from_row).collect()
    }

    async fn update_if_version(
        &self,
        id: Uuid,
        expected_version: i64,
        changes: &ItemChanges,
    ) -> StoreResult<Item> {
        let updated = sqlx::query(&format!(
            "UPDATE items \
             SET title = COALESCE(?, title), done = COALESCE(?, done), version = version + 1 \
             WHERE id = ? AND version = ? \
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(changes.title.as_deref())
        .bind(changes.done)
        .bind(id.to_string())
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = updated {
            return item_from_row(&row);
        }

        let current: Option<i64> = sqlx::query_scalar("SELECT version FROM items WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match current {
            Some(current) => Err(StoreError::VersionMismatch { current }),
            None => Err(StoreError::NotFound),
        }
    }
}

#[async_trait]
impl IdempotencyStore for SqliteStore {
    async fn lookup(&self, fingerprint: &Fingerprint) -> StoreResult<Option<IdempotencyRecord>> {
        let row = sqlx::query(
            "SELECT id, key, method, path_and_query, request_hash, status_code, content_type, \
             response_body, created_at \
             FROM idempotency_records \
             WHERE key = ? AND method = ? AND path_and_query = ? AND request_hash = ?",
        )
        .bind(&fingerprint.key)
        .bind(&fingerprint.method)
        .bind(&fingerprint.path_and_query)
        .bind(&fingerprint.request_hash)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn insert(&self, record: IdempotencyRecord) -> StoreResult<()> {
        let result = sqlx::query(
            "INSERT INTO idempotency_records \
             (id, key, method, path_and_query, request_hash, status_code, content_type, \
              response_body, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(&record.fingerprint.key)
        .bind(&record.fingerprint.method)
        .bind(&record.fingerprint.path_and_query)
        .bind(&record.fingerprint.request_hash)
        .bind(i64::from(record.status_code))
        .bind(&record.content_type)
        .bind(&record.response_body)
        .bind(format_timestamp(record.created_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(StoreError::DuplicateKey)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn claim(&self, fingerprint: &Fingerprint) -> ClaimGuard {
        self.claims.claim(fingerprint).await
    }
}
