//! SQLite backend via sqlx.
//!
//! All collections share one `records` table; the record body is stored as
//! JSON text. WAL mode is set on the connection, not in a migration, since
//! SQLite refuses to change `journal_mode` inside the transaction sqlx wraps
//! every migration in.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::kv::{require_id, KvStore, Record};

/// Cheap to clone (the pool is reference counted).
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run pending migrations.
    pub async fn open(path: &Path) -> StoreResult<Self> {
        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(opts).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        info!(path = %path.display(), "opened key store");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn decode(collection: &str, id: &str, body: &str) -> StoreResult<Record> {
        serde_json::from_str(body).map_err(|e| StoreError::Malformed {
            collection: collection.to_string(),
            id: id.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Record> {
        let body: Option<String> =
            sqlx::query_scalar("SELECT body FROM records WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match body {
            Some(body) => Self::decode(collection, id, &body),
            None => Err(StoreError::not_found(collection, id)),
        }
    }

    async fn put(&self, collection: &str, record: Record) -> StoreResult<()> {
        let id = require_id(collection, &record)?.to_string();
        let body = serde_json::to_string(&record)?;

        let result = sqlx::query("INSERT INTO records (collection, id, body) VALUES (?, ?, ?)")
            .bind(collection)
            .bind(&id)
            .bind(&body)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => {
                debug!(collection, id = %id, bytes = body.len(), "sqlite put");
                Ok(())
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::AlreadyExists {
                    collection: collection.to_string(),
                    id,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn replace(&self, collection: &str, record: Record) -> StoreResult<()> {
        let id = require_id(collection, &record)?.to_string();
        let body = serde_json::to_string(&record)?;

        let affected = sqlx::query("UPDATE records SET body = ? WHERE collection = ? AND id = ?")
            .bind(&body)
            .bind(collection)
            .bind(&id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(StoreError::not_found(collection, &id));
        }
        debug!(collection, id = %id, bytes = body.len(), "sqlite replace");
        Ok(())
    }
}
