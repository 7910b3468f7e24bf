//! Postgres-backed ledger and tag store

use super::{LedgerStore, TagStore};
use crate::error::{require_owner, BotError};
use crate::models::{Entry, Tag, TimeRange};
use crate::Result;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tokio::sync::OnceCell;

pub struct PostgresLedgerStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS ledger_entries (
                      entry_id BIGSERIAL PRIMARY KEY,
                      owner TEXT NOT NULL,
                      value DOUBLE PRECISION NOT NULL CHECK (value >= 0),
                      is_payment BOOLEAN NOT NULL,
                      created_at TIMESTAMPTZ NOT NULL,
                      description TEXT NOT NULL DEFAULT '',
                      tags TEXT[] NOT NULL DEFAULT '{}'
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE INDEX IF NOT EXISTS idx_ledger_entries_owner_time
                    ON ledger_entries (owner, created_at);
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS ledger_tags (
                      tag_id BIGSERIAL PRIMARY KEY,
                      owner TEXT NOT NULL,
                      name TEXT NOT NULL,
                      created_at TIMESTAMPTZ NOT NULL
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                BotError::DatabaseError(format!("Failed to initialize ledger schema: {}", e))
            })?;

        Ok(())
    }

    /// Id of the newest entry; the serial id breaks timestamp ties
    async fn most_recent_id(&self, owner: &str) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT entry_id FROM ledger_entries
            WHERE owner = $1
            ORDER BY created_at DESC, entry_id DESC
            LIMIT 1
            "#,
        )
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| BotError::DatabaseError(format!("Failed to find last entry: {}", e)))?;

        let row = row.ok_or(BotError::NoEntries)?;
        Ok(row.try_get("entry_id")?)
    }

    fn entry_from_row(row: &PgRow) -> Result<Entry> {
        Ok(Entry {
            value: row.try_get("value")?,
            is_payment: row.try_get("is_payment")?,
            owner: row.try_get("owner")?,
            created_at: row.try_get("created_at")?,
            description: row.try_get("description")?,
            tags: row.try_get("tags")?,
        })
    }
}

#[async_trait::async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn append(&self, entry: Entry) -> Result<()> {
        require_owner(&entry.owner)?;
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO ledger_entries (owner, value, is_payment, created_at, description, tags)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&entry.owner)
        .bind(entry.value)
        .bind(entry.is_payment)
        .bind(entry.created_at)
        .bind(&entry.description)
        .bind(&entry.tags)
        .execute(&self.pool)
        .await
        .map_err(|e| BotError::DatabaseError(format!("Failed to insert entry: {}", e)))?;

        Ok(())
    }

    async fn query(&self, owner: &str, range: Option<TimeRange>) -> Result<Vec<Entry>> {
        require_owner(owner)?;
        self.ensure_schema().await?;

        let rows = match range {
            Some(range) => {
                sqlx::query(
                    r#"
                    SELECT owner, value, is_payment, created_at, description, tags
                    FROM ledger_entries
                    WHERE owner = $1 AND created_at >= $2 AND created_at < $3
                    ORDER BY created_at ASC, entry_id ASC
                    "#,
                )
                .bind(owner)
                .bind(range.start)
                .bind(range.end)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT owner, value, is_payment, created_at, description, tags
                    FROM ledger_entries
                    WHERE owner = $1
                    ORDER BY created_at ASC, entry_id ASC
                    "#,
                )
                .bind(owner)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| BotError::DatabaseError(format!("Failed to load entries: {}", e)))?;

        rows.iter().map(Self::entry_from_row).collect()
    }

    async fn delete_most_recent(&self, owner: &str) -> Result<()> {
        require_owner(owner)?;
        self.ensure_schema().await?;

        let entry_id = self.most_recent_id(owner).await?;

        sqlx::query("DELETE FROM ledger_entries WHERE entry_id = $1")
            .bind(entry_id)
            .execute(&self.pool)
            .await
            .map_err(|e| BotError::DatabaseError(format!("Failed to delete entry: {}", e)))?;

        Ok(())
    }

    async fn delete_all(&self, owner: &str) -> Result<()> {
        require_owner(owner)?;
        self.ensure_schema().await?;

        sqlx::query("DELETE FROM ledger_entries WHERE owner = $1")
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(|e| BotError::DatabaseError(format!("Failed to clear entries: {}", e)))?;

        Ok(())
    }

    async fn attach_tag_to_most_recent(&self, owner: &str, tag: &str) -> Result<()> {
        require_owner(owner)?;
        self.ensure_schema().await?;

        let entry_id = self.most_recent_id(owner).await?;

        sqlx::query(
            r#"
            UPDATE ledger_entries
            SET tags = array_append(tags, $2)
            WHERE entry_id = $1 AND NOT ($2 = ANY(tags))
            "#,
        )
        .bind(entry_id)
        .bind(tag)
        .execute(&self.pool)
        .await
        .map_err(|e| BotError::DatabaseError(format!("Failed to tag entry: {}", e)))?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl TagStore for PostgresLedgerStore {
    async fn append(&self, tag: Tag) -> Result<()> {
        require_owner(&tag.owner)?;
        self.ensure_schema().await?;

        sqlx::query("INSERT INTO ledger_tags (owner, name, created_at) VALUES ($1, $2, $3)")
            .bind(&tag.owner)
            .bind(&tag.name)
            .bind(tag.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| BotError::DatabaseError(format!("Failed to insert tag: {}", e)))?;

        Ok(())
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Tag>> {
        require_owner(owner)?;
        self.ensure_schema().await?;

        let rows = sqlx::query(
            "SELECT owner, name, created_at FROM ledger_tags WHERE owner = $1 ORDER BY tag_id ASC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BotError::DatabaseError(format!("Failed to load tags: {}", e)))?;

        rows.iter()
            .map(|row| -> Result<Tag> {
                Ok(Tag {
                    name: row.try_get("name")?,
                    owner: row.try_get("owner")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}
