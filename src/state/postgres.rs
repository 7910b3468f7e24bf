//! Postgres-backed conversation state store

use super::StateStore;
use crate::error::{require_owner, BotError};
use crate::models::ConversationState;
use crate::Result;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tokio::sync::OnceCell;

pub struct PostgresStateStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PostgresStateStore {
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
                    CREATE TABLE IF NOT EXISTS conversation_states (
                      owner TEXT PRIMARY KEY,
                      state SMALLINT NOT NULL,
                      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                BotError::DatabaseError(format!(
                    "Failed to initialize conversation state schema: {}",
                    e
                ))
            })?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl StateStore for PostgresStateStore {
    async fn get(&self, owner: &str) -> Result<ConversationState> {
        require_owner(owner)?;
        self.ensure_schema().await?;

        let row = sqlx::query("SELECT state FROM conversation_states WHERE owner = $1")
            .bind(owner)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                BotError::DatabaseError(format!("Failed to load conversation state: {}", e))
            })?;

        match row {
            Some(row) => {
                let code: i16 = row.try_get("state")?;
                ConversationState::from_code(code)
            }
            None => Ok(ConversationState::Idle),
        }
    }

    async fn set(&self, owner: &str, state: ConversationState) -> Result<()> {
        require_owner(owner)?;
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO conversation_states (owner, state, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (owner) DO UPDATE SET state = EXCLUDED.state, updated_at = NOW()
            "#,
        )
        .bind(owner)
        .bind(state.code())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            BotError::DatabaseError(format!("Failed to save conversation state: {}", e))
        })?;

        Ok(())
    }
}
