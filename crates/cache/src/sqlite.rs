use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use testsmith_core::{CacheKey, GenerationContext};
use tracing::debug;

use crate::error::{CacheError, Result};
use crate::store::{ContextCache, RETRY_BUDGET};

#[derive(Clone)]
pub struct SqliteContextStore {
    pool: SqlitePool,
}

impl SqliteContextStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Current budget for `key`, without consuming a credit.
    pub async fn remaining(&self, key: &CacheKey) -> Result<i64> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT remaining
            FROM retry_budgets
            WHERE cache_key = ?
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let (value,) = row.ok_or_else(|| CacheError::NotFound(key.to_string()))?;
        parse_budget(key, value)
    }
}

fn parse_budget(key: &CacheKey, value: String) -> Result<i64> {
    value
        .parse::<i64>()
        .map_err(|_| CacheError::CorruptBudget {
            key: key.to_string(),
            value,
        })
}

#[async_trait]
impl ContextCache for SqliteContextStore {
    async fn put(&self, key: &CacheKey, context: &GenerationContext) -> Result<()> {
        let payload = serde_json::to_string(context)?;
        let now = Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO generation_contexts (cache_key, payload, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(cache_key) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key.as_str())
        .bind(&payload)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO retry_budgets (cache_key, remaining)
            VALUES (?, ?)
            ON CONFLICT(cache_key) DO UPDATE SET remaining = excluded.remaining
            "#,
        )
        .bind(key.as_str())
        .bind(RETRY_BUDGET.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(key = %key, budget = RETRY_BUDGET, "Stored generation context");
        Ok(())
    }

    async fn get(&self, key: &CacheKey) -> Result<GenerationContext> {
        let mut tx = self.pool.begin().await?;

        // Decrement and read in one statement so that concurrent readers each
        // consume exactly one credit. Only well-formed integers are touched.
        let decremented: Option<(String,)> = sqlx::query_as(
            r#"
            UPDATE retry_budgets
            SET remaining = CAST(MAX(CAST(remaining AS INTEGER) - 1, 0) AS TEXT)
            WHERE cache_key = ?
              AND CAST(CAST(remaining AS INTEGER) AS TEXT) = remaining
            RETURNING remaining
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let remaining = match decremented {
            Some((value,)) => parse_budget(key, value)?,
            None => {
                let raw: Option<(String,)> =
                    sqlx::query_as("SELECT remaining FROM retry_budgets WHERE cache_key = ?")
                        .bind(key.as_str())
                        .fetch_optional(&mut *tx)
                        .await?;

                return Err(match raw {
                    Some((value,)) => CacheError::CorruptBudget {
                        key: key.to_string(),
                        value,
                    },
                    None => CacheError::NotFound(key.to_string()),
                });
            }
        };

        let payload: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT payload
            FROM generation_contexts
            WHERE cache_key = ?
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        // Dropping the transaction rolls the decrement back.
        let (payload,) = payload.ok_or_else(|| CacheError::NotFound(key.to_string()))?;
        let context = serde_json::from_str(&payload)?;

        tx.commit().await?;

        debug!(key = %key, remaining, "Read generation context");
        Ok(context)
    }

    async fn update(&self, key: &CacheKey, context: &GenerationContext) -> Result<()> {
        let payload = serde_json::to_string(context)?;
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE generation_contexts
            SET payload = ?, updated_at = ?
            WHERE cache_key = ?
            "#,
        )
        .bind(&payload)
        .bind(now)
        .bind(key.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CacheError::NotFound(key.to_string()));
        }

        debug!(key = %key, "Updated generation context");
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM generation_contexts WHERE cache_key = ?")
            .bind(key.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM retry_budgets WHERE cache_key = ?")
            .bind(key.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(key = %key, "Deleted generation context");
        Ok(())
    }

    async fn is_exhausted(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.remaining(key).await? <= 0)
    }
}
