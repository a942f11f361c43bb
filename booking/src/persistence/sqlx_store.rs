use anyhow::Context;
use async_trait::async_trait;
use sqlx::{AnyPool, Row};

use crate::persistence::KeyValueStore;
use crate::time::now_ms;

/// SQLx-backed implementation of `KeyValueStore`.
/// Responsible only for persistence; values are opaque strings here.
pub struct SqlxKeyValueStore {
    pool: AnyPool,
}

impl SqlxKeyValueStore {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyValueStore for SqlxKeyValueStore {
    async fn get_raw(&self, key: &str) -> anyhow::Result<Option<String>> {
        let row = sqlx::query(
            r#"
SELECT value
FROM kv_store
WHERE key = ?;
"#,
        )
        .bind(key.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(
                r.try_get::<String, _>("value")
                    .context("kv_store.value is not text")?,
            )),
            None => Ok(None),
        }
    }

    async fn set_raw(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let updated_ms = i64::try_from(now_ms()).context("clock out of range")?;

        sqlx::query(
            r#"
INSERT INTO kv_store (key, value, updated_ms)
VALUES (?, ?, ?)
ON CONFLICT(key) DO UPDATE SET
  value = excluded.value,
  updated_ms = excluded.updated_ms;
"#,
        )
        .bind(key.to_string())
        .bind(value.to_string())
        .bind(updated_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        sqlx::query(r#"DELETE FROM kv_store WHERE key = ?;"#)
            .bind(key.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
