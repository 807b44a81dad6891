use async_trait::async_trait;

use crate::{StorageError, user_config::UserConfigStorage};

pub struct SqliteUserConfigStorage {
    pool: sqlx::SqlitePool,
}

impl SqliteUserConfigStorage {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserConfigStorage for SqliteUserConfigStorage {
    async fn get(&self, chat_id: i64, key: &str) -> Result<Option<String>, StorageError> {
        let value: Option<(String,)> =
            sqlx::query_as("SELECT value FROM user_config WHERE chat_id = ? AND key = ?")
                .bind(chat_id)
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(value.map(|(v,)| v))
    }

    async fn set(&self, chat_id: i64, key: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query("INSERT OR REPLACE INTO user_config (chat_id, key, value) VALUES (?, ?, ?)")
            .bind(chat_id)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
