use async_trait::async_trait;

use crate::StorageError;

/// IANA timezone the user picked during onboarding.
pub const KEY_TIMEZONE: &str = "user_timezone";
/// Local `HH:MM` at which the daily digest goes out.
pub const KEY_DIGEST_TIME: &str = "digest_time";

/// Per-chat key-value settings.
#[async_trait]
pub trait UserConfigStorage: Send + Sync {
    async fn get(&self, chat_id: i64, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, chat_id: i64, key: &str, value: &str) -> Result<(), StorageError>;
}
