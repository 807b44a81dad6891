use serde::{Deserialize, Serialize};

/// The user+chat identity a reminder belongs to. `user_id` identifies
/// who created it, `chat_id` is where notifications get delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    pub user_id: i64,
    pub chat_id: i64,
}
