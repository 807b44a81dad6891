use async_trait::async_trait;
use chrono::NaiveTime;
use chrono_tz::Tz;

use remembra_models::{
    fixed::{FixedReminder, FixedReminderId, Weekdays},
    owner::Owner,
};

use crate::StorageError;

pub struct NewFixedReminder {
    pub owner: Owner,
    pub text: String,
    pub time_of_day: NaiveTime,
    pub timezone: Tz,
    pub weekdays: Weekdays,
}

#[async_trait]
pub trait FixedReminderStorage: Send + Sync {
    async fn get(&self, id: FixedReminderId) -> Result<Option<FixedReminder>, StorageError>;

    async fn insert(&self, fixed: NewFixedReminder) -> Result<FixedReminder, StorageError>;

    async fn update(&self, fixed: FixedReminder) -> Result<FixedReminder, StorageError>;

    async fn delete(&self, id: FixedReminderId) -> Result<bool, StorageError>;

    async fn list_for_owner(&self, owner: Owner) -> Result<Vec<FixedReminder>, StorageError>;
}
