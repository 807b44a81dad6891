use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use remembra_models::{
    owner::Owner,
    reminder::{Reminder, ReminderId, ReminderState},
};

use crate::StorageError;

pub struct NewReminder {
    pub owner: Owner,
    pub text: String,
    pub due_at: Option<DateTime<Utc>>,
    pub lead_minutes: u32,
    pub creation_timezone: Tz,
}

/// Partial update. `None` leaves the column alone; for `due_at` the outer
/// option selects whether to touch it and the inner one is the new value.
#[derive(Debug, Default, Clone)]
pub struct ReminderPatch {
    pub text: Option<String>,
    pub due_at: Option<Option<DateTime<Utc>>>,
    pub lead_minutes: Option<u32>,
    pub state: Option<ReminderState>,
    pub creation_timezone: Option<Tz>,
}

#[async_trait]
pub trait ReminderStorage: Send + Sync {
    async fn get(&self, id: ReminderId) -> Result<Option<Reminder>, StorageError>;

    async fn insert(&self, reminder: NewReminder) -> Result<Reminder, StorageError>;

    /// Returns the updated reminder, or `None` when the id no longer exists.
    async fn update_fields(
        &self,
        id: ReminderId,
        patch: ReminderPatch,
    ) -> Result<Option<Reminder>, StorageError>;

    async fn delete(&self, id: ReminderId) -> Result<bool, StorageError>;

    async fn list_for_owner(&self, owner: Owner) -> Result<Vec<Reminder>, StorageError>;

    /// Pending reminders whose due time falls inside the owner's current
    /// calendar day in `tz`, ordered by due time. Feeds the daily digest.
    async fn list_due_today(
        &self,
        owner: Owner,
        tz: Tz,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reminder>, StorageError>;
}
