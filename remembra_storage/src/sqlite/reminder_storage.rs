mod model;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use model::ReminderRow;

use remembra_models::{
    owner::Owner,
    reminder::{Reminder, ReminderId},
};

use crate::{
    StorageError,
    reminder::{NewReminder, ReminderPatch, ReminderStorage},
};

pub struct SqliteReminderStorage {
    pool: sqlx::SqlitePool,
}

impl SqliteReminderStorage {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReminderStorage for SqliteReminderStorage {
    async fn get(&self, id: ReminderId) -> Result<Option<Reminder>, StorageError> {
        let row = sqlx::query_as::<_, ReminderRow>("SELECT * FROM reminders WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Reminder::try_from).transpose()
    }

    async fn insert(&self, reminder: NewReminder) -> Result<Reminder, StorageError> {
        let NewReminder {
            owner,
            text,
            due_at,
            lead_minutes,
            creation_timezone,
        } = reminder;

        let row = sqlx::query_as::<_, ReminderRow>(
            "INSERT INTO reminders (user_id, chat_id, text, due_at, lead_minutes, state, creation_timezone)
             VALUES (?, ?, ?, ?, ?, 'Pending', ?)
             RETURNING *",
        )
        .bind(owner.user_id)
        .bind(owner.chat_id)
        .bind(text)
        .bind(due_at)
        .bind(lead_minutes as i64)
        .bind(creation_timezone.to_string())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn update_fields(
        &self,
        id: ReminderId,
        patch: ReminderPatch,
    ) -> Result<Option<Reminder>, StorageError> {
        // Read-modify-write keeps the SQL static. Fine for a
        // single-process bot where the scheduler already serializes
        // per-reminder mutations.
        let Some(current) = self.get(id).await? else {
            return Ok(None);
        };

        let text = patch.text.unwrap_or(current.text);
        let due_at = patch.due_at.unwrap_or(current.due_at);
        let lead_minutes = patch.lead_minutes.unwrap_or(current.lead_minutes);
        let state = patch.state.unwrap_or(current.state);
        let creation_timezone = patch.creation_timezone.unwrap_or(current.creation_timezone);

        let row = sqlx::query_as::<_, ReminderRow>(
            "UPDATE reminders
             SET text = ?, due_at = ?, lead_minutes = ?, state = ?, creation_timezone = ?
             WHERE id = ?
             RETURNING *",
        )
        .bind(text)
        .bind(due_at)
        .bind(lead_minutes as i64)
        .bind(model::state_to_str(state))
        .bind(creation_timezone.to_string())
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Some(row.try_into()?))
    }

    async fn delete(&self, id: ReminderId) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM reminders WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_for_owner(&self, owner: Owner) -> Result<Vec<Reminder>, StorageError> {
        let rows = sqlx::query_as::<_, ReminderRow>(
            "SELECT * FROM reminders WHERE chat_id = ? ORDER BY due_at ASC",
        )
        .bind(owner.chat_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Reminder::try_from).collect()
    }

    async fn list_due_today(
        &self,
        owner: Owner,
        tz: Tz,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reminder>, StorageError> {
        // Day bounds computed in the user's zone, queried in UTC.
        let local_now = now.with_timezone(&tz);
        let start_of_day = local_now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .and_then(|naive| tz.from_local_datetime(&naive).earliest())
            .map(|local| local.with_timezone(&Utc))
            .unwrap_or(now);
        let end_of_day = start_of_day + TimeDelta::days(1);

        let rows = sqlx::query_as::<_, ReminderRow>(
            "SELECT * FROM reminders
             WHERE chat_id = ? AND state = 'Pending'
               AND due_at IS NOT NULL AND due_at >= ? AND due_at < ?
             ORDER BY due_at ASC",
        )
        .bind(owner.chat_id)
        .bind(start_of_day)
        .bind(end_of_day)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Reminder::try_from).collect()
    }
}
