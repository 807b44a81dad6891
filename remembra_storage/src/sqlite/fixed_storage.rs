use async_trait::async_trait;
use chrono::NaiveTime;
use chrono_tz::Tz;

use remembra_models::{
    fixed::{FixedReminder, FixedReminderId, Weekdays},
    owner::Owner,
};

use crate::{
    StorageError,
    fixed::{FixedReminderStorage, NewFixedReminder},
};

pub struct SqliteFixedReminderStorage {
    pool: sqlx::SqlitePool,
}

impl SqliteFixedReminderStorage {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct FixedReminderRow {
    id: i64,
    user_id: i64,
    chat_id: i64,
    text: String,
    time_of_day: NaiveTime,
    timezone: String,
    weekday_mask: i64,
}

impl TryFrom<FixedReminderRow> for FixedReminder {
    type Error = StorageError;

    fn try_from(row: FixedReminderRow) -> Result<Self, Self::Error> {
        let timezone: Tz = row
            .timezone
            .parse()
            .map_err(|_| StorageError::Corrupt(format!("unknown timezone '{}'", row.timezone)))?;
        let weekdays = Weekdays::from_mask(row.weekday_mask as u8).map_err(|_| {
            StorageError::Corrupt(format!("empty weekday mask for fixed reminder {}", row.id))
        })?;

        Ok(FixedReminder {
            id: row.id,
            owner: Owner {
                user_id: row.user_id,
                chat_id: row.chat_id,
            },
            text: row.text,
            time_of_day: row.time_of_day,
            timezone,
            weekdays,
        })
    }
}

#[async_trait]
impl FixedReminderStorage for SqliteFixedReminderStorage {
    async fn get(&self, id: FixedReminderId) -> Result<Option<FixedReminder>, StorageError> {
        let row =
            sqlx::query_as::<_, FixedReminderRow>("SELECT * FROM fixed_reminders WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(FixedReminder::try_from).transpose()
    }

    async fn insert(&self, fixed: NewFixedReminder) -> Result<FixedReminder, StorageError> {
        let NewFixedReminder {
            owner,
            text,
            time_of_day,
            timezone,
            weekdays,
        } = fixed;

        let row = sqlx::query_as::<_, FixedReminderRow>(
            "INSERT INTO fixed_reminders (user_id, chat_id, text, time_of_day, timezone, weekday_mask)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(owner.user_id)
        .bind(owner.chat_id)
        .bind(text)
        .bind(time_of_day)
        .bind(timezone.to_string())
        .bind(weekdays.mask() as i64)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn update(&self, fixed: FixedReminder) -> Result<FixedReminder, StorageError> {
        let row = sqlx::query_as::<_, FixedReminderRow>(
            "UPDATE fixed_reminders
             SET text = ?, time_of_day = ?, timezone = ?, weekday_mask = ?
             WHERE id = ?
             RETURNING *",
        )
        .bind(fixed.text)
        .bind(fixed.time_of_day)
        .bind(fixed.timezone.to_string())
        .bind(fixed.weekdays.mask() as i64)
        .bind(fixed.id)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn delete(&self, id: FixedReminderId) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM fixed_reminders WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_for_owner(&self, owner: Owner) -> Result<Vec<FixedReminder>, StorageError> {
        let rows = sqlx::query_as::<_, FixedReminderRow>(
            "SELECT * FROM fixed_reminders WHERE chat_id = ? ORDER BY time_of_day ASC",
        )
        .bind(owner.chat_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FixedReminder::try_from).collect()
    }
}
