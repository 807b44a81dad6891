use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;

use remembra_models::fixed::Weekdays;

use crate::{
    StorageError,
    job::{JobRecord, JobSchedule, JobStore},
};

const KIND_ONCE: &str = "once";
const KIND_RECURRING: &str = "recurring";

pub struct SqliteJobStore {
    pool: sqlx::SqlitePool,
}

impl SqliteJobStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    trigger_id: String,
    kind: String,
    fire_at: Option<DateTime<Utc>>,
    time_of_day: Option<NaiveTime>,
    weekday_mask: Option<i64>,
    timezone: Option<String>,
    payload: String,
}

impl TryFrom<JobRow> for JobRecord {
    type Error = StorageError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let schedule = match row.kind.as_str() {
            KIND_ONCE => {
                let fire_at = row.fire_at.ok_or_else(|| {
                    StorageError::Corrupt(format!("once job '{}' has no fire_at", row.trigger_id))
                })?;
                JobSchedule::Once { fire_at }
            }
            KIND_RECURRING => {
                let missing = |field: &str| {
                    StorageError::Corrupt(format!(
                        "recurring job '{}' has no {}",
                        row.trigger_id, field
                    ))
                };
                let time_of_day = row.time_of_day.ok_or_else(|| missing("time_of_day"))?;
                let mask = row.weekday_mask.ok_or_else(|| missing("weekday_mask"))?;
                let weekdays = Weekdays::from_mask(mask as u8)
                    .map_err(|_| StorageError::Corrupt("empty weekday mask".to_string()))?;
                let tz_name = row.timezone.ok_or_else(|| missing("timezone"))?;
                let timezone: Tz = tz_name
                    .parse()
                    .map_err(|_| StorageError::Corrupt(format!("unknown timezone '{tz_name}'")))?;

                JobSchedule::Recurring {
                    time_of_day,
                    weekdays,
                    timezone,
                }
            }
            other => {
                return Err(StorageError::Corrupt(format!("unknown job kind '{other}'")));
            }
        };

        let payload = serde_json::from_str(&row.payload)
            .map_err(|e| StorageError::Corrupt(format!("bad job payload: {e}")))?;

        Ok(JobRecord {
            trigger_id: row.trigger_id,
            schedule,
            payload,
        })
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn upsert(&self, record: JobRecord) -> Result<(), StorageError> {
        let (kind, fire_at, time_of_day, weekday_mask, timezone) = match record.schedule {
            JobSchedule::Once { fire_at } => (KIND_ONCE, Some(fire_at), None, None, None),
            JobSchedule::Recurring {
                time_of_day,
                weekdays,
                timezone,
            } => (
                KIND_RECURRING,
                None,
                Some(time_of_day),
                Some(weekdays.mask() as i64),
                Some(timezone.to_string()),
            ),
        };

        sqlx::query(
            "INSERT OR REPLACE INTO scheduled_jobs
                 (trigger_id, kind, fire_at, time_of_day, weekday_mask, timezone, payload)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.trigger_id)
        .bind(kind)
        .bind(fire_at)
        .bind(time_of_day)
        .bind(weekday_mask)
        .bind(timezone)
        .bind(record.payload.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, trigger_id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM scheduled_jobs WHERE trigger_id = ?")
            .bind(trigger_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM scheduled_jobs")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<JobRecord>, StorageError> {
        let rows = sqlx::query_as::<_, JobRow>("SELECT * FROM scheduled_jobs")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(JobRecord::try_from).collect()
    }
}
