use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;

use remembra_models::fixed::Weekdays;

use crate::StorageError;

/// When a persisted job fires.
#[derive(Debug, Clone, PartialEq)]
pub enum JobSchedule {
    Once {
        fire_at: DateTime<Utc>,
    },
    Recurring {
        time_of_day: NaiveTime,
        weekdays: Weekdays,
        timezone: Tz,
    },
}

/// Durable image of a registered trigger. The job table is the sole
/// source of truth for what fires next, so a restart can re-arm
/// everything from it without external intervention.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub trigger_id: String,
    pub schedule: JobSchedule,
    pub payload: serde_json::Value,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert or replace by trigger id. Replacement keyed on the id is
    /// what makes re-registration a safe replace instead of a duplicate.
    async fn upsert(&self, record: JobRecord) -> Result<(), StorageError>;

    /// Returns whether a record existed. Absence is success.
    async fn remove(&self, trigger_id: &str) -> Result<bool, StorageError>;

    async fn clear(&self) -> Result<(), StorageError>;

    async fn load_all(&self) -> Result<Vec<JobRecord>, StorageError>;
}
