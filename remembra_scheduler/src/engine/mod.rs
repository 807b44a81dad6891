mod tokio_engine;

use std::{fmt, str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use remembra_models::{
    fixed::{FixedReminderId, Weekdays},
    owner::Owner,
    reminder::ReminderId,
};
use remembra_storage::StorageError;

pub use tokio_engine::{EngineConfig, TokioTriggerEngine};

/// Tolerance for triggers whose due time passed while the process was
/// down. Within the window they still fire on restart; outside it they
/// are dropped silently, no backfill.
pub const DEFAULT_MISFIRE_GRACE: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum TriggerEngineError {
    #[error(transparent)]
    Store(#[from] StorageError),

    #[error("trigger engine is shut down")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    Main,
    PreAlert,
    Fixed,
    Digest,
}

/// Trigger identity, deterministically derived from the thing it fires
/// for. Registering under an existing id always replaces, so deriving
/// the id from `(reminder, kind)` makes re-scheduling duplicate-free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerId {
    kind: TriggerKind,
    key: i64,
}

impl TriggerId {
    pub fn main(id: ReminderId) -> Self {
        Self {
            kind: TriggerKind::Main,
            key: id,
        }
    }

    pub fn pre_alert(id: ReminderId) -> Self {
        Self {
            kind: TriggerKind::PreAlert,
            key: id,
        }
    }

    pub fn fixed(id: FixedReminderId) -> Self {
        Self {
            kind: TriggerKind::Fixed,
            key: id,
        }
    }

    pub fn digest(chat_id: i64) -> Self {
        Self {
            kind: TriggerKind::Digest,
            key: chat_id,
        }
    }

    pub fn kind(&self) -> TriggerKind {
        self.kind
    }

    pub fn key(&self) -> i64 {
        self.key
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            TriggerKind::Main => "main",
            TriggerKind::PreAlert => "alert",
            TriggerKind::Fixed => "fixed",
            TriggerKind::Digest => "digest",
        };
        write!(f, "{prefix}:{}", self.key)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("not a valid trigger id: '{0}'")]
pub struct ParseTriggerIdError(String);

impl FromStr for TriggerId {
    type Err = ParseTriggerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ParseTriggerIdError(s.to_string());
        let (prefix, key) = s.split_once(':').ok_or_else(bad)?;
        let kind = match prefix {
            "main" => TriggerKind::Main,
            "alert" => TriggerKind::PreAlert,
            "fixed" => TriggerKind::Fixed,
            "digest" => TriggerKind::Digest,
            _ => return Err(bad()),
        };
        let key = key.parse().map_err(|_| bad())?;

        Ok(Self { kind, key })
    }
}

/// What a fired trigger carries back to the scheduler. Kept minimal:
/// the fire handler re-reads the reminder from storage so a fire racing
/// a delete or completion sees current state, not a stale snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPayload {
    pub reminder_id: Option<i64>,
    pub owner: Owner,
}

#[derive(Debug, Clone)]
pub struct OnceTrigger {
    pub id: TriggerId,
    pub fire_at: DateTime<Utc>,
    pub payload: TriggerPayload,
}

#[derive(Debug, Clone)]
pub struct RecurringTrigger {
    pub id: TriggerId,
    pub time_of_day: NaiveTime,
    pub weekdays: Weekdays,
    pub timezone: Tz,
    pub payload: TriggerPayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredTrigger {
    pub id: TriggerId,
    pub payload: TriggerPayload,
}

/// Ordered set of pending triggers, fired each at its due time, exactly
/// once, with bounded misfire tolerance. The scheduler exclusively owns
/// trigger lifecycle through this interface.
#[async_trait]
pub trait TriggerEngine: Send + Sync {
    /// Atomic replace: an existing registration under the same id is
    /// superseded, never duplicated.
    async fn register_once(&self, trigger: OnceTrigger) -> Result<(), TriggerEngineError>;

    async fn register_recurring(&self, trigger: RecurringTrigger)
    -> Result<(), TriggerEngineError>;

    /// Idempotent; returns whether anything existed to cancel.
    async fn cancel(&self, id: &TriggerId) -> Result<bool, TriggerEngineError>;

    async fn cancel_all(&self) -> Result<(), TriggerEngineError>;

    async fn exists(&self, id: &TriggerId) -> Result<bool, TriggerEngineError>;
}

#[cfg(test)]
mod trigger_id_tests {
    use super::*;

    #[test]
    fn display_and_parse_round_trip() {
        for id in [
            TriggerId::main(7),
            TriggerId::pre_alert(7),
            TriggerId::fixed(3),
            TriggerId::digest(-100500),
        ] {
            let parsed: TriggerId = id.to_string().parse().unwrap();
            assert_eq!(parsed, id);
        }
    }

    #[test]
    fn main_and_pre_alert_ids_differ_for_same_reminder() {
        assert_ne!(TriggerId::main(1), TriggerId::pre_alert(1));
    }

    #[test]
    fn garbage_does_not_parse() {
        assert!("recordatorio_5".parse::<TriggerId>().is_err());
        assert!("main:".parse::<TriggerId>().is_err());
        assert!("main".parse::<TriggerId>().is_err());
    }
}
