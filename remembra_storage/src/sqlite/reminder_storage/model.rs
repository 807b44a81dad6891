use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use remembra_models::{
    owner::Owner,
    reminder::{Reminder, ReminderState},
};

use crate::StorageError;

#[derive(sqlx::FromRow)]
pub struct ReminderRow {
    pub id: i64,
    pub user_id: i64,
    pub chat_id: i64,
    pub text: String,
    pub due_at: Option<DateTime<Utc>>,
    pub lead_minutes: i64,
    pub state: String,
    pub creation_timezone: String,
}

impl TryFrom<ReminderRow> for Reminder {
    type Error = StorageError;

    fn try_from(row: ReminderRow) -> Result<Self, Self::Error> {
        let state = parse_state(&row.state);
        let creation_timezone: Tz = row.creation_timezone.parse().map_err(|_| {
            StorageError::Corrupt(format!("unknown timezone '{}'", row.creation_timezone))
        })?;

        Ok(Reminder {
            id: row.id,
            owner: Owner {
                user_id: row.user_id,
                chat_id: row.chat_id,
            },
            text: row.text,
            due_at: row.due_at,
            lead_minutes: row.lead_minutes.max(0) as u32,
            state,
            creation_timezone,
        })
    }
}

pub fn state_to_str(state: ReminderState) -> &'static str {
    match state {
        ReminderState::Pending => "Pending",
        ReminderState::Done => "Done",
    }
}

fn parse_state(state: &str) -> ReminderState {
    match state {
        "Pending" => ReminderState::Pending,
        "Done" => ReminderState::Done,
        other => {
            log::warn!("Unknown reminder state '{}', defaulting to Pending", other);
            ReminderState::Pending
        }
    }
}
