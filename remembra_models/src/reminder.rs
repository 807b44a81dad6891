use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::owner::Owner;

pub type ReminderId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderState {
    Pending,
    Done,
}

/// A one-off task with an optional due time. `due_at` is always UTC;
/// `creation_timezone` records the zone the user typed the time in so
/// list views can render it back the way it was entered.
#[derive(Debug, Clone)]
pub struct Reminder {
    pub id: ReminderId,
    pub owner: Owner,
    pub text: String,
    pub due_at: Option<DateTime<Utc>>,
    /// Minutes of pre-alert lead time. 0 means no pre-alert.
    pub lead_minutes: u32,
    pub state: ReminderState,
    pub creation_timezone: Tz,
}

impl Reminder {
    pub fn is_done(&self) -> bool {
        self.state == ReminderState::Done
    }

    /// Derived, never stored: a pending reminder whose due time has passed.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.state == ReminderState::Pending && self.due_at.is_some_and(|due| due <= now)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn reminder(due_at: Option<DateTime<Utc>>, state: ReminderState) -> Reminder {
        Reminder {
            id: 1,
            owner: Owner {
                user_id: 1,
                chat_id: 100,
            },
            text: "water the plants".to_string(),
            due_at,
            lead_minutes: 0,
            state,
            creation_timezone: chrono_tz::UTC,
        }
    }

    #[test]
    fn overdue_is_derived_from_due_time() {
        let now = Utc::now();
        let past = reminder(Some(now - TimeDelta::minutes(5)), ReminderState::Pending);
        let future = reminder(Some(now + TimeDelta::minutes(5)), ReminderState::Pending);
        let dateless = reminder(None, ReminderState::Pending);

        assert!(past.is_overdue(now));
        assert!(!future.is_overdue(now));
        assert!(!dateless.is_overdue(now));
    }

    #[test]
    fn done_reminders_are_never_overdue() {
        let now = Utc::now();
        let done = reminder(Some(now - TimeDelta::minutes(5)), ReminderState::Done);
        assert!(!done.is_overdue(now));
    }
}
