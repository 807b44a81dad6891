use async_trait::async_trait;
use thiserror::Error;

use remembra_models::reminder::ReminderId;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The recipient cannot be reached (blocked the bot, left the chat).
    #[error("recipient unavailable")]
    Unavailable,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Where a notification goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    pub chat_id: i64,
}

/// Handle to an already delivered message, for edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i32,
}

/// User response to a notification button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderAction {
    Acknowledge,
    MarkDone,
    Postpone { minutes: u32 },
}

impl ReminderAction {
    /// Stable wire form carried in the button callback data:
    /// `ok:{id}`, `done:{id}`, `postpone:{minutes}:{id}`.
    pub fn callback_data(&self, reminder_id: ReminderId) -> String {
        match self {
            ReminderAction::Acknowledge => format!("ok:{reminder_id}"),
            ReminderAction::MarkDone => format!("done:{reminder_id}"),
            ReminderAction::Postpone { minutes } => format!("postpone:{minutes}:{reminder_id}"),
        }
    }

    pub fn parse(data: &str) -> Option<(ReminderAction, ReminderId)> {
        let parts: Vec<&str> = data.split(':').collect();
        match parts.as_slice() {
            ["ok", id] => Some((ReminderAction::Acknowledge, id.parse().ok()?)),
            ["done", id] => Some((ReminderAction::MarkDone, id.parse().ok()?)),
            ["postpone", minutes, id] => Some((
                ReminderAction::Postpone {
                    minutes: minutes.parse().ok()?,
                },
                id.parse().ok()?,
            )),
            _ => None,
        }
    }
}

/// A labeled button attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSpec {
    pub label: String,
    pub action: ReminderAction,
    pub reminder_id: ReminderId,
}

impl ActionSpec {
    pub fn new(label: &str, action: ReminderAction, reminder_id: ReminderId) -> Self {
        Self {
            label: label.to_string(),
            action,
            reminder_id,
        }
    }
}

/// Capability interface for delivering notifications. Injected into the
/// scheduler at construction; the scheduler never talks to the chat
/// transport directly.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send(
        &self,
        destination: Destination,
        text: String,
        actions: Vec<ActionSpec>,
    ) -> Result<(), DispatchError>;

    async fn edit(
        &self,
        message: MessageRef,
        text: String,
        actions: Option<Vec<ActionSpec>>,
    ) -> Result<(), DispatchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_data_round_trips() {
        let cases = [
            (ReminderAction::Acknowledge, 5),
            (ReminderAction::MarkDone, 123),
            (ReminderAction::Postpone { minutes: 10 }, 7),
        ];
        for (action, id) in cases {
            let data = action.callback_data(id);
            assert_eq!(ReminderAction::parse(&data), Some((action, id)));
        }
    }

    #[test]
    fn malformed_callback_data_is_rejected() {
        for data in ["", "ok", "done:", "postpone:10", "nuke:5", "ok:abc"] {
            assert_eq!(ReminderAction::parse(data), None, "parsed '{data}'");
        }
    }
}
