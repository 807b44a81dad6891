use std::sync::Arc;

use teloxide::prelude::*;

use remembra_scheduler::{
    AcknowledgeOutcome, DoneOutcome, MessageRef, NotificationDispatcher, PostponeOutcome,
    ReminderAction, ReminderScheduler, ScheduleError, messages,
};

use crate::util::{clear_message_buttons, try_get_message_from_query};

type HandlerResult = anyhow::Result<()>;

/// Outcome text for a button press. `None` means the press succeeded
/// silently and only the buttons should go; the original message text
/// stays.
async fn reply_text(
    scheduler: &ReminderScheduler,
    action: ReminderAction,
    reminder_id: i64,
) -> Result<Option<String>, ScheduleError> {
    let reply = match action {
        ReminderAction::Acknowledge => match scheduler.acknowledge(reminder_id).await? {
            AcknowledgeOutcome::Acknowledged => None,
            AcknowledgeOutcome::AlreadyDone { text } => Some(messages::already_done(&text)),
            AcknowledgeOutcome::Missing => Some(messages::missing_reminder()),
        },
        ReminderAction::MarkDone => match scheduler.mark_done(reminder_id).await? {
            DoneOutcome::Completed { text } => Some(messages::done_confirmation(&text)),
            DoneOutcome::AlreadyDone { text } => Some(messages::already_done(&text)),
            DoneOutcome::Missing => Some(messages::missing_reminder()),
        },
        ReminderAction::Postpone { minutes } => {
            match scheduler.postpone(reminder_id, minutes).await? {
                PostponeOutcome::Postponed {
                    pre_alert_at,
                    timezone,
                    text,
                    ..
                } => Some(messages::postpone_confirmation(pre_alert_at, timezone, &text)),
                PostponeOutcome::Rejected { text } => Some(messages::postpone_rejected(&text)),
                PostponeOutcome::AlreadyDone { text } => Some(messages::already_done(&text)),
                PostponeOutcome::Missing => Some(messages::missing_reminder()),
            }
        }
    };

    Ok(reply)
}

/// Routes a reminder button press into the scheduler and edits the
/// source message to reflect the outcome. Unknown callback data is
/// acknowledged and ignored so stale keyboards from older versions
/// cannot wedge the dispatcher.
pub(crate) async fn handle_reminder_callback(
    bot: Bot,
    scheduler: Arc<ReminderScheduler>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    query: CallbackQuery,
) -> HandlerResult {
    let Some((action, reminder_id)) = query.data.as_deref().and_then(ReminderAction::parse) else {
        log::warn!("Unrecognized callback data: {:?}", query.data);
        bot.answer_callback_query(query.id).await?;
        return Ok(());
    };

    let reply = reply_text(&scheduler, action, reminder_id).await?;

    if let Some(message) = try_get_message_from_query(&query) {
        match reply {
            // Outcome texts carry Markdown markers; going through the
            // dispatcher keeps the edit parse mode identical to the
            // send path that delivered the original alert.
            Some(text) => {
                dispatcher
                    .edit(
                        MessageRef {
                            chat_id: message.chat.id.0,
                            message_id: message.id.0,
                        },
                        text,
                        None,
                    )
                    .await?;
            }
            None => clear_message_buttons(&bot, message).await?,
        }
    }

    bot.answer_callback_query(query.id).await?;
    Ok(())
}
