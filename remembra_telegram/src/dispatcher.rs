use async_trait::async_trait;
use teloxide::{
    ApiError, RequestError,
    payloads::EditMessageTextSetters,
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode},
};

use remembra_scheduler::{
    ActionSpec, Destination, DispatchError, MessageRef, NotificationDispatcher,
};

/// `NotificationDispatcher` over the Telegram Bot API. Action specs
/// become one row of inline buttons whose callback data carries the
/// action in its stable string form.
pub struct TelegramNotificationDispatcher {
    bot: Bot,
}

impl TelegramNotificationDispatcher {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn keyboard(actions: &[ActionSpec]) -> InlineKeyboardMarkup {
    let buttons: Vec<InlineKeyboardButton> = actions
        .iter()
        .map(|spec| {
            InlineKeyboardButton::callback(
                spec.label.clone(),
                spec.action.callback_data(spec.reminder_id),
            )
        })
        .collect();
    InlineKeyboardMarkup::new(vec![buttons])
}

fn map_error(err: RequestError) -> DispatchError {
    match err {
        RequestError::Api(
            ApiError::BotBlocked | ApiError::UserDeactivated | ApiError::ChatNotFound,
        ) => DispatchError::Unavailable,
        other => DispatchError::Other(other.into()),
    }
}

#[async_trait]
impl NotificationDispatcher for TelegramNotificationDispatcher {
    async fn send(
        &self,
        destination: Destination,
        text: String,
        actions: Vec<ActionSpec>,
    ) -> Result<(), DispatchError> {
        let mut request = self
            .bot
            .send_message(ChatId(destination.chat_id), text)
            .parse_mode(ParseMode::Markdown);
        if !actions.is_empty() {
            request = request.reply_markup(keyboard(&actions));
        }
        request.await.map_err(map_error)?;

        Ok(())
    }

    async fn edit(
        &self,
        message: MessageRef,
        text: String,
        actions: Option<Vec<ActionSpec>>,
    ) -> Result<(), DispatchError> {
        let request = self
            .bot
            .edit_message_text(ChatId(message.chat_id), MessageId(message.message_id), text)
            .parse_mode(ParseMode::Markdown);
        let request = match actions {
            Some(actions) if !actions.is_empty() => request.reply_markup(keyboard(&actions)),
            // No actions left: strip the buttons from the message.
            _ => request.reply_markup(InlineKeyboardMarkup::default()),
        };
        request.await.map_err(map_error)?;

        Ok(())
    }
}
