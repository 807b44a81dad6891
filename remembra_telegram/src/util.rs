use teloxide::{
    Bot,
    payloads::EditMessageReplyMarkupSetters,
    sugar::bot::BotMessagesExt,
    types::{CallbackQuery, InlineKeyboardMarkup, MaybeInaccessibleMessage, Message},
};

pub(crate) fn try_get_message_from_query(query: &CallbackQuery) -> Option<&Message> {
    query.message.as_ref().and_then(|msg| match msg {
        MaybeInaccessibleMessage::Inaccessible(_) => None,
        MaybeInaccessibleMessage::Regular(message) => Some(message.as_ref()),
    })
}

pub(crate) async fn clear_message_buttons(bot: &Bot, message: &Message) -> anyhow::Result<()> {
    bot.edit_reply_markup(message)
        .reply_markup(InlineKeyboardMarkup::default())
        .await?;

    Ok(())
}
