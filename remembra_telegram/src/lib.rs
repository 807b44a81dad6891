mod callbacks;
mod dispatcher;
mod util;

pub use dispatcher::TelegramNotificationDispatcher;
pub use teloxide;

use std::sync::Arc;

use remembra_scheduler::{NotificationDispatcher, ReminderScheduler};
use teloxide::{dptree, prelude::*};

/// Long-polling loop for the notification surface: button presses on
/// delivered alerts come back here and feed the scheduler. Conversation
/// flows (creation, menus) live elsewhere and are not part of this
/// crate.
pub struct TelegramNotificationInterface;

impl TelegramNotificationInterface {
    pub async fn start(
        bot: Bot,
        scheduler: Arc<ReminderScheduler>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) {
        log::info!("Starting Telegram notification interface");

        let schema = dptree::entry().branch(
            Update::filter_callback_query().endpoint(callbacks::handle_reminder_callback),
        );

        Dispatcher::builder(bot, schema)
            .dependencies(dptree::deps![scheduler, dispatcher])
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await
    }
}
