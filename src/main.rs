mod appsettings;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use teloxide::Bot;

use remembra_scheduler::{EngineConfig, ReminderScheduler, TokioTriggerEngine, spawn_fire_router};
use remembra_storage::sqlite::{
    SqliteFixedReminderStorage, SqliteJobStore, SqliteReminderStorage, SqliteUserConfigStorage,
};
use remembra_telegram::{TelegramNotificationDispatcher, TelegramNotificationInterface};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init_timed();

    let settings = appsettings::AppSettings::new().context("loading app settings")?;

    let options = settings
        .database
        .url
        .parse::<SqliteConnectOptions>()
        .context("parsing database url")?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let job_store = Arc::new(SqliteJobStore::new(pool.clone()));
    let reminders = Arc::new(SqliteReminderStorage::new(pool.clone()));
    let fixed = Arc::new(SqliteFixedReminderStorage::new(pool.clone()));
    let user_config = Arc::new(SqliteUserConfigStorage::new(pool.clone()));

    let mut engine_config = EngineConfig::default();
    if let Some(secs) = settings.scheduler.misfire_grace_secs {
        engine_config.misfire_grace = Duration::from_secs(secs);
    }
    let (engine, fired_rx) = TokioTriggerEngine::start(job_store, engine_config);
    let restored = engine.restore().await?;
    log::info!("Restored {restored} persisted triggers");

    let bot = Bot::new(settings.telegram.token.clone());
    let dispatcher = Arc::new(TelegramNotificationDispatcher::new(bot.clone()));

    let scheduler = Arc::new(ReminderScheduler::new(
        Arc::new(engine),
        reminders,
        fixed,
        user_config,
        dispatcher.clone(),
    ));
    let router = spawn_fire_router(fired_rx, scheduler.clone());

    TelegramNotificationInterface::start(bot, scheduler, dispatcher).await;

    router.abort();
    Ok(())
}
