pub mod fixed_storage;
pub mod job_store;
pub mod reminder_storage;
pub mod user_config_storage;

pub use fixed_storage::SqliteFixedReminderStorage;
pub use job_store::SqliteJobStore;
pub use reminder_storage::SqliteReminderStorage;
pub use user_config_storage::SqliteUserConfigStorage;
