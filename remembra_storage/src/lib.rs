mod error;
mod fixed;
mod job;
mod memory;
mod reminder;
mod user_config;

pub mod sqlite;

pub use error::StorageError;
pub use memory::InMemoryJobStore;
pub use fixed::{FixedReminderStorage, NewFixedReminder};
pub use job::{JobRecord, JobSchedule, JobStore};
pub use reminder::{NewReminder, ReminderPatch, ReminderStorage};
pub use user_config::{KEY_DIGEST_TIME, KEY_TIMEZONE, UserConfigStorage};
