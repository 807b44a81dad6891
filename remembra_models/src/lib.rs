pub mod fixed;
pub mod owner;
pub mod reminder;

pub use chrono;
pub use chrono_tz;
