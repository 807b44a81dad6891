//! Notification texts. Rendering lives next to the policy that decides
//! when a message goes out; the transport only delivers.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use remembra_models::{fixed::FixedReminder, reminder::Reminder};

use crate::time_math::format_lead;

pub fn main_alert(reminder: &Reminder) -> String {
    format!("🚨 {}", reminder.text)
}

pub fn pre_alert(reminder: &Reminder) -> String {
    format!(
        "🔔 In {}: _{}_",
        format_lead(reminder.lead_minutes),
        reminder.text
    )
}

pub fn fixed_alert(fixed: &FixedReminder) -> String {
    format!("📌 {}", fixed.text)
}

pub fn digest(reminders: &[Reminder], tz: Tz) -> String {
    let mut lines = vec!["🌞 Here is what you have planned for today:".to_string()];
    for reminder in reminders {
        let when = reminder
            .due_at
            .map(|due| due.with_timezone(&tz).format("%H:%M").to_string())
            .unwrap_or_else(|| "—".to_string());
        lines.push(format!("  • *{}* — _{}_", when, reminder.text));
    }
    lines.join("\n")
}

pub fn done_confirmation(text: &str) -> String {
    format!("✅ Well done! You completed: _{text}_")
}

pub fn already_done(text: &str) -> String {
    format!("✅ _{text}_\n\n(this reminder was already marked as done)")
}

pub fn missing_reminder() -> String {
    "🫥 Looks like this reminder doesn't exist anymore.".to_string()
}

pub fn postpone_confirmation(pre_alert_at: DateTime<Utc>, tz: Tz, text: &str) -> String {
    let local = pre_alert_at.with_timezone(&tz);
    format!(
        "⏰ Alright! I'll ping you again at *{}*.\n\nTask: _{text}_",
        local.format("%d %b, %H:%M")
    )
}

pub fn postpone_rejected(text: &str) -> String {
    format!("❗ Can't postpone: the due time is too close to push the alert back.\n\nTask: _{text}_")
}
