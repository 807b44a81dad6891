use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;
use thiserror::Error;

use crate::owner::Owner;

pub type FixedReminderId = i64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WeekdaysError {
    #[error("a fixed reminder needs at least one active weekday")]
    Empty,
}

/// Non-empty set of weekdays, stored as a bitmask with Monday at bit 0.
/// Emptiness is rejected at construction so a fixed reminder that could
/// never fire cannot exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Weekdays(u8);

const ALL_DAYS: u8 = 0b0111_1111;

impl Weekdays {
    pub const EVERY_DAY: Weekdays = Weekdays(ALL_DAYS);

    pub fn new(days: impl IntoIterator<Item = Weekday>) -> Result<Self, WeekdaysError> {
        let mut mask = 0u8;
        for day in days {
            mask |= 1 << day.num_days_from_monday();
        }
        Self::from_mask(mask)
    }

    pub fn from_mask(mask: u8) -> Result<Self, WeekdaysError> {
        let mask = mask & ALL_DAYS;
        if mask == 0 {
            return Err(WeekdaysError::Empty);
        }
        Ok(Self(mask))
    }

    pub fn mask(&self) -> u8 {
        self.0
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        (0u8..7).filter_map(|i| {
            if self.0 & (1 << i) != 0 {
                Weekday::try_from(i).ok()
            } else {
                None
            }
        })
    }
}

/// A recurring daily task: fires on every matching weekday at
/// `time_of_day` in its own timezone, indefinitely. No Pending/Done
/// state, firing is the entire lifecycle event.
#[derive(Debug, Clone)]
pub struct FixedReminder {
    pub id: FixedReminderId,
    pub owner: Owner,
    pub text: String,
    pub time_of_day: NaiveTime,
    pub timezone: Tz,
    pub weekdays: Weekdays,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_weekday_set_is_rejected() {
        assert_eq!(Weekdays::new([]), Err(WeekdaysError::Empty));
        assert_eq!(Weekdays::from_mask(0), Err(WeekdaysError::Empty));
    }

    #[test]
    fn mask_round_trips_through_constructor() {
        let days = Weekdays::new([Weekday::Mon, Weekday::Wed, Weekday::Fri]).unwrap();
        let restored = Weekdays::from_mask(days.mask()).unwrap();
        assert_eq!(days, restored);
        assert!(restored.contains(Weekday::Wed));
        assert!(!restored.contains(Weekday::Tue));
    }

    #[test]
    fn iter_yields_days_monday_first() {
        let days = Weekdays::new([Weekday::Sun, Weekday::Tue]).unwrap();
        let collected: Vec<_> = days.iter().collect();
        assert_eq!(collected, vec![Weekday::Tue, Weekday::Sun]);
    }

    #[test]
    fn every_day_contains_all_weekdays() {
        assert_eq!(Weekdays::EVERY_DAY.iter().count(), 7);
    }
}
