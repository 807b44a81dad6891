use chrono::{DateTime, Datelike, NaiveTime, TimeDelta, Utc};
use chrono_tz::Tz;

use remembra_models::fixed::Weekdays;

/// Instant at which the pre-alert for `due_at` should fire.
pub fn pre_alert_at(due_at: DateTime<Utc>, lead_minutes: u32) -> DateTime<Utc> {
    due_at - TimeDelta::minutes(lead_minutes as i64)
}

/// Nearest whole minute, clamped at zero.
pub fn round_minutes(delta: TimeDelta) -> u32 {
    ((delta.num_seconds() + 30) / 60).max(0) as u32
}

/// First instant strictly after `after` that lands on an active weekday
/// at `time_of_day` in `tz`. A day whose wall-clock time falls into a
/// DST gap is skipped; an ambiguous time takes the earlier mapping.
/// `None` only when every candidate day within a week is unrepresentable,
/// which a non-empty weekday set makes practically impossible.
pub fn next_occurrence(
    after: DateTime<Utc>,
    time_of_day: NaiveTime,
    weekdays: &Weekdays,
    tz: Tz,
) -> Option<DateTime<Utc>> {
    let local_after = after.with_timezone(&tz);

    for day_offset in 0..=7u64 {
        let date = local_after
            .date_naive()
            .checked_add_days(chrono::Days::new(day_offset))?;
        if !weekdays.contains(date.weekday()) {
            continue;
        }

        let candidate = match date.and_time(time_of_day).and_local_timezone(tz) {
            chrono::LocalResult::Single(dt) => dt,
            chrono::LocalResult::Ambiguous(earlier, _) => earlier,
            chrono::LocalResult::None => continue,
        };

        let candidate_utc = candidate.with_timezone(&Utc);
        if candidate_utc > after {
            return Some(candidate_utc);
        }
    }

    None
}

/// `90` -> `"1h 30m"`, `120` -> `"2h"`, `45` -> `"45m"`.
pub fn format_lead(minutes: u32) -> String {
    let (hours, mins) = (minutes / 60, minutes % 60);
    if hours == 0 {
        format!("{mins}m")
    } else if mins == 0 {
        format!("{hours}h")
    } else {
        format!("{hours}h {mins}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{NaiveDate, NaiveDateTime, Timelike, Weekday};
    use chrono_tz::Tz;
    use proptest::prelude::*;
    use proptest_arbitrary_interop::arb;

    fn utc_at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        let naive = NaiveDateTime::new(
            NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            NaiveTime::from_hms_opt(h, min, 0).unwrap(),
        );
        DateTime::from_naive_utc_and_offset(naive, Utc)
    }

    #[test]
    pub fn occurrence_later_today_when_time_not_yet_passed() {
        // 2025-05-31 is a Saturday.
        let now = utc_at(2025, 5, 31, 12, 0);
        let next = next_occurrence(
            now,
            NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
            &Weekdays::EVERY_DAY,
            chrono_tz::UTC,
        )
        .unwrap();

        assert_eq!(next - now, TimeDelta::hours(1));
    }

    #[test]
    pub fn occurrence_rolls_to_next_day_when_time_passed() {
        let now = utc_at(2025, 5, 31, 12, 0);
        let next = next_occurrence(
            now,
            NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            &Weekdays::EVERY_DAY,
            chrono_tz::UTC,
        )
        .unwrap();

        assert_eq!(next - now, TimeDelta::hours(23));
    }

    #[test]
    pub fn occurrence_skips_to_matching_weekday() {
        // Saturday noon, reminder only fires on Mondays.
        let now = utc_at(2025, 5, 31, 12, 0);
        let mondays = Weekdays::new([Weekday::Mon]).unwrap();
        let next = next_occurrence(
            now,
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            &mondays,
            chrono_tz::UTC,
        )
        .unwrap();

        assert_eq!(next, utc_at(2025, 6, 2, 9, 0));
        assert_eq!(next.with_timezone(&chrono_tz::UTC).weekday(), Weekday::Mon);
    }

    #[test]
    pub fn occurrence_respects_timezone_wall_clock() {
        // 08:30 in Madrid during CEST is 06:30 UTC.
        let now = utc_at(2025, 7, 1, 0, 0);
        let tz: Tz = "Europe/Madrid".parse().unwrap();
        let next = next_occurrence(
            now,
            NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
            &Weekdays::EVERY_DAY,
            tz,
        )
        .unwrap();

        assert_eq!(next, utc_at(2025, 7, 1, 6, 30));
    }

    #[test]
    pub fn pre_alert_instant_is_lead_minutes_before_due() {
        let due = utc_at(2025, 5, 31, 12, 0);
        assert_eq!(pre_alert_at(due, 30), utc_at(2025, 5, 31, 11, 30));
        assert_eq!(pre_alert_at(due, 0), due);
    }

    #[test]
    pub fn minutes_round_to_nearest() {
        assert_eq!(round_minutes(TimeDelta::seconds(89)), 1);
        assert_eq!(round_minutes(TimeDelta::seconds(90)), 2);
        assert_eq!(round_minutes(TimeDelta::seconds(-30)), 0);
    }

    #[test]
    pub fn lead_formatting() {
        assert_eq!(format_lead(45), "45m");
        assert_eq!(format_lead(120), "2h");
        assert_eq!(format_lead(90), "1h 30m");
    }

    proptest! {
        #[test]
        fn next_occurrence_lands_on_requested_wall_clock(
            now_utc in arb::<NaiveDateTime>(),
            time_of_day in arb::<NaiveTime>(),
        ) {
            let time_of_day = time_of_day.with_nanosecond(0).unwrap();
            let now = DateTime::from_naive_utc_and_offset(now_utc.with_nanosecond(0).unwrap(), Utc);

            if let Some(next) = next_occurrence(now, time_of_day, &Weekdays::EVERY_DAY, chrono_tz::UTC) {
                prop_assert!(next > now, "Occurrence must always be in the future");
                prop_assert_eq!(next.time(), time_of_day, "Occurrence must match the requested wall-clock time");
                prop_assert!(next - now <= TimeDelta::days(1), "Every-day schedule fires within a day");
            }
        }

        #[test]
        fn next_occurrence_matches_active_weekday(
            now_utc in arb::<NaiveDateTime>(),
            day_index in 0u8..7,
        ) {
            let now = DateTime::from_naive_utc_and_offset(now_utc.with_nanosecond(0).unwrap(), Utc);
            let day = Weekday::try_from(day_index).unwrap();
            let weekdays = Weekdays::new([day]).unwrap();
            let time_of_day = NaiveTime::from_hms_opt(9, 0, 0).unwrap();

            if let Some(next) = next_occurrence(now, time_of_day, &weekdays, chrono_tz::UTC) {
                prop_assert!(next > now);
                prop_assert_eq!(next.weekday(), day);
                prop_assert!(next - now <= TimeDelta::days(7));
            }
        }
    }
}
