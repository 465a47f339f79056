// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Period description decoding.

use chrono::{DateTime, Datelike, TimeZone, Weekday};

use super::{BasicSchedule, PeriodDescription, Recurrence, Schedule, WeeklySchedule};

/// Decodes a period description into a schedule in the given time zone.
///
/// For weekly plans the weekday of a window's start is carried forward to
/// the following stop, so a Monday 22:00 to Tuesday 06:00 window fills
/// `MondayStopTime`, not `TuesdayStopTime`.
///
/// Empty or malformed input decodes to [`Schedule::Disabled`].
///
/// # Examples
///
/// ```
/// use chrono::FixedOffset;
/// use easee_sync::schedule::{decode, Period, PeriodDescription, Recurrence, Schedule};
///
/// let tz = FixedOffset::east_opt(0).unwrap();
/// // 2024-01-01 was a Monday.
/// let desc = PeriodDescription::new(
///     1_704_067_200,
///     Recurrence::Weekly,
///     vec![Period::new(22 * 3600, 32.0), Period::new(30 * 3600, 0.0)],
/// );
/// let schedule = decode(&desc, &tz);
/// assert_eq!(schedule.field("MondayStopTime").unwrap().to_string(), "06:00");
/// assert!(schedule.field("TuesdayStopTime").is_none());
/// ```
#[must_use]
pub fn decode<Tz: TimeZone>(description: &PeriodDescription, tz: &Tz) -> Schedule {
    if description.periods.is_empty() {
        return Schedule::Disabled;
    }

    let result = match description.recurrence {
        Recurrence::Weekly => decode_weekly(description, tz),
        Recurrence::Daily | Recurrence::None => decode_basic(description, tz),
    };

    result.unwrap_or_else(|| {
        tracing::debug!(
            start_epoch = description.start_epoch,
            "Malformed period description, treating schedule as disabled"
        );
        Schedule::Disabled
    })
}

/// Parses a serialized period description and decodes it.
///
/// Unparseable input decodes to [`Schedule::Disabled`].
#[must_use]
pub fn decode_raw<Tz: TimeZone>(raw: &str, tz: &Tz) -> Schedule {
    match serde_json::from_str::<PeriodDescription>(raw) {
        Ok(description) => decode(&description, tz),
        Err(e) => {
            tracing::debug!(error = %e, "Unparseable period description");
            Schedule::Disabled
        }
    }
}

fn local_time<Tz: TimeZone>(start_epoch: i64, offset: i64, tz: &Tz) -> Option<DateTime<Tz>> {
    let epoch = start_epoch.checked_add(offset)?;
    tz.timestamp_opt(epoch, 0).single()
}

fn decode_basic<Tz: TimeZone>(description: &PeriodDescription, tz: &Tz) -> Option<Schedule> {
    let mut periods = description.periods.iter();
    let start = periods.by_ref().find(|p| p.is_start())?;
    let start_time = local_time(description.start_epoch, start.offset, tz)?;

    let stop_time = match periods.find(|p| !p.is_start()) {
        Some(stop) => Some(local_time(description.start_epoch, stop.offset, tz)?),
        None => None,
    };

    Some(Schedule::Basic(BasicSchedule {
        enabled: true,
        repeat: description.recurrence == Recurrence::Daily,
        start_time: start_time.fixed_offset(),
        stop_time: stop_time.map(|t| t.fixed_offset()),
    }))
}

fn decode_weekly<Tz: TimeZone>(description: &PeriodDescription, tz: &Tz) -> Option<Schedule> {
    let mut weekly = WeeklySchedule::new();
    let mut carried: Option<Weekday> = None;

    for period in &description.periods {
        let at = local_time(description.start_epoch, period.offset, tz)?;
        if period.is_start() {
            let day = at.weekday();
            weekly.set_start(day, at.time());
            carried = Some(day);
        } else {
            let day = carried.take().unwrap_or_else(|| at.weekday());
            weekly.set_stop(day, at.time());
        }
    }

    if weekly.is_empty() {
        None
    } else {
        Some(Schedule::Weekly(weekly))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, NaiveTime, Utc};

    use super::*;
    use crate::schedule::Period;
    use crate::types::FieldValue;

    // 2024-01-01T00:00:00Z, a Monday.
    const MONDAY_UTC: i64 = 1_704_067_200;
    const HOUR: i64 = 3600;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn empty_periods_are_disabled() {
        let desc = PeriodDescription::new(MONDAY_UTC, Recurrence::Weekly, vec![]);
        assert_eq!(decode(&desc, &Utc), Schedule::Disabled);
    }

    #[test]
    fn garbage_raw_is_disabled() {
        assert_eq!(decode_raw("not json", &Utc), Schedule::Disabled);
        assert_eq!(decode_raw("{\"periods\": 3}", &Utc), Schedule::Disabled);
    }

    #[test]
    fn stop_only_basic_plan_is_disabled() {
        let desc = PeriodDescription::new(MONDAY_UTC, Recurrence::Daily, vec![Period::new(0, 0.0)]);
        assert_eq!(decode(&desc, &Utc), Schedule::Disabled);
    }

    #[test]
    fn daily_plan_decodes_to_basic() {
        let desc = PeriodDescription::new(
            MONDAY_UTC,
            Recurrence::Daily,
            vec![Period::new(23 * HOUR, 16.0), Period::new(31 * HOUR, 0.0)],
        );
        let schedule = decode(&desc, &Utc);
        assert_eq!(schedule.field("enabled"), Some(FieldValue::Bool(true)));
        assert_eq!(schedule.field("repeat"), Some(FieldValue::Bool(true)));
        assert_eq!(schedule.field("startTime"), Some(FieldValue::from("23:00")));
        assert_eq!(schedule.field("stopTime"), Some(FieldValue::from("07:00")));
    }

    #[test]
    fn one_shot_plan_is_not_repeating() {
        let desc = PeriodDescription::new(
            MONDAY_UTC,
            Recurrence::None,
            vec![Period::new(HOUR, 16.0)],
        );
        let Schedule::Basic(basic) = decode(&desc, &Utc) else {
            panic!("expected basic schedule");
        };
        assert!(!basic.repeat);
        assert!(basic.stop_time.is_none());
        assert_eq!(basic.start_time.time(), hm(1, 0));
    }

    #[test]
    fn weekly_stop_is_carried_to_start_weekday() {
        let desc = PeriodDescription::new(
            MONDAY_UTC,
            Recurrence::Weekly,
            vec![Period::new(22 * HOUR, 32.0), Period::new(30 * HOUR, 0.0)],
        );
        let Schedule::Weekly(weekly) = decode(&desc, &Utc) else {
            panic!("expected weekly schedule");
        };
        assert_eq!(weekly.day(Weekday::Mon).start, Some(hm(22, 0)));
        assert_eq!(weekly.day(Weekday::Mon).stop, Some(hm(6, 0)));
        assert!(weekly.day(Weekday::Tue).is_empty());
    }

    #[test]
    fn weekday_follows_local_time_zone() {
        // 23:30 UTC on Sunday is 00:30 Monday at UTC+1.
        let sunday_utc = MONDAY_UTC - 24 * HOUR;
        let tz = FixedOffset::east_opt(3600).unwrap();
        let desc = PeriodDescription::new(
            sunday_utc,
            Recurrence::Weekly,
            vec![
                Period::new(23 * HOUR + 1800, 16.0),
                Period::new(27 * HOUR, 0.0),
            ],
        );
        let Schedule::Weekly(weekly) = decode(&desc, &tz) else {
            panic!("expected weekly schedule");
        };
        assert_eq!(weekly.day(Weekday::Mon).start, Some(hm(0, 30)));
        assert_eq!(weekly.day(Weekday::Mon).stop, Some(hm(4, 0)));
        assert!(weekly.day(Weekday::Sun).is_empty());
    }

    #[test]
    fn unmatched_stop_uses_its_own_weekday() {
        let desc = PeriodDescription::new(
            MONDAY_UTC,
            Recurrence::Weekly,
            vec![Period::new(24 * HOUR + 7 * HOUR, 0.0)],
        );
        let Schedule::Weekly(weekly) = decode(&desc, &Utc) else {
            panic!("expected weekly schedule");
        };
        assert_eq!(weekly.day(Weekday::Tue).stop, Some(hm(7, 0)));
        assert!(weekly.day(Weekday::Tue).start.is_none());
    }

    #[test]
    fn out_of_range_epoch_is_disabled() {
        let desc = PeriodDescription::new(
            i64::MAX,
            Recurrence::Weekly,
            vec![Period::new(1, 16.0)],
        );
        assert_eq!(decode(&desc, &Utc), Schedule::Disabled);
    }
}
