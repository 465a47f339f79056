// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoded schedule records.

use chrono::{DateTime, FixedOffset, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::types::FieldValue;

/// Weekdays in display order, Monday first.
pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Returns the English name of a weekday, as used in field names.
#[must_use]
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn is_enabled_field(name: &str) -> bool {
    matches!(name, "enabled" | "isEnabled")
}

fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Result of decoding a charge plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// No active plan.
    Disabled,
    /// Daily or one-shot plan.
    Basic(BasicSchedule),
    /// Plan with one window per weekday.
    Weekly(WeeklySchedule),
}

impl Schedule {
    /// Returns `true` if a plan is active.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Looks up a named schedule field.
    ///
    /// Basic plans expose `enabled`, `repeat`, `startTime`, `stopTime`;
    /// weekly plans expose `enabled` and `<Weekday>StartTime` /
    /// `<Weekday>StopTime`. Times of recurring plans are `HH:MM` text;
    /// one-shot plans report timestamps. `isEnabled`, `chargeStartTime` and
    /// `chargeStopTime` are accepted as the remote's names for the same
    /// fields.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        match self {
            Self::Disabled => is_enabled_field(name).then_some(FieldValue::Bool(false)),
            Self::Basic(basic) => basic.field(name),
            Self::Weekly(weekly) => weekly.field(name),
        }
    }
}

/// A daily or one-shot plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicSchedule {
    /// Whether the plan is active.
    pub enabled: bool,
    /// Whether the plan repeats daily.
    pub repeat: bool,
    /// Local start of the charging window.
    pub start_time: DateTime<FixedOffset>,
    /// Local end of the charging window, if one was planned.
    pub stop_time: Option<DateTime<FixedOffset>>,
}

impl BasicSchedule {
    fn time_value(&self, time: DateTime<FixedOffset>) -> FieldValue {
        if self.repeat {
            FieldValue::Text(format_time(time.time()))
        } else {
            FieldValue::Timestamp(time.with_timezone(&Utc))
        }
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "enabled" | "isEnabled" => Some(FieldValue::Bool(self.enabled)),
            "repeat" => Some(FieldValue::Bool(self.repeat)),
            "startTime" | "chargeStartTime" => Some(self.time_value(self.start_time)),
            "stopTime" | "chargeStopTime" => self.stop_time.map(|t| self.time_value(t)),
            _ => None,
        }
    }
}

/// Start and stop time of a single weekday's window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayWindow {
    /// Local start time.
    pub start: Option<NaiveTime>,
    /// Local stop time; may be earlier than `start` for windows crossing
    /// midnight.
    pub stop: Option<NaiveTime>,
}

impl DayWindow {
    /// Returns `true` if neither bound is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.stop.is_none()
    }
}

/// A plan with one window per weekday.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    days: [DayWindow; 7],
}

impl WeeklySchedule {
    /// Creates an empty weekly schedule.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the window of a weekday.
    #[must_use]
    pub fn day(&self, day: Weekday) -> DayWindow {
        self.days[day.num_days_from_monday() as usize]
    }

    /// Sets the start time of a weekday.
    pub fn set_start(&mut self, day: Weekday, time: NaiveTime) {
        self.days[day.num_days_from_monday() as usize].start = Some(time);
    }

    /// Sets the stop time of a weekday.
    pub fn set_stop(&mut self, day: Weekday, time: NaiveTime) {
        self.days[day.num_days_from_monday() as usize].stop = Some(time);
    }

    /// Returns `true` if no weekday has a window.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days.iter().all(DayWindow::is_empty)
    }

    /// Returns all set fields as `(name, "HH:MM")` pairs, Monday first.
    #[must_use]
    pub fn named_fields(&self) -> Vec<(String, String)> {
        let mut fields = Vec::new();
        for day in WEEKDAYS {
            let window = self.day(day);
            let name = weekday_name(day);
            if let Some(start) = window.start {
                fields.push((format!("{name}StartTime"), format_time(start)));
            }
            if let Some(stop) = window.stop {
                fields.push((format!("{name}StopTime"), format_time(stop)));
            }
        }
        fields
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        if is_enabled_field(name) {
            return Some(FieldValue::Bool(true));
        }
        WEEKDAYS.into_iter().find_map(|day| {
            let rest = name.strip_prefix(weekday_name(day))?;
            let window = self.day(day);
            let time = match rest {
                "StartTime" => window.start,
                "StopTime" => window.stop,
                _ => None,
            }?;
            Some(FieldValue::Text(format_time(time)))
        })
    }
}
