// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Compact recurring-period description as delivered by the remote.

use serde::{Deserialize, Serialize};

/// How a charge plan repeats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    /// One-shot plan at absolute times.
    #[default]
    #[serde(alias = "absolute")]
    None,
    /// Repeats every day.
    #[serde(alias = "daily-recurring")]
    Daily,
    /// Repeats every week.
    #[serde(alias = "weekly-recurring")]
    Weekly,
}

/// One step of a plan: at `offset` seconds after the start epoch, charging
/// starts with `limit` amperes, or stops when `limit` is zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Period {
    /// Seconds after [`PeriodDescription::start_epoch`].
    pub offset: i64,
    /// Current limit; zero marks the end of a charging window.
    pub limit: f64,
}

impl Period {
    /// Creates a period.
    #[must_use]
    pub const fn new(offset: i64, limit: f64) -> Self {
        Self { offset, limit }
    }

    /// Returns `true` if this period opens a charging window.
    #[must_use]
    pub fn is_start(&self) -> bool {
        self.limit.abs() > 0.0
    }
}

/// A plan as a start epoch plus ordered `(offset, limit)` steps.
///
/// The JSON form accepts steps either as `[offset, limit]` pairs or as
/// `{"offset": .., "limit": ..}` objects:
///
/// ```
/// use easee_sync::schedule::{PeriodDescription, Recurrence};
///
/// let json = r#"{"startEpoch": 1704063600, "repeat": "weekly", "periods": [[79200, 32], [28800, 0]]}"#;
/// let desc: PeriodDescription = serde_json::from_str(json).unwrap();
/// assert_eq!(desc.recurrence, Recurrence::Weekly);
/// assert_eq!(desc.periods.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodDescription {
    /// Unix epoch (seconds) every offset is relative to.
    pub start_epoch: i64,
    /// Recurrence of the plan.
    #[serde(default, rename = "repeat", alias = "recurrence")]
    pub recurrence: Recurrence,
    /// Ordered steps of the plan.
    #[serde(default, deserialize_with = "deserialize_periods")]
    pub periods: Vec<Period>,
}

impl PeriodDescription {
    /// Creates a description.
    #[must_use]
    pub fn new(start_epoch: i64, recurrence: Recurrence, periods: Vec<Period>) -> Self {
        Self {
            start_epoch,
            recurrence,
            periods,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPeriod {
    Pair(i64, f64),
    Object { offset: i64, limit: f64 },
}

fn deserialize_periods<'de, D>(deserializer: D) -> Result<Vec<Period>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Vec::<RawPeriod>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|p| match p {
            RawPeriod::Pair(offset, limit) | RawPeriod::Object { offset, limit } => {
                Period::new(offset, limit)
            }
        })
        .collect())
}
