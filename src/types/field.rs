// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Field addressing: sections and `section.name` paths.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FieldError;

/// Section of a product snapshot a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    /// Live telemetry.
    State,
    /// Device configuration.
    Config,
    /// Basic (daily or one-shot) charge plan.
    Schedule,
    /// Weekly charge plan.
    WeeklySchedule,
    /// Cost of today.
    CostDay,
    /// Cost of the month so far.
    CostMonth,
    /// Cost of the year so far.
    CostYear,
}

impl Section {
    /// Returns the prefix used in field paths.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Config => "config",
            Self::Schedule => "schedule",
            Self::WeeklySchedule => "weekly_schedule",
            Self::CostDay => "cost_day",
            Self::CostMonth => "cost_month",
            Self::CostYear => "cost_year",
        }
    }

    /// Returns `true` for the sections that carry raw key/value fields.
    #[must_use]
    pub fn is_field_map(self) -> bool {
        matches!(self, Self::State | Self::Config)
    }

    /// Returns `true` for the schedule sections.
    #[must_use]
    pub fn is_schedule(self) -> bool {
        matches!(self, Self::Schedule | Self::WeeklySchedule)
    }

    /// Returns `true` for the cost sections.
    #[must_use]
    pub fn is_cost(self) -> bool {
        matches!(self, Self::CostDay | Self::CostMonth | Self::CostYear)
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        Some(match prefix {
            "state" => Self::State,
            "config" => Self::Config,
            "schedule" => Self::Schedule,
            "weekly_schedule" => Self::WeeklySchedule,
            "cost_day" => Self::CostDay,
            "cost_month" => Self::CostMonth,
            "cost_year" => Self::CostYear,
            _ => return None,
        })
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Address of a single field, e.g. `state.sessionEnergy`.
///
/// Parsing accepts both the dotted form used by entity definitions and the
/// underscore form used by stream observation names (`state_sessionEnergy`).
///
/// # Examples
///
/// ```
/// use easee_sync::types::{FieldPath, Section};
///
/// let path: FieldPath = "state.sessionEnergy".parse().unwrap();
/// assert_eq!(path.section(), Section::State);
/// assert_eq!(path.name(), "sessionEnergy");
///
/// let stream: FieldPath = "weekly_schedule_chargingSchedule".parse().unwrap();
/// assert_eq!(stream.section(), Section::WeeklySchedule);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    section: Section,
    name: String,
}

impl FieldPath {
    /// Creates a path from its parts.
    #[must_use]
    pub fn new(section: Section, name: impl Into<String>) -> Self {
        Self {
            section,
            name: name.into(),
        }
    }

    /// Shorthand for a `state.*` path.
    #[must_use]
    pub fn state(name: impl Into<String>) -> Self {
        Self::new(Section::State, name)
    }

    /// Shorthand for a `config.*` path.
    #[must_use]
    pub fn config(name: impl Into<String>) -> Self {
        Self::new(Section::Config, name)
    }

    /// Returns the section.
    #[must_use]
    pub fn section(&self) -> Section {
        self.section
    }

    /// Returns the field name inside the section.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section.prefix(), self.name)
    }
}

impl FromStr for FieldPath {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((prefix, name)) = s.split_once('.') {
            return match Section::from_prefix(prefix) {
                Some(section) if !name.is_empty() => Ok(Self::new(section, name)),
                _ => Err(FieldError::InvalidPath(s.to_string())),
            };
        }

        // Underscore form: the longest matching prefix wins so that
        // `weekly_schedule_x` is not read as `weekly` + `schedule_x`.
        let mut best: Option<(Section, &str)> = None;
        for (idx, _) in s.match_indices('_') {
            if let Some(section) = Section::from_prefix(&s[..idx]) {
                best = Some((section, &s[idx + 1..]));
            }
        }
        match best {
            Some((section, name)) if !name.is_empty() => Ok(Self::new(section, name)),
            _ => Err(FieldError::InvalidPath(s.to_string())),
        }
    }
}

impl Serialize for FieldPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
