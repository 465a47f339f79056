// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Charge plan decoding.
//!
//! The remote describes a charge plan as a start epoch, a recurrence, and a
//! list of `(offset, limit)` steps where a non-zero limit opens a charging
//! window and a zero limit closes it. [`decode`] turns that into a
//! [`Schedule`] with named fields (`startTime`, `MondayStopTime`, ...) in a
//! caller-supplied time zone.

mod decoder;
mod period;
mod plan;

pub use decoder::{decode, decode_raw};
pub use period::{Period, PeriodDescription, Recurrence};
pub use plan::{BasicSchedule, DayWindow, Schedule, WEEKDAYS, WeeklySchedule, weekday_name};
