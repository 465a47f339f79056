// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cost reporting windows and fetched results.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

use crate::state::ProductState;
use crate::types::{CostRecord, ProductCost, Section, SiteId};

/// Start of each reporting window (today, month to date, year to date) in
/// local time, converted to UTC.
///
/// A window whose local midnight does not exist (time zone transition) is
/// left out.
#[must_use]
pub fn window_starts<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz) -> Vec<(Section, DateTime<Utc>)> {
    let today = now.with_timezone(tz).date_naive();
    let starts = [
        (Section::CostDay, Some(today)),
        (Section::CostMonth, today.with_day(1)),
        (Section::CostYear, NaiveDate::from_ymd_opt(today.year(), 1, 1)),
    ];

    starts
        .into_iter()
        .filter_map(|(section, date)| {
            let midnight = date?.and_hms_opt(0, 0, 0)?;
            let local = tz.from_local_datetime(&midnight).earliest()?;
            Some((section, local.with_timezone(&Utc)))
        })
        .collect()
}

/// Rows fetched for one reporting window.
#[derive(Debug, Clone, PartialEq)]
pub struct CostWindow {
    /// `cost_day`, `cost_month` or `cost_year`.
    pub section: Section,
    /// Report rows; `None` if the fetch failed or the remote had no report.
    pub rows: Option<Vec<ProductCost>>,
}

/// Result of one batched cost fetch for a site.
#[derive(Debug, Clone, PartialEq)]
pub struct CostBatch {
    /// The site the batch belongs to.
    pub site: SiteId,
    /// One entry per reporting window.
    pub windows: Vec<CostWindow>,
}

impl CostBatch {
    /// Copies the product's rows into its cost records.
    ///
    /// A window without a row for the product leaves that record untouched.
    /// Returns `true` if any record changed.
    pub fn apply_to(&self, product: &mut ProductState) -> bool {
        let mut changed = false;
        for window in &self.windows {
            let Some(rows) = &window.rows else {
                continue;
            };
            if let Some(row) = rows.iter().find(|row| row.product_id == *product.id()) {
                changed |= product.set_cost(window.section, CostRecord::from(row));
            }
        }
        changed
    }
}
