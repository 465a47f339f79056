// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cost figures: coalesced fetching and per-product distribution.
//!
//! Cost totals are derived from cumulative energy, so every change of a
//! charger's lifetime energy asks for fresh figures. Those requests arrive
//! in bursts; [`CostAggregator`] turns each burst into a single delayed
//! batch of three reads per site, bounding calls to the rate-limited cost
//! endpoint to one batch per site and delay window.

mod aggregator;
mod window;

pub use aggregator::{CostAggregator, DEFAULT_COST_DELAY, DEFAULT_COST_PAUSE};
pub use window::{CostBatch, CostWindow, window_starts};
