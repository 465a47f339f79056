// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-product state mirrors.
//!
//! A [`ProductState`] holds the last known telemetry, configuration, charge
//! plans and cost figures of one charger or equalizer. Writes are filtered
//! by significance and collected as dirty fields until the next notification
//! pass. The [`OfflineDetector`] turns a stale heartbeat into an offline flag.

mod offline;
mod product_state;

pub use offline::{DEFAULT_OFFLINE_AFTER, OfflineDetector};
pub use product_state::{
    DEFAULT_SIGNIFICANCE, LIFETIME_ENERGY_FIELD, ONLINE_FIELD, PULSE_FIELD, ProductIdentity,
    ProductPhase, ProductSnapshot, ProductState, UpdateOutcome, is_significant,
};
