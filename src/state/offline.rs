// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Heartbeat timeout policy.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::ProductState;

/// Default time without a heartbeat after which a product is offline.
pub const DEFAULT_OFFLINE_AFTER: Duration = Duration::from_secs(17 * 60);

/// Flips products to offline when their heartbeat is too old.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use easee_sync::state::{OfflineDetector, ProductIdentity, ProductState};
/// use easee_sync::types::{FieldPath, SiteId};
///
/// let mut product = ProductState::new(ProductIdentity::equalizer("QP1", "Meter", SiteId::new(1)));
/// let start = Utc::now();
/// product.touch_heartbeat(start);
/// product.update(&FieldPath::state("isOnline"), Some(true.into()));
///
/// let detector = OfflineDetector::default();
/// assert!(!detector.check_liveness(&mut product, start + Duration::minutes(10)));
/// assert!(detector.check_liveness(&mut product, start + Duration::minutes(18)));
/// assert!(!detector.check_liveness(&mut product, start + Duration::minutes(19)));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct OfflineDetector {
    threshold: Duration,
}

impl Default for OfflineDetector {
    fn default() -> Self {
        Self::new(DEFAULT_OFFLINE_AFTER)
    }
}

impl OfflineDetector {
    /// Creates a detector with the given timeout.
    #[must_use]
    pub const fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    /// Returns the timeout.
    #[must_use]
    pub const fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Marks `product` offline if its heartbeat is older than the timeout.
    ///
    /// Does nothing before the first state is known, without a heartbeat,
    /// or when the product is not currently online. Returns `true` if the
    /// product was flipped.
    pub fn check_liveness(&self, product: &mut ProductState, now: DateTime<Utc>) -> bool {
        if product.state().is_none() {
            return false;
        }
        let Some(last) = product.last_heartbeat_at() else {
            return false;
        };
        let Ok(elapsed) = (now - last).to_std() else {
            // Heartbeat in the future.
            return false;
        };
        if elapsed <= self.threshold || !product.mark_offline() {
            return false;
        }
        tracing::info!(
            product_id = %product.id(),
            elapsed_secs = elapsed.as_secs(),
            "No heartbeat, marking product offline"
        );
        true
    }
}
