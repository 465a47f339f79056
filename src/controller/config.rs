// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration of the sync controller.

use std::time::Duration;

use chrono::FixedOffset;

use crate::cost::{DEFAULT_COST_DELAY, DEFAULT_COST_PAUSE};
use crate::state::{DEFAULT_OFFLINE_AFTER, DEFAULT_SIGNIFICANCE};

/// Timing and filtering settings for a [`SyncController`](super::SyncController).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use easee_sync::controller::SyncConfig;
///
/// let config = SyncConfig::default()
///     .with_state_poll(Duration::from_secs(30))
///     .with_monitored_sites(["Home"]);
///
/// assert_eq!(config.state_poll, Duration::from_secs(30));
/// assert!(config.monitors_site("Home"));
/// assert!(!config.monitors_site("Cabin"));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SyncConfig {
    /// Period of charger state/config polls.
    pub state_poll: Duration,
    /// Period of equalizer state polls.
    pub equalizer_poll: Duration,
    /// Period of charge plan polls.
    pub schedule_poll: Duration,
    /// Period of latest-firmware checks.
    pub firmware_poll: Duration,
    /// Period of cost refreshes.
    pub cost_poll: Duration,
    /// Upper bound for the initial login.
    pub connect_timeout: Duration,
    /// Relative change below which numeric updates are not significant.
    pub significance: f64,
    /// Heartbeat age after which an online product is marked offline.
    pub offline_after: Duration,
    /// Coalescing window of cost requests per site.
    pub cost_delay: Duration,
    /// Pause between the reads of one cost batch.
    pub cost_pause: Duration,
    /// Maximum random delay of the daily refresh after local midnight.
    pub midnight_jitter: Duration,
    /// Names of the sites to mirror; `None` mirrors every site.
    pub monitored_sites: Option<Vec<String>>,
    /// Time zone for charge plans, cost windows and midnight; `None` is
    /// the host's local zone.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub time_zone: Option<FixedOffset>,
    /// Capacity of the stream event channel.
    pub stream_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            state_poll: Duration::from_secs(60),
            equalizer_poll: Duration::from_secs(20),
            schedule_poll: Duration::from_secs(600),
            firmware_poll: Duration::from_secs(6 * 3600),
            cost_poll: Duration::from_secs(3600),
            connect_timeout: Duration::from_secs(30),
            significance: DEFAULT_SIGNIFICANCE,
            offline_after: DEFAULT_OFFLINE_AFTER,
            cost_delay: DEFAULT_COST_DELAY,
            cost_pause: DEFAULT_COST_PAUSE,
            midnight_jitter: Duration::from_secs(30 * 60),
            monitored_sites: None,
            time_zone: None,
            stream_capacity: 256,
        }
    }
}

impl SyncConfig {
    /// Sets the charger poll period.
    #[must_use]
    pub fn with_state_poll(mut self, period: Duration) -> Self {
        self.state_poll = period;
        self
    }

    /// Sets the equalizer poll period.
    #[must_use]
    pub fn with_equalizer_poll(mut self, period: Duration) -> Self {
        self.equalizer_poll = period;
        self
    }

    /// Sets the charge plan poll period.
    #[must_use]
    pub fn with_schedule_poll(mut self, period: Duration) -> Self {
        self.schedule_poll = period;
        self
    }

    /// Sets the firmware check period.
    #[must_use]
    pub fn with_firmware_poll(mut self, period: Duration) -> Self {
        self.firmware_poll = period;
        self
    }

    /// Sets the cost refresh period.
    #[must_use]
    pub fn with_cost_poll(mut self, period: Duration) -> Self {
        self.cost_poll = period;
        self
    }

    /// Sets the login timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the numeric significance threshold (e.g. `0.05` for 5 %).
    #[must_use]
    pub fn with_significance(mut self, threshold: f64) -> Self {
        self.significance = threshold;
        self
    }

    /// Sets the offline threshold.
    #[must_use]
    pub fn with_offline_after(mut self, threshold: Duration) -> Self {
        self.offline_after = threshold;
        self
    }

    /// Sets the cost coalescing window.
    #[must_use]
    pub fn with_cost_delay(mut self, delay: Duration) -> Self {
        self.cost_delay = delay;
        self
    }

    /// Sets the pause between cost reads.
    #[must_use]
    pub fn with_cost_pause(mut self, pause: Duration) -> Self {
        self.cost_pause = pause;
        self
    }

    /// Sets the maximum jitter of the daily refresh.
    #[must_use]
    pub fn with_midnight_jitter(mut self, jitter: Duration) -> Self {
        self.midnight_jitter = jitter;
        self
    }

    /// Restricts mirroring to the named sites.
    #[must_use]
    pub fn with_monitored_sites<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.monitored_sites = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Sets a fixed time zone instead of the host's local zone.
    #[must_use]
    pub fn with_time_zone(mut self, time_zone: FixedOffset) -> Self {
        self.time_zone = Some(time_zone);
        self
    }

    /// Sets the capacity of the stream event channel.
    #[must_use]
    pub fn with_stream_capacity(mut self, capacity: usize) -> Self {
        self.stream_capacity = capacity.max(1);
        self
    }

    /// Returns `true` if the site with this name should be mirrored.
    #[must_use]
    pub fn monitors_site(&self, name: &str) -> bool {
        self.monitored_sites
            .as_ref()
            .is_none_or(|names| names.iter().any(|n| n == name))
    }
}
