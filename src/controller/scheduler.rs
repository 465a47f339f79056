// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ticker tasks feeding the controller queue.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::message::{Job, Message};

const FALLBACK_DAY: Duration = Duration::from_secs(24 * 3600);

/// Spawns a task posting `job` every `period`, first after one period.
pub(crate) fn spawn_interval(
    job: Job,
    period: Duration,
    tx: mpsc::UnboundedSender<Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if tx.send(Message::Tick(job)).is_err() {
                break;
            }
        }
    })
}

/// Spawns a task posting [`Job::DailyRefresh`] at a random point within
/// `jitter` after each local midnight.
pub(crate) fn spawn_daily(
    jitter: Duration,
    time_zone: Option<FixedOffset>,
    tx: mpsc::UnboundedSender<Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let wait = match time_zone {
                Some(tz) => until_next_midnight(now, &tz),
                None => until_next_midnight(now, &Local),
            };
            let delay = wait + random_jitter(jitter);
            tracing::debug!(delay_secs = delay.as_secs(), "Daily refresh scheduled");
            time::sleep(delay).await;
            if tx.send(Message::Tick(Job::DailyRefresh)).is_err() {
                break;
            }
        }
    })
}

/// Time left until the next midnight in `tz`.
pub(crate) fn until_next_midnight<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz) -> Duration {
    let next = now
        .with_timezone(tz)
        .date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|midnight| tz.from_local_datetime(&midnight).earliest());

    match next {
        Some(midnight) => (midnight.with_timezone(&Utc) - now)
            .to_std()
            .unwrap_or(Duration::ZERO),
        None => FALLBACK_DAY,
    }
}

fn random_jitter(max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(fastrand::u64(0..=max_ms))
}
