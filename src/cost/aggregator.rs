// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-site coalescing of cost recomputation requests.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{FixedOffset, Local, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{CostBatch, CostWindow, window_starts};
use crate::client::ProductApi;
use crate::types::{ProductId, SiteId};

/// Default delay between the first request for a site and its fetch.
pub const DEFAULT_COST_DELAY: Duration = Duration::from_secs(60);

/// Default pause between the reads of one batch.
pub const DEFAULT_COST_PAUSE: Duration = Duration::from_secs(1);

struct PendingRequest {
    products: BTreeSet<ProductId>,
    delivered: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl PendingRequest {
    /// The task ended without sending its batch, so no `complete` will come.
    fn is_abandoned(&self) -> bool {
        self.task.is_finished() && !self.delivered.load(Ordering::Acquire)
    }
}

/// Coalesces cost recomputation requests into one delayed fetch per site.
///
/// The first [`request_update`](Self::request_update) for a site schedules a
/// task that waits for the delay, reads the day, month and year windows one
/// after another, and sends a [`CostBatch`] on the result channel. Requests
/// for the same site arriving before the owner calls
/// [`complete`](Self::complete) join the pending task. A task that ended
/// without delivering its batch no longer absorbs requests.
pub struct CostAggregator<A, M = CostBatch> {
    api: Arc<A>,
    results: mpsc::UnboundedSender<M>,
    delay: Duration,
    pause: Duration,
    time_zone: Option<FixedOffset>,
    pending: HashMap<SiteId, PendingRequest>,
}

impl<A, M> CostAggregator<A, M>
where
    A: ProductApi,
    M: From<CostBatch> + Send + 'static,
{
    /// Creates an aggregator delivering batches on `results`.
    #[must_use]
    pub fn new(api: Arc<A>, results: mpsc::UnboundedSender<M>) -> Self {
        Self {
            api,
            results,
            delay: DEFAULT_COST_DELAY,
            pause: DEFAULT_COST_PAUSE,
            time_zone: None,
            pending: HashMap::new(),
        }
    }

    /// Sets the coalescing delay.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the pause between the reads of one batch.
    #[must_use]
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Sets the time zone whose midnight starts each window (`None` = local).
    #[must_use]
    pub fn with_time_zone(mut self, time_zone: Option<FixedOffset>) -> Self {
        self.time_zone = time_zone;
        self
    }

    /// Registers interest in fresh cost figures for `product`.
    ///
    /// Returns `true` if a new fetch was scheduled, `false` if the request
    /// joined one already pending for the site.
    pub fn request_update(&mut self, site: SiteId, product: ProductId) -> bool {
        let mut products = BTreeSet::new();
        if let Some(pending) = self.pending.get_mut(&site) {
            if !pending.is_abandoned() {
                tracing::debug!(%site, product_id = %product, "Cost update coalesced");
                pending.products.insert(product);
                return false;
            }
            tracing::warn!(%site, "Cost fetch ended without a batch, rescheduling");
            if let Some(stale) = self.pending.remove(&site) {
                products = stale.products;
            }
        }
        products.insert(product.clone());

        tracing::debug!(%site, product_id = %product, delay_secs = self.delay.as_secs(), "Cost update scheduled");
        let delivered = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(fetch_batch(
            Arc::clone(&self.api),
            self.results.clone(),
            Arc::clone(&delivered),
            site,
            self.delay,
            self.pause,
            self.time_zone,
        ));
        self.pending.insert(
            site,
            PendingRequest {
                products,
                delivered,
                task,
            },
        );
        true
    }

    /// Releases the pending entry of a site once its batch was delivered.
    ///
    /// Returns the products that asked for the update.
    pub fn complete(&mut self, site: SiteId) -> Vec<ProductId> {
        self.pending
            .remove(&site)
            .map(|pending| pending.products.into_iter().collect())
            .unwrap_or_default()
    }

    /// Returns `true` if a fetch is scheduled or running for `site`.
    #[must_use]
    pub fn is_pending(&self, site: SiteId) -> bool {
        self.pending.contains_key(&site)
    }

    /// Returns the number of sites with a pending fetch.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Aborts every pending fetch.
    pub fn cancel_all(&mut self) {
        for (site, pending) in self.pending.drain() {
            tracing::debug!(%site, "Cancelling pending cost fetch");
            pending.task.abort();
        }
    }
}

impl<A, M> Drop for CostAggregator<A, M> {
    fn drop(&mut self) {
        for pending in self.pending.values() {
            pending.task.abort();
        }
    }
}

impl<A, M> std::fmt::Debug for CostAggregator<A, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostAggregator")
            .field("delay", &self.delay)
            .field("pause", &self.pause)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

async fn fetch_batch<A, M>(
    api: Arc<A>,
    results: mpsc::UnboundedSender<M>,
    delivered: Arc<AtomicBool>,
    site: SiteId,
    delay: Duration,
    pause: Duration,
    time_zone: Option<FixedOffset>,
) where
    A: ProductApi,
    M: From<CostBatch>,
{
    tokio::time::sleep(delay).await;

    let now = Utc::now();
    let starts = match time_zone {
        Some(tz) => window_starts(now, &tz),
        None => window_starts(now, &Local),
    };

    let mut windows = Vec::with_capacity(starts.len());
    for (i, (section, from)) in starts.into_iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(pause).await;
        }
        let rows = match api.cost_between(site, from, now).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(%site, window = %section, error = %e, "Cost fetch failed");
                None
            }
        };
        windows.push(CostWindow { section, rows });
    }

    delivered.store(true, Ordering::Release);
    if results.send(CostBatch { site, windows }.into()).is_err() {
        tracing::debug!(%site, "Cost batch dropped, receiver gone");
    }
}
