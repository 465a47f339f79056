// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The controller task: a single consumer of stream events, ticks, and
//! results of spawned network calls.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use super::SyncConfig;
use super::message::{Job, Message, Request};
use super::scheduler;
use crate::client::{ProductApi, ProductSnapshotData, ProductStream, StreamEvent};
use crate::cost::CostAggregator;
use crate::error::{Error, RemoteError};
use crate::schedule::PeriodDescription;
use crate::state::{OfflineDetector, ProductState, UpdateOutcome};
use crate::types::{FieldPath, FieldValue, ProductId, ProductKind, Section};

/// State field holding the latest available firmware.
const LATEST_FIRMWARE_FIELD: &str = "latestFirmware";

/// Applies a poll result to a product.
pub(super) fn apply_poll(
    product: &mut ProductState,
    result: Result<ProductSnapshotData, RemoteError>,
) -> UpdateOutcome {
    match result {
        Ok(data) => product.apply_snapshot(data.state, data.config, Utc::now()),
        Err(e) => {
            tracing::warn!(product_id = %product.id(), error = %e, transient = e.is_transient(), "Product poll failed");
            UpdateOutcome::IGNORED
        }
    }
}

/// Applies a charge plan read to a product. A missing plan disables it.
pub(super) fn apply_plan(
    product: &mut ProductState,
    section: Section,
    result: Result<PeriodDescription, RemoteError>,
) {
    match result {
        Ok(description) => product.decode_schedule(section, Some(&description)),
        Err(RemoteError::NotFound) => product.decode_schedule(section, None),
        Err(e) => {
            tracing::warn!(product_id = %product.id(), section = %section, error = %e, "Charge plan poll failed");
        }
    }
}

fn apply_firmware(product: &mut ProductState, result: Result<u32, RemoteError>) {
    match result {
        Ok(version) => {
            product.update(
                &FieldPath::state(LATEST_FIRMWARE_FIELD),
                Some(FieldValue::Number(f64::from(version))),
            );
        }
        Err(e) if e.is_auth() => {
            if product.mark_firmware_auth_failure() {
                tracing::error!(product_id = %product.id(), error = %e, "Not authorized to check firmware");
            } else {
                tracing::debug!(product_id = %product.id(), "Firmware check still not authorized");
            }
        }
        Err(e) => {
            tracing::warn!(product_id = %product.id(), error = %e, "Firmware check failed");
        }
    }
}

pub(super) struct Runner<A: ProductApi, S: ProductStream> {
    api: Arc<A>,
    stream: Arc<S>,
    config: SyncConfig,
    products: Vec<ProductState>,
    index: HashMap<ProductId, usize>,
    offline: OfflineDetector,
    costs: CostAggregator<A, Message>,
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
    events_tx: mpsc::Sender<StreamEvent>,
    events_rx: mpsc::Receiver<StreamEvent>,
    tasks: JoinSet<()>,
    tickers: Vec<JoinHandle<()>>,
}

impl<A: ProductApi, S: ProductStream> Runner<A, S> {
    pub(super) fn new(
        api: Arc<A>,
        stream: Arc<S>,
        config: SyncConfig,
        products: Vec<ProductState>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(config.stream_capacity);
        let index = products
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id().clone(), i))
            .collect();
        let costs = CostAggregator::new(Arc::clone(&api), tx.clone())
            .with_delay(config.cost_delay)
            .with_pause(config.cost_pause)
            .with_time_zone(config.time_zone);

        Self {
            offline: OfflineDetector::new(config.offline_after),
            api,
            stream,
            config,
            products,
            index,
            costs,
            tx,
            rx,
            events_tx,
            events_rx,
            tasks: JoinSet::new(),
            tickers: Vec::new(),
        }
    }

    pub(super) async fn run(mut self, mut requests: mpsc::UnboundedReceiver<Request>) {
        self.start_tickers();
        self.subscribe_all();
        self.refresh_firmware();
        self.request_costs();
        tracing::info!(products = self.products.len(), "Sync controller started");

        loop {
            tokio::select! {
                Some(message) = self.rx.recv() => self.handle_message(message),
                Some(event) = self.events_rx.recv() => self.handle_event(event),
                request = requests.recv() => match request {
                    Some(Request::Shutdown) | None => break,
                    Some(request) => self.handle_request(request),
                },
            }
            while self.tasks.try_join_next().is_some() {}
            self.fan_out();
        }

        self.teardown().await;
    }

    fn start_tickers(&mut self) {
        let periods = [
            (Job::ChargerPoll, self.config.state_poll),
            (Job::EqualizerPoll, self.config.equalizer_poll),
            (Job::SchedulePoll, self.config.schedule_poll),
            (Job::FirmwarePoll, self.config.firmware_poll),
            (Job::CostPoll, self.config.cost_poll),
        ];
        for (job, period) in periods {
            self.tickers
                .push(scheduler::spawn_interval(job, period, self.tx.clone()));
        }
        self.tickers.push(scheduler::spawn_daily(
            self.config.midnight_jitter,
            self.config.time_zone,
            self.tx.clone(),
        ));
    }

    fn subscribe_all(&mut self) {
        for product in &self.products {
            let stream = Arc::clone(&self.stream);
            let tx = self.tx.clone();
            let events = self.events_tx.clone();
            let id = product.id().clone();
            self.tasks.spawn(async move {
                let result = stream.subscribe(&id, events).await;
                let _ = tx.send(Message::Subscribed { product: id, result });
            });
        }
    }

    // ========== Dispatch ==========

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::Tick(job) => self.run_job(job),
            Message::Polled { product, result } => {
                let Some(i) = self.position(&product) else {
                    return;
                };
                let outcome = apply_poll(&mut self.products[i], result);
                if outcome.cost_refresh_requested() {
                    self.request_cost(i);
                }
            }
            Message::Plan {
                product,
                section,
                result,
            } => {
                if let Some(i) = self.position(&product) {
                    apply_plan(&mut self.products[i], section, result);
                }
            }
            Message::Firmware { product, result } => {
                if let Some(i) = self.position(&product) {
                    apply_firmware(&mut self.products[i], result);
                }
            }
            Message::Subscribed { product, result } => {
                let Some(i) = self.position(&product) else {
                    return;
                };
                match result {
                    Ok(()) => {
                        let connected = self.stream.is_connected();
                        let state = &mut self.products[i];
                        state.set_subscribed(true);
                        state.set_stream_connected(connected);
                        tracing::info!(product_id = %product, connected, "Subscribed to product stream");
                    }
                    Err(e) => {
                        tracing::warn!(product_id = %product, error = %e, "Stream subscription failed");
                    }
                }
            }
            Message::Cost(batch) => {
                let mut changed = 0;
                for product in &mut self.products {
                    if product.identity().site_id == batch.site && batch.apply_to(product) {
                        changed += 1;
                    }
                }
                let requested = self.costs.complete(batch.site);
                tracing::debug!(site = %batch.site, requested = requested.len(), changed, "Cost batch applied");
            }
        }
    }

    fn handle_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Observation {
                product_id,
                data_type,
                field,
                value,
            } => {
                let Some(i) = self.position(&product_id) else {
                    tracing::debug!(%product_id, "Observation for unknown product");
                    return;
                };
                let outcome =
                    self.products[i].update_observation(&field, data_type, &value, Utc::now());
                if outcome.cost_refresh_requested() {
                    self.request_cost(i);
                }
            }
            StreamEvent::Connection { connected } => {
                tracing::info!(connected, "Stream connection changed");
                for product in &mut self.products {
                    if product.is_subscribed() {
                        product.set_stream_connected(connected);
                    }
                }
            }
        }
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::Command {
                product,
                command,
                reply,
            } => {
                if self.position(&product).is_none() {
                    let _ = reply.send(Err(Error::ProductNotFound(product)));
                    return;
                }
                let api = Arc::clone(&self.api);
                self.tasks.spawn(async move {
                    let result = api.send_command(&product, command).await;
                    match &result {
                        Ok(()) => tracing::info!(product_id = %product, %command, "Command sent"),
                        Err(e) => tracing::warn!(product_id = %product, %command, error = %e, "Command failed"),
                    }
                    let _ = reply.send(result.map_err(Error::from));
                });
            }
            Request::Refresh { product, reply } => {
                let Some(i) = self.position(&product) else {
                    let _ = reply.send(Err(Error::ProductNotFound(product)));
                    return;
                };
                self.spawn_poll(i);
                if self.products[i].kind().is_charger() {
                    self.spawn_plans(i);
                }
                let _ = reply.send(Ok(()));
            }
            Request::Shutdown => {}
        }
    }

    fn run_job(&mut self, job: Job) {
        tracing::debug!(%job, "Running periodic job");
        match job {
            Job::ChargerPoll => self.poll_kind(ProductKind::Charger),
            Job::EqualizerPoll => self.poll_kind(ProductKind::Equalizer),
            Job::SchedulePoll => {
                for i in self.chargers() {
                    self.spawn_plans(i);
                }
            }
            Job::FirmwarePoll => self.refresh_firmware(),
            Job::CostPoll => self.request_costs(),
            Job::DailyRefresh => {
                self.refresh_firmware();
                self.request_costs();
            }
        }
    }

    // ========== Jobs ==========

    fn poll_kind(&mut self, kind: ProductKind) {
        let now = Utc::now();
        for i in 0..self.products.len() {
            let product = &mut self.products[i];
            if product.kind() != kind {
                continue;
            }
            self.offline.check_liveness(product, now);
            if product.stream_is_authoritative() {
                tracing::debug!(product_id = %product.id(), "Skipping poll, stream is live");
                continue;
            }
            self.spawn_poll(i);
        }
    }

    fn spawn_poll(&mut self, i: usize) {
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        let id = self.products[i].id().clone();
        let kind = self.products[i].kind();
        self.tasks.spawn(async move {
            let result = api.poll_product(&id, kind).await;
            let _ = tx.send(Message::Polled {
                product: id,
                result,
            });
        });
    }

    fn spawn_plans(&mut self, i: usize) {
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        let id = self.products[i].id().clone();
        self.tasks.spawn(async move {
            let basic = api.basic_charge_plan(&id).await;
            let _ = tx.send(Message::Plan {
                product: id.clone(),
                section: Section::Schedule,
                result: basic,
            });
            let weekly = api.weekly_charge_plan(&id).await;
            let _ = tx.send(Message::Plan {
                product: id,
                section: Section::WeeklySchedule,
                result: weekly,
            });
        });
    }

    fn refresh_firmware(&mut self) {
        for product in &self.products {
            let api = Arc::clone(&self.api);
            let tx = self.tx.clone();
            let id = product.id().clone();
            self.tasks.spawn(async move {
                let result = api.latest_firmware(&id).await;
                let _ = tx.send(Message::Firmware {
                    product: id,
                    result,
                });
            });
        }
    }

    fn request_costs(&mut self) {
        for i in self.chargers() {
            self.request_cost(i);
        }
    }

    fn request_cost(&mut self, i: usize) {
        let product = &self.products[i];
        if product.kind().is_charger() {
            self.costs
                .request_update(product.identity().site_id, product.id().clone());
        }
    }

    // ========== Helpers ==========

    fn position(&self, id: &ProductId) -> Option<usize> {
        self.index.get(id).copied()
    }

    fn chargers(&self) -> Vec<usize> {
        self.products
            .iter()
            .enumerate()
            .filter(|(_, p)| p.kind().is_charger())
            .map(|(i, _)| i)
            .collect()
    }

    fn fan_out(&mut self) {
        for product in &mut self.products {
            if product.is_dirty() {
                product.notify_observers();
            }
        }
    }

    async fn teardown(mut self) {
        tracing::info!("Stopping sync controller");

        for ticker in self.tickers.drain(..) {
            ticker.abort();
        }
        self.costs.cancel_all();
        self.tasks.abort_all();

        for product in &mut self.products {
            if !product.is_subscribed() {
                continue;
            }
            if let Err(e) = self.stream.unsubscribe(product.id()).await {
                tracing::debug!(product_id = %product.id(), error = %e, "Unsubscribe failed");
            }
            product.set_subscribed(false);
            product.set_stream_connected(false);
            product.notify_observers();
        }

        self.api.close().await;
        tracing::info!("Sync controller stopped");
    }
}
