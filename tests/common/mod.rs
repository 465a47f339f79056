// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scripted in-memory remote shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use easee_sync::client::{
    ChargerRecord, Circuit, EqualizerRecord, Observation, ProductApi, ProductSnapshotData,
    ProductStream, Site, StreamEvent,
};
use easee_sync::command::ProductCommand;
use easee_sync::error::RemoteError;
use easee_sync::schedule::PeriodDescription;
use easee_sync::types::{
    CircuitId, FieldMap, FieldPath, FieldValue, ProductCost, ProductId, ProductKind, SiteId,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;

pub const CHARGER: &str = "EH000001";
pub const EQUALIZER: &str = "QP000001";
pub const CABIN_CHARGER: &str = "EH000002";

/// How `connect` answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectBehavior {
    Accept,
    RejectCredentials,
    ServerDown,
    Hang,
}

/// Shared, ordered record of remote calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == entry)
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0.lock().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

#[derive(Debug)]
struct ApiInner {
    log: CallLog,
    connect: Mutex<ConnectBehavior>,
    sites: Vec<Site>,
    snapshots: Mutex<HashMap<ProductId, ProductSnapshotData>>,
    polls: Mutex<HashMap<ProductId, usize>>,
    cost_reads: AtomicUsize,
    failing_cost_read: AtomicUsize,
    crashing_cost_read: AtomicUsize,
    deny_firmware: AtomicBool,
    firmware_checks: AtomicUsize,
}

/// In-memory [`ProductApi`] with one monitored site ("Home": a charger
/// and an equalizer) and one extra site ("Cabin": a charger).
#[derive(Debug, Clone)]
pub struct FakeApi {
    inner: Arc<ApiInner>,
}

impl FakeApi {
    pub fn new(log: CallLog) -> Self {
        let home = Site {
            id: SiteId::new(1),
            name: "Home".into(),
            site_key: None,
            circuits: vec![Circuit {
                id: CircuitId::new(11),
                panel_name: "Main".into(),
                chargers: vec![ChargerRecord {
                    id: ProductId::new(CHARGER),
                    name: "Garage".into(),
                    is_master: true,
                }],
            }],
            equalizers: vec![EqualizerRecord {
                id: ProductId::new(EQUALIZER),
                name: "Meter".into(),
            }],
        };
        let cabin = Site {
            id: SiteId::new(2),
            name: "Cabin".into(),
            site_key: None,
            circuits: vec![Circuit {
                id: CircuitId::new(21),
                panel_name: "Shed".into(),
                chargers: vec![ChargerRecord {
                    id: ProductId::new(CABIN_CHARGER),
                    name: "Cabin".into(),
                    is_master: true,
                }],
            }],
            equalizers: Vec::new(),
        };

        let now = Utc::now();
        let mut snapshots = HashMap::new();
        snapshots.insert(ProductId::new(CHARGER), charger_snapshot(now));
        snapshots.insert(ProductId::new(CABIN_CHARGER), charger_snapshot(now));
        snapshots.insert(ProductId::new(EQUALIZER), equalizer_snapshot(now));

        Self {
            inner: Arc::new(ApiInner {
                log,
                connect: Mutex::new(ConnectBehavior::Accept),
                sites: vec![home, cabin],
                snapshots: Mutex::new(snapshots),
                polls: Mutex::new(HashMap::new()),
                cost_reads: AtomicUsize::new(0),
                failing_cost_read: AtomicUsize::new(0),
                crashing_cost_read: AtomicUsize::new(0),
                deny_firmware: AtomicBool::new(false),
                firmware_checks: AtomicUsize::new(0),
            }),
        }
    }

    pub fn with_connect(self, behavior: ConnectBehavior) -> Self {
        *self.inner.connect.lock() = behavior;
        self
    }

    /// Changes a state field returned by later polls.
    pub fn set_state(&self, product: &str, field: &str, value: Option<FieldValue>) {
        let mut snapshots = self.inner.snapshots.lock();
        if let Some(snapshot) = snapshots.get_mut(&ProductId::new(product)) {
            snapshot.state.insert(field.to_string(), value);
        }
    }

    pub fn polls(&self, product: &str) -> usize {
        self.inner
            .polls
            .lock()
            .get(&ProductId::new(product))
            .copied()
            .unwrap_or(0)
    }

    pub fn cost_reads(&self) -> usize {
        self.inner.cost_reads.load(Ordering::SeqCst)
    }

    /// Makes the n-th cost read (1-based) fail with a server error.
    pub fn fail_cost_read(&self, n: usize) {
        self.inner.failing_cost_read.store(n, Ordering::SeqCst);
    }

    /// Makes the n-th cost read (1-based) panic.
    pub fn crash_cost_read(&self, n: usize) {
        self.inner.crashing_cost_read.store(n, Ordering::SeqCst);
    }

    pub fn deny_firmware(&self) {
        self.inner.deny_firmware.store(true, Ordering::SeqCst);
    }

    pub fn firmware_checks(&self) -> usize {
        self.inner.firmware_checks.load(Ordering::SeqCst)
    }
}

pub fn charger_snapshot(now: DateTime<Utc>) -> ProductSnapshotData {
    let mut state = FieldMap::new();
    state.insert("isOnline".into(), Some(FieldValue::Bool(true)));
    state.insert("latestPulse".into(), Some(FieldValue::Timestamp(now)));
    state.insert("sessionEnergy".into(), Some(FieldValue::Number(10.0)));
    state.insert("lifetimeEnergy".into(), Some(FieldValue::Number(1000.0)));
    state.insert("smartCharging".into(), Some(FieldValue::Bool(false)));
    let mut config = FieldMap::new();
    config.insert("isEnabled".into(), Some(FieldValue::Bool(true)));
    ProductSnapshotData { state, config }
}

pub fn equalizer_snapshot(now: DateTime<Utc>) -> ProductSnapshotData {
    let mut state = FieldMap::new();
    state.insert("isOnline".into(), Some(FieldValue::Bool(true)));
    state.insert("latestPulse".into(), Some(FieldValue::Timestamp(now)));
    state.insert("activePowerImport".into(), Some(FieldValue::Number(2.5)));
    ProductSnapshotData {
        state,
        config: FieldMap::new(),
    }
}

impl ProductApi for FakeApi {
    async fn connect(&self) -> Result<(), RemoteError> {
        self.inner.log.push("connect");
        let behavior = *self.inner.connect.lock();
        match behavior {
            ConnectBehavior::Accept => Ok(()),
            ConnectBehavior::RejectCredentials => Err(RemoteError::AuthFailed),
            ConnectBehavior::ServerDown => Err(RemoteError::ServerFailure(503)),
            ConnectBehavior::Hang => std::future::pending().await,
        }
    }

    async fn account_products(&self) -> Result<Vec<Site>, RemoteError> {
        self.inner.log.push("account_products");
        Ok(self.inner.sites.clone())
    }

    async fn poll_product(
        &self,
        product: &ProductId,
        _kind: ProductKind,
    ) -> Result<ProductSnapshotData, RemoteError> {
        self.inner.log.push(format!("poll:{product}"));
        *self.inner.polls.lock().entry(product.clone()).or_default() += 1;
        self.inner
            .snapshots
            .lock()
            .get(product)
            .cloned()
            .ok_or(RemoteError::NotFound)
    }

    async fn observations(
        &self,
        _product: &ProductId,
        _fields: &[FieldPath],
    ) -> Result<Vec<Observation>, RemoteError> {
        Ok(Vec::new())
    }

    async fn basic_charge_plan(&self, product: &ProductId) -> Result<PeriodDescription, RemoteError> {
        self.inner.log.push(format!("basic_plan:{product}"));
        Err(RemoteError::NotFound)
    }

    async fn weekly_charge_plan(
        &self,
        product: &ProductId,
    ) -> Result<PeriodDescription, RemoteError> {
        self.inner.log.push(format!("weekly_plan:{product}"));
        Err(RemoteError::NotFound)
    }

    async fn cost_between(
        &self,
        site: SiteId,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Option<Vec<ProductCost>>, RemoteError> {
        self.inner.log.push(format!("cost:{site}"));
        let n = self.inner.cost_reads.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.inner.failing_cost_read.load(Ordering::SeqCst) {
            return Err(RemoteError::ServerFailure(500));
        }
        assert_ne!(n, self.inner.crashing_cost_read.load(Ordering::SeqCst), "cost backend crashed");
        #[allow(clippy::cast_precision_loss)]
        let usage = n as f64;
        Ok(Some(vec![ProductCost {
            product_id: ProductId::new(CHARGER),
            usage,
            cost: usage * 2.0,
            currency_id: "EUR".into(),
        }]))
    }

    async fn latest_firmware(&self, product: &ProductId) -> Result<u32, RemoteError> {
        self.inner.log.push(format!("firmware:{product}"));
        self.inner.firmware_checks.fetch_add(1, Ordering::SeqCst);
        if self.inner.deny_firmware.load(Ordering::SeqCst) {
            Err(RemoteError::Forbidden)
        } else {
            Ok(305)
        }
    }

    async fn send_command(
        &self,
        product: &ProductId,
        command: ProductCommand,
    ) -> Result<(), RemoteError> {
        self.inner.log.push(format!("command:{product}:{command}"));
        Ok(())
    }

    async fn close(&self) {
        self.inner.log.push("close");
    }
}

/// In-memory [`ProductStream`]; tests push events through [`emit`](Self::emit).
#[derive(Debug, Clone)]
pub struct FakeStream {
    log: CallLog,
    connected: Arc<AtomicBool>,
    sender: Arc<Mutex<Option<mpsc::Sender<StreamEvent>>>>,
}

impl FakeStream {
    pub fn new(log: CallLog, connected: bool) -> Self {
        Self {
            log,
            connected: Arc::new(AtomicBool::new(connected)),
            sender: Arc::new(Mutex::new(None)),
        }
    }

    /// Delivers an event to the controller, updating the connection flag
    /// for connection events.
    pub async fn emit(&self, event: StreamEvent) {
        if let StreamEvent::Connection { connected } = event {
            self.connected.store(connected, Ordering::SeqCst);
        }
        let sender = self.sender.lock().clone();
        if let Some(sender) = sender {
            sender.send(event).await.unwrap();
        }
    }

    pub async fn observe(&self, product: &str, field: &str, data_type: easee_sync::types::DataType, value: &str) {
        self.emit(StreamEvent::Observation {
            product_id: ProductId::new(product),
            data_type,
            field: field.parse().unwrap(),
            value: value.to_string(),
        })
        .await;
    }
}

impl ProductStream for FakeStream {
    async fn subscribe(
        &self,
        product: &ProductId,
        events: mpsc::Sender<StreamEvent>,
    ) -> Result<(), RemoteError> {
        self.log.push(format!("subscribe:{product}"));
        *self.sender.lock() = Some(events);
        Ok(())
    }

    async fn unsubscribe(&self, product: &ProductId) -> Result<(), RemoteError> {
        self.log.push(format!("unsubscribe:{product}"));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
