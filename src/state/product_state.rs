// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-product state container.

use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset, Local, Utc};
use tokio::sync::watch;

use crate::client::schema;
use crate::error::FieldError;
use crate::schedule::{self, PeriodDescription, Schedule};
use crate::subscription::{
    EntityKind, EntityRef, Notification, ObserverHandle, ObserverId, ObserverSet,
};
use crate::types::{
    CircuitId, CostRecord, DataType, FieldMap, FieldPath, FieldValue, ProductId, ProductKind,
    Section, SiteId,
};

/// State field carrying the online flag.
pub const ONLINE_FIELD: &str = "isOnline";

/// State field carrying the device's own last-seen time.
pub const PULSE_FIELD: &str = "latestPulse";

/// State field whose changes invalidate the stored cost figures.
pub const LIFETIME_ENERGY_FIELD: &str = "lifetimeEnergy";

/// Default relative change a numeric field must exceed to be significant.
pub const DEFAULT_SIGNIFICANCE: f64 = 0.05;

/// Returns `true` if moving from `old` to `new` is worth notifying.
///
/// Numbers are compared with a relative threshold: the change is significant
/// if `|old - new| > |old| * threshold`. Any other change, including a first
/// write, is significant.
///
/// # Examples
///
/// ```
/// use easee_sync::state::is_significant;
/// use easee_sync::types::FieldValue;
///
/// let old = FieldValue::Number(10.0);
/// assert!(!is_significant(Some(&old), Some(&FieldValue::Number(10.2)), 0.05));
/// assert!(is_significant(Some(&old), Some(&FieldValue::Number(10.6)), 0.05));
/// assert!(is_significant(None, Some(&FieldValue::Bool(false)), 0.05));
/// ```
#[must_use]
pub fn is_significant(old: Option<&FieldValue>, new: Option<&FieldValue>, threshold: f64) -> bool {
    match (old, new) {
        (Some(FieldValue::Number(old)), Some(FieldValue::Number(new))) => {
            (old - new).abs() > old.abs() * threshold
        }
        (old, new) => old != new,
    }
}

/// Static description of a product.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProductIdentity {
    /// Remote product id.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Charger or equalizer.
    pub kind: ProductKind,
    /// Owning site.
    pub site_id: SiteId,
    /// Circuit the charger is wired to; `None` for equalizers.
    pub circuit_id: Option<CircuitId>,
    /// Whether the charger is the circuit master.
    pub is_master: bool,
}

impl ProductIdentity {
    /// Describes a charger.
    #[must_use]
    pub fn charger(
        id: impl Into<ProductId>,
        name: impl Into<String>,
        site_id: SiteId,
        circuit_id: CircuitId,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ProductKind::Charger,
            site_id,
            circuit_id: Some(circuit_id),
            is_master: false,
        }
    }

    /// Describes an equalizer.
    #[must_use]
    pub fn equalizer(id: impl Into<ProductId>, name: impl Into<String>, site_id: SiteId) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ProductKind::Equalizer,
            site_id,
            circuit_id: None,
            is_master: false,
        }
    }

    /// Marks the charger as circuit master.
    #[must_use]
    pub fn with_master(mut self, is_master: bool) -> Self {
        self.is_master = is_master;
        self
    }
}

/// Synchronization phase of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProductPhase {
    /// No snapshot has been received yet.
    Uninitialized,
    /// At least one snapshot was applied; no stream subscription yet.
    Polled,
    /// Subscribed to the stream; online state not reported.
    Subscribed,
    /// Subscribed and reported online.
    Online,
    /// Subscribed and reported or detected offline.
    Offline,
}

/// Result of a single field write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    significant: bool,
    cost_refresh: bool,
}

impl UpdateOutcome {
    /// Nothing was written.
    pub const IGNORED: Self = Self {
        significant: false,
        cost_refresh: false,
    };

    /// Returns `true` if the write marked the product dirty.
    #[must_use]
    pub fn is_significant(self) -> bool {
        self.significant
    }

    /// Returns `true` if the write invalidated the stored cost figures.
    #[must_use]
    pub fn cost_refresh_requested(self) -> bool {
        self.cost_refresh
    }

    /// Combines the outcomes of several writes.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            significant: self.significant || other.significant,
            cost_refresh: self.cost_refresh || other.cost_refresh,
        }
    }
}

/// Read-only copy of a product, published after each notification pass.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ProductSnapshot {
    /// The product id.
    pub product_id: ProductId,
    /// Synchronization phase.
    pub phase: ProductPhase,
    /// Telemetry, if known.
    pub state: Option<FieldMap>,
    /// Configuration, if known.
    pub config: Option<FieldMap>,
    /// Basic charge plan, if decoded.
    pub schedule: Option<Schedule>,
    /// Weekly charge plan, if decoded.
    pub weekly_schedule: Option<Schedule>,
    /// Cost of today.
    pub cost_day: CostRecord,
    /// Cost of the month so far.
    pub cost_month: CostRecord,
    /// Cost of the year so far.
    pub cost_year: CostRecord,
    /// Last liveness signal.
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    /// Whether the push stream is live.
    pub stream_connected: bool,
}

impl ProductSnapshot {
    fn empty(product_id: ProductId) -> Self {
        Self {
            product_id,
            phase: ProductPhase::Uninitialized,
            state: None,
            config: None,
            schedule: None,
            weekly_schedule: None,
            cost_day: CostRecord::default(),
            cost_month: CostRecord::default(),
            cost_year: CostRecord::default(),
            last_heartbeat_at: None,
            stream_connected: false,
        }
    }
}

/// Mutable mirror of one charger or equalizer.
///
/// Owned by the controller task and mutated only from there. Writes go
/// through [`update`](Self::update), which filters insignificant changes and
/// records the fields that need a notification.
/// [`notify_observers`](Self::notify_observers) runs the listeners of those
/// fields and publishes a [`ProductSnapshot`].
///
/// Numeric significance is measured against the previously stored value.
///
/// # Examples
///
/// ```
/// use easee_sync::state::{ProductIdentity, ProductState};
/// use easee_sync::types::{CircuitId, FieldPath, FieldValue, SiteId};
///
/// let identity = ProductIdentity::charger("EH123", "Garage", SiteId::new(1), CircuitId::new(2));
/// let mut product = ProductState::new(identity);
/// let path = FieldPath::state("sessionEnergy");
///
/// assert!(product.update(&path, Some(FieldValue::Number(10.0))).is_significant());
/// assert!(!product.update(&path, Some(FieldValue::Number(10.2))).is_significant());
/// assert!(product.update(&path, Some(FieldValue::Number(10.6))).is_significant());
/// ```
pub struct ProductState {
    identity: ProductIdentity,
    state: Option<FieldMap>,
    config: Option<FieldMap>,
    schedule: Option<Schedule>,
    weekly_schedule: Option<Schedule>,
    cost_day: CostRecord,
    cost_month: CostRecord,
    cost_year: CostRecord,
    observers: ObserverSet,
    last_heartbeat_at: Option<DateTime<Utc>>,
    stream_connected: bool,
    subscribed: bool,
    firmware_auth_failure_seen: bool,
    has_initial_snapshot: bool,
    dirty: BTreeSet<FieldPath>,
    publish_pending: bool,
    threshold: f64,
    time_zone: Option<FixedOffset>,
    snapshot_tx: watch::Sender<ProductSnapshot>,
}

impl ProductState {
    /// Creates an empty product with the default significance threshold.
    #[must_use]
    pub fn new(identity: ProductIdentity) -> Self {
        let (snapshot_tx, _) = watch::channel(ProductSnapshot::empty(identity.id.clone()));
        Self {
            identity,
            state: None,
            config: None,
            schedule: None,
            weekly_schedule: None,
            cost_day: CostRecord::default(),
            cost_month: CostRecord::default(),
            cost_year: CostRecord::default(),
            observers: ObserverSet::new(),
            last_heartbeat_at: None,
            stream_connected: false,
            subscribed: false,
            firmware_auth_failure_seen: false,
            has_initial_snapshot: false,
            dirty: BTreeSet::new(),
            publish_pending: false,
            threshold: DEFAULT_SIGNIFICANCE,
            time_zone: None,
            snapshot_tx,
        }
    }

    /// Sets the relative significance threshold for numeric fields.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets the time zone charge plans are decoded in.
    ///
    /// `None` uses the local time zone of the host.
    #[must_use]
    pub fn with_time_zone(mut self, time_zone: Option<FixedOffset>) -> Self {
        self.time_zone = time_zone;
        self
    }

    // ========== Identity ==========

    /// Returns the product id.
    #[must_use]
    pub fn id(&self) -> &ProductId {
        &self.identity.id
    }

    /// Returns the static description of the product.
    #[must_use]
    pub fn identity(&self) -> &ProductIdentity {
        &self.identity
    }

    /// Returns the product kind.
    #[must_use]
    pub fn kind(&self) -> ProductKind {
        self.identity.kind
    }

    // ========== Reads ==========

    /// Returns the telemetry map, if known.
    #[must_use]
    pub fn state(&self) -> Option<&FieldMap> {
        self.state.as_ref()
    }

    /// Returns the configuration map, if known.
    #[must_use]
    pub fn config(&self) -> Option<&FieldMap> {
        self.config.as_ref()
    }

    /// Returns the decoded basic charge plan.
    #[must_use]
    pub fn schedule(&self) -> Option<&Schedule> {
        self.schedule.as_ref()
    }

    /// Returns the decoded weekly charge plan.
    #[must_use]
    pub fn weekly_schedule(&self) -> Option<&Schedule> {
        self.weekly_schedule.as_ref()
    }

    /// Returns the cost record of a `cost_*` section.
    #[must_use]
    pub fn cost(&self, section: Section) -> Option<&CostRecord> {
        match section {
            Section::CostDay => Some(&self.cost_day),
            Section::CostMonth => Some(&self.cost_month),
            Section::CostYear => Some(&self.cost_year),
            _ => None,
        }
    }

    /// Returns the current value of any field.
    #[must_use]
    pub fn value(&self, path: &FieldPath) -> Option<FieldValue> {
        let name = path.name();
        match path.section() {
            Section::State => self.state.as_ref()?.get(name)?.clone(),
            Section::Config => self.config.as_ref()?.get(name)?.clone(),
            Section::Schedule => self.schedule.as_ref()?.field(name),
            Section::WeeklySchedule => self.weekly_schedule.as_ref()?.field(name),
            section => self.cost(section)?.field(name),
        }
    }

    /// Returns the online flag, if reported.
    #[must_use]
    pub fn is_online(&self) -> Option<bool> {
        self.state
            .as_ref()?
            .get(ONLINE_FIELD)?
            .as_ref()?
            .as_bool()
    }

    /// Returns the time of the last liveness signal.
    #[must_use]
    pub fn last_heartbeat_at(&self) -> Option<DateTime<Utc>> {
        self.last_heartbeat_at
    }

    /// Returns `true` once a full poll snapshot has been applied.
    #[must_use]
    pub fn has_initial_snapshot(&self) -> bool {
        self.has_initial_snapshot
    }

    /// Returns `true` while the push stream for this product is live.
    #[must_use]
    pub fn is_stream_connected(&self) -> bool {
        self.stream_connected
    }

    /// Returns `true` once the product is subscribed to the push stream.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Returns the synchronization phase.
    #[must_use]
    pub fn phase(&self) -> ProductPhase {
        if !self.has_initial_snapshot {
            return ProductPhase::Uninitialized;
        }
        if !self.subscribed {
            return ProductPhase::Polled;
        }
        match self.is_online() {
            Some(true) => ProductPhase::Online,
            Some(false) => ProductPhase::Offline,
            None => ProductPhase::Subscribed,
        }
    }

    /// Returns `true` if a poll would only duplicate what the stream delivers.
    #[must_use]
    pub fn stream_is_authoritative(&self) -> bool {
        self.stream_connected && self.has_initial_snapshot
    }

    /// Returns the fields waiting for the next notification pass.
    pub fn dirty_fields(&self) -> impl Iterator<Item = &FieldPath> {
        self.dirty.iter()
    }

    /// Returns `true` if the next notification pass has work to do.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty() || self.publish_pending
    }

    // ========== Observers ==========

    /// Registers a listener for a field of this product.
    pub fn register_observer<F>(
        &mut self,
        field: FieldPath,
        kind: EntityKind,
        listener: F,
    ) -> ObserverHandle
    where
        F: Fn(&Notification<'_>) + Send + Sync + 'static,
    {
        self.observers.register(field, kind, listener)
    }

    /// Unregisters a listener.
    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    /// Lists registered observers of one kind.
    pub fn entities(&self, kind: EntityKind) -> impl Iterator<Item = EntityRef> + '_ {
        self.observers.entities(&self.identity.id, kind)
    }

    // ========== Writes ==========

    /// Writes a field and reports whether the change is significant.
    ///
    /// Unknown fields and type mismatches are dropped with a debug log.
    pub fn update(&mut self, path: &FieldPath, value: Option<FieldValue>) -> UpdateOutcome {
        match self.try_update(path, value) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::debug!(product_id = %self.identity.id, error = %e, "Dropped field update");
                UpdateOutcome::IGNORED
            }
        }
    }

    /// Writes a field, returning why it was rejected.
    ///
    /// `schedule` and `weekly_schedule` paths take the serialized period
    /// description as text and replace the whole decoded plan.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::UnknownField`] for fields outside the schema,
    /// [`FieldError::TypeMismatch`] when the value's kind differs from the
    /// stored one, and [`FieldError::InvalidValue`] for a non-text plan.
    pub fn try_update(
        &mut self,
        path: &FieldPath,
        value: Option<FieldValue>,
    ) -> Result<UpdateOutcome, FieldError> {
        let section = path.section();
        if section.is_schedule() {
            let plan = match value {
                None => Schedule::Disabled,
                Some(FieldValue::Text(raw)) => self.decode_raw(&raw),
                Some(other) => {
                    return Err(FieldError::InvalidValue {
                        field: path.to_string(),
                        message: format!("expected a period description, got {}", other.kind_name()),
                    });
                }
            };
            self.set_schedule(section, plan);
            return Ok(UpdateOutcome {
                significant: true,
                cost_refresh: false,
            });
        }

        let kind = self.identity.kind;
        let map = match section {
            Section::State => self.state.get_or_insert_with(|| schema::empty_state(kind)),
            Section::Config => self
                .config
                .get_or_insert_with(|| schema::empty_config(kind)),
            _ => return Err(FieldError::UnknownField(path.clone())),
        };
        let slot = map
            .get_mut(path.name())
            .ok_or_else(|| FieldError::UnknownField(path.clone()))?;

        if let (Some(old), Some(new)) = (slot.as_ref(), value.as_ref())
            && !old.same_kind(new)
        {
            return Err(FieldError::TypeMismatch {
                field: path.clone(),
                stored: old.kind_name(),
                received: new.kind_name(),
            });
        }

        let significant = is_significant(slot.as_ref(), value.as_ref(), self.threshold);
        let cost_refresh =
            section == Section::State && path.name() == LIFETIME_ENERGY_FIELD && *slot != value;

        *slot = value;
        if significant {
            self.mark_dirty(path.clone());
        }

        Ok(UpdateOutcome {
            significant,
            cost_refresh,
        })
    }

    /// Parses a stream observation and writes it.
    ///
    /// Every observation counts as a heartbeat, even one that is dropped.
    pub fn update_observation(
        &mut self,
        path: &FieldPath,
        data_type: DataType,
        raw: &str,
        now: DateTime<Utc>,
    ) -> UpdateOutcome {
        self.touch_heartbeat(now);
        match data_type.parse_value(path.name(), raw) {
            Ok(value) => self.update(path, Some(value)),
            Err(e) => {
                tracing::debug!(product_id = %self.identity.id, error = %e, "Unparseable observation");
                UpdateOutcome::IGNORED
            }
        }
    }

    /// Installs schema-shaped maps before the first snapshot arrives.
    ///
    /// Sections that already hold a map are left alone.
    pub fn seed_schema(&mut self, state: FieldMap, config: FieldMap) {
        self.state.get_or_insert(state);
        self.config.get_or_insert(config);
    }

    /// Applies a full poll snapshot.
    ///
    /// The first snapshot extends the schema with every key it carries, so
    /// fields newer than the built-in schema are accepted from then on. The
    /// heartbeat moves to the snapshot's `latestPulse`, or to `now` if absent.
    pub fn apply_snapshot(
        &mut self,
        state: FieldMap,
        config: FieldMap,
        now: DateTime<Utc>,
    ) -> UpdateOutcome {
        if !self.has_initial_snapshot {
            let kind = self.identity.kind;
            extend_keys(
                self.state.get_or_insert_with(|| schema::empty_state(kind)),
                &state,
            );
            extend_keys(
                self.config
                    .get_or_insert_with(|| schema::empty_config(kind)),
                &config,
            );
            self.has_initial_snapshot = true;
            self.publish_pending = true;
        }

        let pulse = state
            .get(PULSE_FIELD)
            .and_then(Option::as_ref)
            .and_then(FieldValue::as_timestamp);

        let mut outcome = UpdateOutcome::IGNORED;
        for (name, value) in state {
            outcome = outcome.merge(self.update(&FieldPath::state(name), value));
        }
        for (name, value) in config {
            outcome = outcome.merge(self.update(&FieldPath::config(name), value));
        }

        self.touch_heartbeat(pulse.unwrap_or(now));
        outcome
    }

    /// Replaces a decoded charge plan and marks its fields dirty.
    pub fn set_schedule(&mut self, section: Section, plan: Schedule) {
        let slot = match section {
            Section::Schedule => &mut self.schedule,
            Section::WeeklySchedule => &mut self.weekly_schedule,
            _ => return,
        };
        *slot = Some(plan);
        self.mark_section_dirty(section);
    }

    /// Decodes a fetched charge plan; `None` means no plan is configured.
    pub fn decode_schedule(&mut self, section: Section, description: Option<&PeriodDescription>) {
        let plan = match description {
            Some(description) => match self.time_zone {
                Some(tz) => schedule::decode(description, &tz),
                None => schedule::decode(description, &Local),
            },
            None => Schedule::Disabled,
        };
        self.set_schedule(section, plan);
    }

    fn decode_raw(&self, raw: &str) -> Schedule {
        match self.time_zone {
            Some(tz) => schedule::decode_raw(raw, &tz),
            None => schedule::decode_raw(raw, &Local),
        }
    }

    /// Replaces a cost record.
    ///
    /// Only the cost fields of `section` are marked dirty, and only if the
    /// record changed. Returns `true` on change.
    pub fn set_cost(&mut self, section: Section, record: CostRecord) -> bool {
        let slot = match section {
            Section::CostDay => &mut self.cost_day,
            Section::CostMonth => &mut self.cost_month,
            Section::CostYear => &mut self.cost_year,
            _ => return false,
        };
        if *slot == record {
            return false;
        }
        *slot = record;
        self.mark_section_dirty(section);
        true
    }

    /// Records a liveness signal. The heartbeat never moves backwards.
    pub fn touch_heartbeat(&mut self, at: DateTime<Utc>) {
        if self.last_heartbeat_at.is_none_or(|prev| at > prev) {
            self.last_heartbeat_at = Some(at);
        }
    }

    /// Flips a product that is reported online to offline.
    ///
    /// Returns `true` if the flag changed.
    pub fn mark_offline(&mut self) -> bool {
        if self.is_online() != Some(true) {
            return false;
        }
        if let Some(slot) = self.state.as_mut().and_then(|s| s.get_mut(ONLINE_FIELD)) {
            *slot = Some(FieldValue::Bool(false));
        }
        self.mark_dirty(FieldPath::state(ONLINE_FIELD));
        true
    }

    /// Records whether the push stream for this product is live.
    pub fn set_stream_connected(&mut self, connected: bool) {
        if self.stream_connected != connected {
            self.stream_connected = connected;
            self.publish_pending = true;
        }
    }

    /// Records whether the product is subscribed to the push stream.
    pub fn set_subscribed(&mut self, subscribed: bool) {
        if self.subscribed != subscribed {
            self.subscribed = subscribed;
            self.publish_pending = true;
        }
    }

    /// Records a denied firmware check.
    ///
    /// Returns `true` the first time only, so the caller logs it once.
    pub fn mark_firmware_auth_failure(&mut self) -> bool {
        !std::mem::replace(&mut self.firmware_auth_failure_seen, true)
    }

    /// Returns `true` once a firmware check has been denied.
    #[must_use]
    pub fn firmware_auth_failure_seen(&self) -> bool {
        self.firmware_auth_failure_seen
    }

    fn mark_dirty(&mut self, path: FieldPath) {
        self.dirty.insert(path);
        self.publish_pending = true;
    }

    fn mark_section_dirty(&mut self, section: Section) {
        let observed: Vec<FieldPath> = self
            .observers
            .fields()
            .filter(|f| f.section() == section)
            .cloned()
            .collect();
        self.dirty.extend(observed);
        self.publish_pending = true;
    }

    // ========== Fan-out ==========

    /// Calls the enabled observers of every dirty field, clears the dirty
    /// set, and publishes a fresh snapshot if anything changed.
    ///
    /// Returns the number of listeners called.
    pub fn notify_observers(&mut self) -> usize {
        let dirty = std::mem::take(&mut self.dirty);
        let this: &Self = self;
        let mut called = 0;
        for field in &dirty {
            called += this.observers.dispatch(&Notification {
                product: this,
                field,
            });
        }
        if std::mem::take(&mut self.publish_pending) {
            self.snapshot_tx.send_replace(self.snapshot());
        }
        called
    }

    /// Returns a receiver of the snapshots published by
    /// [`notify_observers`](Self::notify_observers).
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ProductSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Builds a snapshot of the current state.
    #[must_use]
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            product_id: self.identity.id.clone(),
            phase: self.phase(),
            state: self.state.clone(),
            config: self.config.clone(),
            schedule: self.schedule.clone(),
            weekly_schedule: self.weekly_schedule.clone(),
            cost_day: self.cost_day.clone(),
            cost_month: self.cost_month.clone(),
            cost_year: self.cost_year.clone(),
            last_heartbeat_at: self.last_heartbeat_at,
            stream_connected: self.stream_connected,
        }
    }
}

impl std::fmt::Debug for ProductState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductState")
            .field("id", &self.identity.id)
            .field("kind", &self.identity.kind)
            .field("phase", &self.phase())
            .field("dirty", &self.dirty.len())
            .field("observers", &self.observers)
            .finish_non_exhaustive()
    }
}

fn extend_keys(map: &mut FieldMap, snapshot: &FieldMap) {
    for key in snapshot.keys() {
        map.entry(key.clone()).or_insert(None);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::TimeZone;

    use super::*;
    use crate::schedule::{Period, Recurrence};

    fn charger() -> ProductState {
        ProductState::new(ProductIdentity::charger(
            "EH000001",
            "Garage",
            SiteId::new(10),
            CircuitId::new(20),
        ))
        .with_time_zone(FixedOffset::east_opt(0))
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn counter(product: &mut ProductState, field: FieldPath) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        product.register_observer(field, EntityKind::Sensor, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        count
    }

    #[test]
    fn session_energy_scenario() {
        let mut product = charger();
        let path = FieldPath::state("sessionEnergy");
        let notified = counter(&mut product, path.clone());

        assert!(product.update(&path, Some(10.0.into())).is_significant());
        product.notify_observers();
        assert_eq!(notified.load(Ordering::SeqCst), 1);

        assert!(!product.update(&path, Some(10.2.into())).is_significant());
        assert!(!product.is_dirty());
        product.notify_observers();
        assert_eq!(notified.load(Ordering::SeqCst), 1);

        product.update(&path, Some(10.0.into()));
        assert!(product.update(&path, Some(10.6.into())).is_significant());
        assert!(product.dirty_fields().any(|f| *f == path));
        product.notify_observers();
        assert_eq!(notified.load(Ordering::SeqCst), 2);
        assert_eq!(product.value(&path), Some(FieldValue::Number(10.6)));
    }

    #[test]
    fn slow_drift_is_compared_with_previous_value() {
        let mut product = charger();
        let path = FieldPath::state("sessionEnergy");
        let notified = counter(&mut product, path.clone());

        product.update(&path, Some(10.0.into()));
        product.notify_observers();

        assert!(!product.update(&path, Some(10.4.into())).is_significant());
        product.notify_observers();
        assert!(!product.update(&path, Some(10.8.into())).is_significant());
        assert!(!product.is_dirty());
        product.notify_observers();

        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert_eq!(product.value(&path), Some(FieldValue::Number(10.8)));
    }

    #[test]
    fn insignificant_value_is_still_stored() {
        let mut product = charger();
        let path = FieldPath::state("totalPower");
        product.update(&path, Some(7.0.into()));
        product.update(&path, Some(7.1.into()));
        assert_eq!(product.value(&path), Some(FieldValue::Number(7.1)));
    }

    #[test]
    fn non_numeric_changes_are_significant() {
        let mut product = charger();
        let path = FieldPath::state("cableLocked");
        assert!(product.update(&path, Some(true.into())).is_significant());
        assert!(!product.update(&path, Some(true.into())).is_significant());
        assert!(product.update(&path, Some(false.into())).is_significant());
    }

    #[test]
    fn unknown_field_is_not_stored() {
        let mut product = charger();
        let path = FieldPath::state("fluxCapacitor");
        assert_eq!(
            product.try_update(&path, Some(1.0.into())),
            Err(FieldError::UnknownField(path.clone()))
        );
        assert!(!product.update(&path, Some(1.0.into())).is_significant());
        assert!(!product.state().unwrap().contains_key("fluxCapacitor"));
    }

    #[test]
    fn type_mismatch_keeps_old_value() {
        let mut product = charger();
        let path = FieldPath::state("chargerOpMode");
        product.update(&path, Some(3.0.into()));
        assert!(matches!(
            product.try_update(&path, Some("charging".into())),
            Err(FieldError::TypeMismatch { stored: "number", received: "text", .. })
        ));
        assert_eq!(product.value(&path), Some(FieldValue::Number(3.0)));
    }

    #[test]
    fn lifetime_energy_change_requests_cost_refresh() {
        let mut product = charger();
        let path = FieldPath::state(LIFETIME_ENERGY_FIELD);
        assert!(product.update(&path, Some(1000.0.into())).cost_refresh_requested());
        // Below the significance threshold, but still a change.
        let outcome = product.update(&path, Some(1000.5.into()));
        assert!(!outcome.is_significant());
        assert!(outcome.cost_refresh_requested());
        assert!(!product.update(&path, Some(1000.5.into())).cost_refresh_requested());
    }

    #[test]
    fn first_snapshot_accepts_new_keys_and_uses_pulse() {
        let mut product = charger();
        let mut state = FieldMap::new();
        state.insert("sessionEnergy".into(), Some(4.7.into()));
        state.insert("brandNewField".into(), Some(1.0.into()));
        state.insert(PULSE_FIELD.into(), Some(at(-30).into()));

        let outcome = product.apply_snapshot(state, FieldMap::new(), at(0));
        assert!(outcome.is_significant());
        assert!(product.has_initial_snapshot());
        assert_eq!(product.value(&FieldPath::state("brandNewField")), Some(FieldValue::Number(1.0)));
        // Seeded but never reported.
        assert!(product.state().unwrap().contains_key("voltage"));
        assert_eq!(product.value(&FieldPath::state("voltage")), None);
        assert_eq!(product.last_heartbeat_at(), Some(at(-30)));
        assert_eq!(product.phase(), ProductPhase::Polled);
    }

    #[test]
    fn later_snapshot_drops_unknown_keys() {
        let mut product = charger();
        product.apply_snapshot(FieldMap::new(), FieldMap::new(), at(0));
        let mut state = FieldMap::new();
        state.insert("lateField".into(), Some(1.0.into()));
        product.apply_snapshot(state, FieldMap::new(), at(60));
        assert!(!product.state().unwrap().contains_key("lateField"));
        assert_eq!(product.last_heartbeat_at(), Some(at(60)));
    }

    #[test]
    fn observation_before_poll_is_accepted() {
        let mut product = charger();
        let outcome = product.update_observation(
            &FieldPath::state("totalPower"),
            DataType::Double,
            "3.5",
            at(0),
        );
        assert!(outcome.is_significant());
        assert!(!product.has_initial_snapshot());
        assert_eq!(product.last_heartbeat_at(), Some(at(0)));
    }

    #[test]
    fn schedule_update_decodes_whole_plan() {
        let mut product = charger();
        let enabled = counter(&mut product, "weekly_schedule.MondayStopTime".parse().unwrap());
        let description = PeriodDescription::new(
            1_704_067_200,
            Recurrence::Weekly,
            vec![Period::new(22 * 3600, 32.0), Period::new(30 * 3600, 0.0)],
        );
        let raw = serde_json::to_string(&description).unwrap();

        let path: FieldPath = "weekly_schedule_chargingSchedule".parse().unwrap();
        assert!(product.update(&path, Some(FieldValue::Text(raw))).is_significant());
        product.notify_observers();

        assert_eq!(enabled.load(Ordering::SeqCst), 1);
        assert_eq!(
            product.value(&"weekly_schedule.MondayStopTime".parse().unwrap()),
            Some(FieldValue::from("06:00"))
        );
    }

    #[test]
    fn missing_plan_is_disabled() {
        let mut product = charger();
        product.decode_schedule(Section::Schedule, None);
        assert_eq!(product.schedule(), Some(&Schedule::Disabled));
        assert_eq!(
            product.value(&"schedule.isEnabled".parse().unwrap()),
            Some(FieldValue::Bool(false))
        );
    }

    #[test]
    fn unchanged_cost_is_not_dirty() {
        let mut product = charger();
        let record = CostRecord {
            usage: 12.0,
            cost: 3.0,
            currency_id: "NOK".into(),
        };
        assert!(product.set_cost(Section::CostDay, record.clone()));
        product.notify_observers();
        assert!(!product.set_cost(Section::CostDay, record));
        assert!(!product.is_dirty());
        assert!(!product.set_cost(Section::State, CostRecord::default()));
    }

    #[test]
    fn disabled_observer_is_skipped() {
        let mut product = charger();
        let path = FieldPath::state("smartCharging");
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let handle = product.register_observer(path.clone(), EntityKind::Switch, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        handle.set_enabled(false);

        product.update(&path, Some(true.into()));
        assert_eq!(product.notify_observers(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!product.is_dirty());
    }

    #[test]
    fn seeded_schema_accepts_early_observations() {
        let mut product = charger();
        let mut state = FieldMap::new();
        state.insert("customField".into(), None);
        product.seed_schema(state, FieldMap::new());

        let path = FieldPath::state("customField");
        assert!(product.update(&path, Some(2.0.into())).is_significant());
        assert!(!product.update(&FieldPath::state("sessionEnergy"), Some(1.0.into())).is_significant());
        assert_eq!(product.phase(), ProductPhase::Uninitialized);
    }

    #[test]
    fn firmware_auth_failure_is_sticky() {
        let mut product = charger();
        assert!(product.mark_firmware_auth_failure());
        assert!(!product.mark_firmware_auth_failure());
        assert!(product.firmware_auth_failure_seen());
    }

    #[test]
    fn phase_follows_subscription_and_online_flag() {
        let mut product = charger();
        assert_eq!(product.phase(), ProductPhase::Uninitialized);
        product.apply_snapshot(FieldMap::new(), FieldMap::new(), at(0));
        product.set_subscribed(true);
        assert_eq!(product.phase(), ProductPhase::Subscribed);
        product.update(&FieldPath::state(ONLINE_FIELD), Some(true.into()));
        assert_eq!(product.phase(), ProductPhase::Online);
        assert!(product.mark_offline());
        assert_eq!(product.phase(), ProductPhase::Offline);
    }

    #[tokio::test]
    async fn notify_publishes_snapshot() {
        let mut product = charger();
        let mut rx = product.watch();
        product.update(&FieldPath::state("sessionEnergy"), Some(1.0.into()));
        product.notify_observers();

        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(
            snapshot.state.unwrap().get("sessionEnergy"),
            Some(&Some(FieldValue::Number(1.0)))
        );
    }
}
