// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-field observer registration and dispatch.
//!
//! - [`ObserverId`] - Unique identifier of a registered observer
//! - [`ObserverHandle`] - Returned to the entity layer to toggle delivery
//! - [`ObserverSet`] - Field → ordered observers, owned by a product

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::state::ProductState;
use crate::types::{FieldPath, FieldValue, ProductId};

static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    fn next() -> Self {
        Self(NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Obs({})", self.0)
    }
}

/// Kind of entity an observer backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Read-only value.
    Sensor,
    /// Read-only on/off value.
    BinarySensor,
    /// On/off value that can also be commanded.
    Switch,
}

/// What an observer is told about after a refresh pass.
pub struct Notification<'a> {
    /// The product that changed.
    pub product: &'a ProductState,
    /// The field the observer is registered for.
    pub field: &'a FieldPath,
}

impl Notification<'_> {
    /// Returns the product id.
    #[must_use]
    pub fn product_id(&self) -> &ProductId {
        self.product.id()
    }

    /// Returns the current value of the observed field.
    #[must_use]
    pub fn value(&self) -> Option<FieldValue> {
        self.product.value(self.field)
    }
}

/// Type alias for observer callbacks.
pub type Listener = Arc<dyn Fn(&Notification<'_>) + Send + Sync>;

/// Handle kept by the entity layer for a registered observer.
///
/// Disabling an observer stops delivery without unregistering it.
#[derive(Debug, Clone)]
pub struct ObserverHandle {
    id: ObserverId,
    enabled: Arc<AtomicBool>,
}

impl ObserverHandle {
    /// Returns the observer id.
    #[must_use]
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Returns `true` if the observer receives notifications.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Enables or disables delivery.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }
}

struct Observer {
    id: ObserverId,
    kind: EntityKind,
    enabled: Arc<AtomicBool>,
    listener: Listener,
}

/// Read-only description of a registered observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    /// The observer id.
    pub id: ObserverId,
    /// The product the observer belongs to.
    pub product_id: ProductId,
    /// The observed field.
    pub field: FieldPath,
    /// Entity kind.
    pub kind: EntityKind,
}

/// Observers of one product, keyed by field, in registration order.
#[derive(Default)]
pub struct ObserverSet {
    by_field: BTreeMap<FieldPath, Vec<Observer>>,
}

impl ObserverSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for a field.
    pub fn register<F>(&mut self, field: FieldPath, kind: EntityKind, listener: F) -> ObserverHandle
    where
        F: Fn(&Notification<'_>) + Send + Sync + 'static,
    {
        let id = ObserverId::next();
        let enabled = Arc::new(AtomicBool::new(true));
        self.by_field.entry(field).or_default().push(Observer {
            id,
            kind,
            enabled: Arc::clone(&enabled),
            listener: Arc::new(listener),
        });
        ObserverHandle { id, enabled }
    }

    /// Unregisters an observer.
    ///
    /// Returns `true` if it was found and removed.
    pub fn remove(&mut self, id: ObserverId) -> bool {
        let mut removed = false;
        self.by_field.retain(|_, observers| {
            let before = observers.len();
            observers.retain(|o| o.id != id);
            removed |= observers.len() != before;
            !observers.is_empty()
        });
        removed
    }

    /// Returns `true` if any observer is registered for the field.
    #[must_use]
    pub fn has_observers(&self, field: &FieldPath) -> bool {
        self.by_field.contains_key(field)
    }

    /// Returns the fields that have at least one observer.
    pub fn fields(&self) -> impl Iterator<Item = &FieldPath> {
        self.by_field.keys()
    }

    /// Returns the number of registered observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_field.values().map(Vec::len).sum()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_field.is_empty()
    }

    /// Lists registered observers of one kind.
    pub fn entities<'a>(
        &'a self,
        product_id: &'a ProductId,
        kind: EntityKind,
    ) -> impl Iterator<Item = EntityRef> + 'a {
        self.by_field.iter().flat_map(move |(field, observers)| {
            observers
                .iter()
                .filter(move |o| o.kind == kind)
                .map(move |o| EntityRef {
                    id: o.id,
                    product_id: product_id.clone(),
                    field: field.clone(),
                    kind: o.kind,
                })
        })
    }

    /// Calls every enabled observer of `field`.
    ///
    /// Returns the number of listeners called.
    pub fn dispatch(&self, notification: &Notification<'_>) -> usize {
        let Some(observers) = self.by_field.get(notification.field) else {
            return 0;
        };
        let mut called = 0;
        for observer in observers {
            if observer.enabled.load(Ordering::Relaxed) {
                (observer.listener)(notification);
                called += 1;
            }
        }
        called
    }
}

impl fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverSet")
            .field("fields", &self.by_field.len())
            .field("observers", &self.len())
            .finish()
    }
}
