// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Controller setup and the entity-facing surface.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::handle::SyncHandle;
use super::runner::{Runner, apply_plan, apply_poll};
use super::SyncConfig;
use crate::client::{PollOnly, ProductApi, ProductStream};
use crate::command::SwitchCommand;
use crate::error::{Error, RemoteError, Result};
use crate::state::{ProductSnapshot, ProductState};
use crate::subscription::{EntityKind, EntityRef, Notification, ObserverHandle, ObserverId};
use crate::types::{FieldPath, ProductId, Section};

/// Mirrors the products of an account and keeps them fresh.
///
/// Lifecycle:
///
/// 1. [`initialize`](Self::initialize) logs in, lists the monitored sites
///    and polls every product once.
/// 2. The entity layer registers its observers.
/// 3. [`start`](Self::start) subscribes to the push stream and hands the
///    products to a background task that polls, listens and notifies.
///
/// # Examples
///
/// ```no_run
/// use easee_sync::client::{HttpConfig, PollOnly};
/// use easee_sync::controller::{SyncConfig, SyncController};
/// use easee_sync::subscription::EntityKind;
/// use easee_sync::types::{FieldPath, ProductId};
///
/// # async fn example() -> easee_sync::Result<()> {
/// let api = HttpConfig::new("user@example.com", "secret").into_client()?;
/// let mut controller = SyncController::initialize(api, PollOnly, SyncConfig::default()).await?;
///
/// let charger = ProductId::new("EH123456");
/// controller.register_observer(
///     &charger,
///     FieldPath::state("sessionEnergy"),
///     EntityKind::Sensor,
///     |n| println!("{}: {:?}", n.field, n.value()),
/// )?;
///
/// let handle = controller.start();
/// // ...
/// handle.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct SyncController<A: ProductApi, S: ProductStream = PollOnly> {
    api: Arc<A>,
    stream: Arc<S>,
    config: SyncConfig,
    products: Vec<ProductState>,
}

impl<A: ProductApi, S: ProductStream> SyncController<A, S> {
    /// Logs in and takes the initial snapshot of every monitored product.
    ///
    /// A product whose first poll fails is kept and retried on the next
    /// poll cycle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthFailure`] if the credentials are rejected and
    /// [`Error::Connectivity`] if the remote cannot be reached within the
    /// connect timeout.
    pub async fn initialize(api: A, stream: S, config: SyncConfig) -> Result<Self> {
        let api = Arc::new(api);

        match tokio::time::timeout(config.connect_timeout, api.connect()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(connect_error(&e)),
            Err(_) => {
                tracing::warn!(timeout_secs = config.connect_timeout.as_secs(), "Connect timed out");
                return Err(Error::Connectivity(format!(
                    "no answer within {} s",
                    config.connect_timeout.as_secs()
                )));
            }
        }

        let sites = api
            .account_products()
            .await
            .map_err(|e| connect_error(&e))?;

        let mut products = Vec::new();
        for site in &sites {
            if !config.monitors_site(&site.name) {
                tracing::debug!(site = %site.id, name = %site.name, "Site not monitored");
                continue;
            }
            for identity in site.products() {
                let kind = identity.kind;
                let mut product = ProductState::new(identity)
                    .with_threshold(config.significance)
                    .with_time_zone(config.time_zone);
                product.seed_schema(api.empty_state(kind), api.empty_config(kind));
                products.push(product);
            }
        }

        let mut controller = Self {
            api,
            stream: Arc::new(stream),
            config,
            products,
        };
        controller.initial_refresh().await;

        tracing::info!(
            sites = sites.len(),
            products = controller.products.len(),
            "Sync controller initialized"
        );
        Ok(controller)
    }

    async fn initial_refresh(&mut self) {
        for product in &mut self.products {
            let result = self.api.poll_product(product.id(), product.kind()).await;
            apply_poll(product, result);

            if product.kind().is_charger() {
                let basic = self.api.basic_charge_plan(product.id()).await;
                apply_plan(product, Section::Schedule, basic);
                let weekly = self.api.weekly_charge_plan(product.id()).await;
                apply_plan(product, Section::WeeklySchedule, weekly);
            }

            // Publishes the first snapshot; no observer is registered yet.
            product.notify_observers();
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the mirrored products.
    #[must_use]
    pub fn products(&self) -> &[ProductState] {
        &self.products
    }

    /// Returns a product by id.
    #[must_use]
    pub fn product(&self, id: &ProductId) -> Option<&ProductState> {
        self.products.iter().find(|p| p.id() == id)
    }

    /// Returns a receiver of the snapshots a product publishes.
    #[must_use]
    pub fn watch(&self, id: &ProductId) -> Option<watch::Receiver<ProductSnapshot>> {
        self.product(id).map(ProductState::watch)
    }

    // ========== Entity layer ==========

    /// Registers a listener called after each pass in which `field` changed
    /// significantly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProductNotFound`] for products outside this
    /// controller.
    pub fn register_observer<F>(
        &mut self,
        product: &ProductId,
        field: FieldPath,
        kind: EntityKind,
        listener: F,
    ) -> Result<ObserverHandle>
    where
        F: Fn(&Notification<'_>) + Send + Sync + 'static,
    {
        let state = self.product_mut(product)?;
        Ok(state.register_observer(field, kind, listener))
    }

    /// Unregisters a listener. Returns `true` if it was registered.
    pub fn remove_observer(&mut self, product: &ProductId, id: ObserverId) -> bool {
        self.product_mut(product)
            .is_ok_and(|state| state.remove_observer(id))
    }

    /// Enables or disables delivery to a registered listener.
    ///
    /// Also effective after [`start`](Self::start), through a clone of the
    /// handle.
    pub fn set_observer_enabled(&self, handle: &ObserverHandle, enabled: bool) {
        handle.set_enabled(enabled);
    }

    /// Lists the sensors registered across all products.
    #[must_use]
    pub fn sensor_entities(&self) -> Vec<EntityRef> {
        self.entities(EntityKind::Sensor)
    }

    /// Lists the binary sensors registered across all products.
    #[must_use]
    pub fn binary_sensor_entities(&self) -> Vec<EntityRef> {
        self.entities(EntityKind::BinarySensor)
    }

    /// Lists the switches registered across all products.
    #[must_use]
    pub fn switch_entities(&self) -> Vec<EntityRef> {
        self.entities(EntityKind::Switch)
    }

    /// Resolves the operation a switch entity performs.
    ///
    /// `entity_key` is the switch name or the field it reflects.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProductNotFound`] if `product` is not a charger of
    /// this controller and [`Error::UnknownCommand`] if no switch matches.
    pub fn command_for(&self, product: &ProductId, entity_key: &str) -> Result<SwitchCommand> {
        match self.product(product) {
            Some(state) if state.kind().is_charger() => SwitchCommand::resolve(entity_key),
            _ => Err(Error::ProductNotFound(product.clone())),
        }
    }

    /// Subscribes to the push stream and runs the controller in the
    /// background.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use = "dropping the handle stops the controller"]
    pub fn start(self) -> SyncHandle {
        let (requests, requests_rx) = mpsc::unbounded_channel();
        let watches: HashMap<_, _> = self
            .products
            .iter()
            .map(|p| (p.id().clone(), p.watch()))
            .collect();
        let runner = Runner::new(self.api, self.stream, self.config, self.products);
        let task = tokio::spawn(runner.run(requests_rx));
        SyncHandle::new(requests, watches, task)
    }

    fn entities(&self, kind: EntityKind) -> Vec<EntityRef> {
        self.products
            .iter()
            .flat_map(|p| p.entities(kind))
            .collect()
    }

    fn product_mut(&mut self, id: &ProductId) -> Result<&mut ProductState> {
        self.products
            .iter_mut()
            .find(|p| p.id() == id)
            .ok_or_else(|| Error::ProductNotFound(id.clone()))
    }
}

impl<A: ProductApi, S: ProductStream> std::fmt::Debug for SyncController<A, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncController")
            .field("config", &self.config)
            .field("products", &self.products.len())
            .finish_non_exhaustive()
    }
}

fn connect_error(e: &RemoteError) -> Error {
    if e.is_auth() {
        tracing::error!(error = %e, "Authentication failed");
        Error::AuthFailure
    } else {
        tracing::warn!(error = %e, "Cannot reach remote");
        Error::Connectivity(e.to_string())
    }
}
