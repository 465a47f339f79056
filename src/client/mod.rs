// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boundary to the remote product service.
//!
//! The engine talks to the remote through two traits:
//!
//! - [`ProductApi`]: request/response reads and commands
//! - [`ProductStream`]: the push channel delivering field observations
//!
//! [`HttpProductClient`] implements [`ProductApi`] over the cloud REST API
//! (feature `http`). [`PollOnly`] is a [`ProductStream`] that never connects,
//! which leaves the engine running on polls alone.

mod account;
#[cfg(feature = "http")]
mod http;
pub mod schema;

use std::future::Future;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc;

pub use account::{ChargerRecord, Circuit, EqualizerRecord, Site};
#[cfg(feature = "http")]
pub use http::{HttpConfig, HttpProductClient};

use crate::command::ProductCommand;
use crate::error::RemoteError;
use crate::schedule::PeriodDescription;
use crate::types::{DataType, FieldMap, FieldPath, FieldValue, ProductCost, ProductId, ProductKind, SiteId};

/// State and config of one product, read in a single call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductSnapshotData {
    /// Telemetry fields.
    pub state: FieldMap,
    /// Configuration fields.
    pub config: FieldMap,
}

impl ProductSnapshotData {
    /// Builds a snapshot from the JSON objects returned by the remote.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::UnexpectedFormat`] if either value is not an
    /// object.
    pub fn from_json(state: &Value, config: &Value) -> Result<Self, RemoteError> {
        Ok(Self {
            state: field_map_from_json(state)?,
            config: field_map_from_json(config)?,
        })
    }
}

/// Converts a flat JSON object into a field map.
///
/// # Errors
///
/// Returns [`RemoteError::UnexpectedFormat`] if `value` is not an object.
pub fn field_map_from_json(value: &Value) -> Result<FieldMap, RemoteError> {
    let object = value
        .as_object()
        .ok_or_else(|| RemoteError::UnexpectedFormat(format!("expected an object, got {value}")))?;
    Ok(object
        .iter()
        .map(|(key, value)| (key.clone(), FieldValue::from_json(value)))
        .collect())
}

/// A single observation read on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Field the observation belongs to.
    pub field: FieldPath,
    /// Raw value as sent by the remote.
    pub value: String,
    /// Announced type of the raw value.
    pub data_type: DataType,
}

/// Event delivered by a [`ProductStream`].
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A field of a product changed on the remote.
    Observation {
        /// The product that changed.
        product_id: ProductId,
        /// Announced type of `value`.
        data_type: DataType,
        /// The changed field.
        field: FieldPath,
        /// Raw value.
        value: String,
    },
    /// The stream connection went up or down.
    Connection {
        /// Whether the stream is now live.
        connected: bool,
    },
}

/// Request/response access to the remote product service.
///
/// Implementations must be cheap to share; the engine holds them in an
/// `Arc` and calls them from spawned tasks.
pub trait ProductApi: Send + Sync + 'static {
    /// Logs in.
    ///
    /// # Errors
    ///
    /// [`RemoteError::AuthFailed`] for rejected credentials; transient
    /// variants for server trouble.
    fn connect(&self) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Lists the sites of the account with their products.
    fn account_products(&self) -> impl Future<Output = Result<Vec<Site>, RemoteError>> + Send;

    /// Returns an all-`None` state map shaped like the product kind's state.
    fn empty_state(&self, kind: ProductKind) -> FieldMap {
        schema::empty_state(kind)
    }

    /// Returns an all-`None` config map shaped like the product kind's config.
    fn empty_config(&self, kind: ProductKind) -> FieldMap {
        schema::empty_config(kind)
    }

    /// Reads state and config of a product.
    fn poll_product(
        &self,
        product: &ProductId,
        kind: ProductKind,
    ) -> impl Future<Output = Result<ProductSnapshotData, RemoteError>> + Send;

    /// Reads the latest observations of selected fields.
    fn observations(
        &self,
        product: &ProductId,
        fields: &[FieldPath],
    ) -> impl Future<Output = Result<Vec<Observation>, RemoteError>> + Send;

    /// Reads the basic charge plan.
    ///
    /// # Errors
    ///
    /// [`RemoteError::NotFound`] when the charger has no plan.
    fn basic_charge_plan(
        &self,
        product: &ProductId,
    ) -> impl Future<Output = Result<PeriodDescription, RemoteError>> + Send;

    /// Reads the weekly charge plan.
    ///
    /// # Errors
    ///
    /// [`RemoteError::NotFound`] when the charger has no plan.
    fn weekly_charge_plan(
        &self,
        product: &ProductId,
    ) -> impl Future<Output = Result<PeriodDescription, RemoteError>> + Send;

    /// Reads the per-product cost of a site between two instants.
    ///
    /// `Ok(None)` means the remote has no report for the window.
    fn cost_between(
        &self,
        site: SiteId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<Vec<ProductCost>>, RemoteError>> + Send;

    /// Reads the latest firmware version available for a product.
    ///
    /// # Errors
    ///
    /// [`RemoteError::AuthFailed`] or [`RemoteError::Forbidden`] when the
    /// account may not query firmware.
    fn latest_firmware(
        &self,
        product: &ProductId,
    ) -> impl Future<Output = Result<u32, RemoteError>> + Send;

    /// Performs a command on a product.
    fn send_command(
        &self,
        product: &ProductId,
        command: ProductCommand,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Releases the client. Later calls fail with [`RemoteError::Closed`].
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// Push channel delivering field observations.
pub trait ProductStream: Send + Sync + 'static {
    /// Starts forwarding observations of `product` to `events`.
    fn subscribe(
        &self,
        product: &ProductId,
        events: mpsc::Sender<StreamEvent>,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Stops forwarding observations of `product`.
    fn unsubscribe(&self, product: &ProductId)
    -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Returns `true` while the underlying connection is live.
    fn is_connected(&self) -> bool;
}

/// A stream that never connects.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollOnly;

impl ProductStream for PollOnly {
    async fn subscribe(
        &self,
        _product: &ProductId,
        _events: mpsc::Sender<StreamEvent>,
    ) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn unsubscribe(&self, _product: &ProductId) -> Result<(), RemoteError> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        false
    }
}
