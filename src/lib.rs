// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `easee_sync` - keeps a local mirror of Easee chargers and equalizers.
//!
//! The engine combines periodic polls of the cloud API with the push stream
//! of field observations, filters out insignificant numeric jitter, and
//! notifies registered observers once per refresh pass.
//!
//! # Features
//!
//! - **Product state**: typed state, config, charge plans and cost per product
//! - **Significance filter**: numeric changes under 5 % are stored silently
//! - **Charge plans**: decoding of basic and weekly plans into local times
//! - **Cost batching**: bursts of cost requests collapse into one fetch per site
//! - **Liveness**: products without a heartbeat for 17 minutes go offline
//! - **Commands**: start, stop, pause, resume, settings and cable lock
//!
//! # Quick Start
//!
//! ```no_run
//! use easee_sync::client::{HttpConfig, PollOnly};
//! use easee_sync::controller::{SyncConfig, SyncController};
//! use easee_sync::command::ProductCommand;
//! use easee_sync::subscription::EntityKind;
//! use easee_sync::types::{FieldPath, ProductId};
//!
//! #[tokio::main]
//! async fn main() -> easee_sync::Result<()> {
//!     let api = HttpConfig::new("user@example.com", "secret").into_client()?;
//!     let config = SyncConfig::default().with_monitored_sites(["Home"]);
//!     let mut controller = SyncController::initialize(api, PollOnly, config).await?;
//!
//!     let charger = ProductId::new("EH123456");
//!     controller.register_observer(
//!         &charger,
//!         FieldPath::state("sessionEnergy"),
//!         EntityKind::Sensor,
//!         |n| println!("session energy: {:?}", n.value()),
//!     )?;
//!
//!     let handle = controller.start();
//!     handle.send_command(&charger, ProductCommand::Pause).await?;
//!
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Feature flags
//!
//! - `http` (default): [`client::HttpProductClient`] over `reqwest`
//! - `serde`: `Serialize`/`Deserialize` for configuration and snapshots

pub mod client;
pub mod command;
pub mod controller;
pub mod cost;
pub mod error;
pub mod schedule;
pub mod state;
pub mod subscription;
pub mod types;

pub use client::{PollOnly, ProductApi, ProductStream, StreamEvent};
#[cfg(feature = "http")]
pub use client::{HttpConfig, HttpProductClient};
pub use command::{ProductCommand, SwitchCommand};
pub use controller::{SyncConfig, SyncController, SyncHandle};
pub use error::{Error, FieldError, RemoteError, Result};
pub use schedule::Schedule;
pub use state::{ProductSnapshot, ProductState};
pub use types::{FieldPath, FieldValue, ProductId};
