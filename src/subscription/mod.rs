// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Observer registration for the entity layer.
//!
//! Entities register one listener per field at construction time. After each
//! refresh pass the controller calls the enabled listeners of every field that
//! changed significantly, then clears the dirty flags.
//!
//! ```
//! use easee_sync::subscription::{EntityKind, Notification, ObserverSet};
//! use easee_sync::types::FieldPath;
//!
//! let mut observers = ObserverSet::new();
//! let handle = observers.register(
//!     FieldPath::state("sessionEnergy"),
//!     EntityKind::Sensor,
//!     |n: &Notification<'_>| println!("{} -> {:?}", n.field, n.value()),
//! );
//!
//! // The entity was disabled by the user.
//! handle.set_enabled(false);
//! ```

mod observer;

pub use observer::{
    EntityKind, EntityRef, Listener, Notification, ObserverHandle, ObserverId, ObserverSet,
};
