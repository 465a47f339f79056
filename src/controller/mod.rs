// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Orchestration of polls, stream events and notifications.
//!
//! [`SyncController`] owns every [`ProductState`](crate::state::ProductState).
//! Once started, a single task consumes one queue of ticks, stream events and
//! results of spawned network calls, so product state is never shared across
//! tasks. The network is only ever awaited inside spawned tasks, which keeps
//! the push path responsive while polls are in flight.
//!
//! Periodic work:
//!
//! | Job | Default period | Skipped while the stream is live |
//! |-----|----------------|----------------------------------|
//! | Charger state/config | 60 s | yes |
//! | Equalizer state | 20 s | yes |
//! | Charge plans | 10 min | no |
//! | Latest firmware | 6 h, and after midnight | no |
//! | Cost | 1 h, and after midnight | no |
//!
//! The offline check runs on every charger and equalizer poll cycle, whether
//! or not the poll itself is skipped.

mod config;
#[allow(clippy::module_inception)]
mod controller;
mod handle;
mod message;
mod runner;
mod scheduler;

pub use config::SyncConfig;
pub use controller::SyncController;
pub use handle::SyncHandle;
pub use crate::state::ProductPhase;
