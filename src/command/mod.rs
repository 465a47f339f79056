// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Remote operations on chargers.
//!
//! Operations form a closed set. Names coming from the outside (service
//! calls, switch definitions) are resolved to a [`ProductCommand`] up front,
//! so an unsupported name fails when it is resolved rather than when the
//! operation is invoked.
//!
//! | Kind | Resolved with | Example |
//! |------|---------------|---------|
//! | Action | [`ProductCommand::from_str`](std::str::FromStr) | `"pause"` |
//! | Switch | [`SwitchCommand::resolve`] | `"state.smartCharging"` |
//!
//! [`ProductCommand::request`] maps a command to the endpoint that
//! performs it.

mod action;
mod switch;

pub use action::{CommandRequest, Method, ProductCommand};
pub use switch::SwitchCommand;
