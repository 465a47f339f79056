// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Remote operations on a charger.

use std::fmt;
use std::str::FromStr;

use serde_json::{Value, json};

use crate::error::Error;
use crate::types::ProductId;

/// A remote operation on a charger.
///
/// # Examples
///
/// ```
/// use easee_sync::command::{Method, ProductCommand};
/// use easee_sync::types::ProductId;
///
/// let cmd: ProductCommand = "pause".parse().unwrap();
/// assert_eq!(cmd, ProductCommand::Pause);
///
/// let request = cmd.request(&ProductId::new("EH123"));
/// assert_eq!(request.method, Method::Post);
/// assert_eq!(request.path, "/api/chargers/EH123/commands/pause_charging");
///
/// assert!("explode".parse::<ProductCommand>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductCommand {
    /// Start charging.
    Start,
    /// Stop charging.
    Stop,
    /// Pause charging.
    Pause,
    /// Resume a paused session.
    Resume,
    /// Toggle between charging and paused.
    Toggle,
    /// Reboot the charger.
    Reboot,
    /// Install the latest firmware.
    UpdateFirmware,
    /// Start charging now, ignoring the active charge plan.
    OverrideSchedule,
    /// Remove the basic charge plan.
    DeleteBasicChargePlan,
    /// Turn smart charging on or off.
    SmartCharging(bool),
    /// Lock or release the cable permanently.
    LockCablePermanently(bool),
    /// Enable or disable the charger.
    EnableCharger(bool),
    /// Allow or forbid idle current.
    EnableIdleCurrent(bool),
}

/// Action names accepted by [`ProductCommand::from_str`].
const ACTIONS: &[(&str, ProductCommand)] = &[
    ("start", ProductCommand::Start),
    ("stop", ProductCommand::Stop),
    ("pause", ProductCommand::Pause),
    ("resume", ProductCommand::Resume),
    ("toggle", ProductCommand::Toggle),
    ("reboot", ProductCommand::Reboot),
    ("update_firmware", ProductCommand::UpdateFirmware),
    ("override_schedule", ProductCommand::OverrideSchedule),
    ("delete_basic_charge_plan", ProductCommand::DeleteBasicChargePlan),
];

/// HTTP method of a command request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `POST`
    Post,
    /// `DELETE`
    Delete,
}

/// Transport-independent description of a command call.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    /// HTTP method.
    pub method: Method,
    /// Path below the API base URL.
    pub path: String,
    /// JSON body, if any.
    pub body: Option<Value>,
}

impl CommandRequest {
    fn post(path: String, body: Option<Value>) -> Self {
        Self {
            method: Method::Post,
            path,
            body,
        }
    }
}

impl ProductCommand {
    /// Returns the names of all argument-less actions.
    pub fn action_names() -> impl Iterator<Item = &'static str> {
        ACTIONS.iter().map(|(name, _)| *name)
    }

    /// Returns the action or switch name of this command.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Toggle => "toggle",
            Self::Reboot => "reboot",
            Self::UpdateFirmware => "update_firmware",
            Self::OverrideSchedule => "override_schedule",
            Self::DeleteBasicChargePlan => "delete_basic_charge_plan",
            Self::SmartCharging(_) => "smart_charging",
            Self::LockCablePermanently(_) => "lock_cable_permanently",
            Self::EnableCharger(_) => "enable_charger",
            Self::EnableIdleCurrent(_) => "enable_idle_current",
        }
    }

    /// Builds the request that performs this command on `product`.
    #[must_use]
    pub fn request(&self, product: &ProductId) -> CommandRequest {
        let charger = format!("/api/chargers/{}", urlencoding::encode(product.as_str()));
        let command = |name: &str| CommandRequest::post(format!("{charger}/commands/{name}"), None);
        let settings = |body: Value| CommandRequest::post(format!("{charger}/settings"), Some(body));

        match *self {
            Self::Start => command("start_charging"),
            Self::Stop => command("stop_charging"),
            Self::Pause => command("pause_charging"),
            Self::Resume => command("resume_charging"),
            Self::Toggle => command("toggle_charging"),
            Self::Reboot => command("reboot"),
            Self::UpdateFirmware => command("update_firmware"),
            Self::OverrideSchedule => command("override_schedule"),
            Self::DeleteBasicChargePlan => CommandRequest {
                method: Method::Delete,
                path: format!("{charger}/basic_charge_plan"),
                body: None,
            },
            Self::SmartCharging(on) => settings(json!({ "smartCharging": on })),
            Self::LockCablePermanently(on) => CommandRequest::post(
                format!("{charger}/commands/lock_state"),
                Some(json!({ "state": on })),
            ),
            Self::EnableCharger(on) => settings(json!({ "enabled": on })),
            Self::EnableIdleCurrent(on) => settings(json!({ "enableIdleCurrent": on })),
        }
    }
}

impl fmt::Display for ProductCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SmartCharging(on)
            | Self::LockCablePermanently(on)
            | Self::EnableCharger(on)
            | Self::EnableIdleCurrent(on) => write!(f, "{}({on})", self.name()),
            _ => f.write_str(self.name()),
        }
    }
}

impl FromStr for ProductCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ACTIONS
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, command)| *command)
            .ok_or_else(|| Error::UnknownCommand(s.to_string()))
    }
}
