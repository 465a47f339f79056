// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! On/off operations backing switch entities.

use crate::error::Error;
use crate::types::{FieldPath, Section};

use super::ProductCommand;

/// Switch name, backing field, and command constructor.
const SWITCHES: &[(&str, Section, &str, fn(bool) -> ProductCommand)] = &[
    (
        "smart_charging",
        Section::State,
        "smartCharging",
        ProductCommand::SmartCharging,
    ),
    (
        "lock_cable_permanently",
        Section::State,
        "lockCablePermanently",
        ProductCommand::LockCablePermanently,
    ),
    (
        "enable_charger",
        Section::Config,
        "isEnabled",
        ProductCommand::EnableCharger,
    ),
    (
        "enable_idle_current",
        Section::Config,
        "enableIdleCurrent",
        ProductCommand::EnableIdleCurrent,
    ),
];

/// A resolved switch operation.
///
/// Resolved once when the switch entity is built, so an unsupported
/// operation fails at construction instead of when the user flips it.
///
/// # Examples
///
/// ```
/// use easee_sync::command::{ProductCommand, SwitchCommand};
///
/// let switch = SwitchCommand::resolve("state.smartCharging").unwrap();
/// assert_eq!(switch.turn(true), ProductCommand::SmartCharging(true));
/// assert_eq!(switch.name(), "smart_charging");
///
/// assert!(SwitchCommand::resolve("state.totalPower").is_err());
/// ```
#[derive(Clone, Copy)]
pub struct SwitchCommand {
    name: &'static str,
    section: Section,
    field: &'static str,
    build: fn(bool) -> ProductCommand,
}

impl SwitchCommand {
    /// Resolves a switch by entity key (`state.smartCharging`) or by
    /// operation name (`smart_charging`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCommand`] if nothing matches.
    pub fn resolve(key: &str) -> Result<Self, Error> {
        let path = key.parse::<FieldPath>().ok();
        Self::all()
            .find(|switch| {
                switch.name == key
                    || path
                        .as_ref()
                        .is_some_and(|p| p.section() == switch.section && p.name() == switch.field)
            })
            .ok_or_else(|| Error::UnknownCommand(key.to_string()))
    }

    /// Returns every supported switch.
    pub fn all() -> impl Iterator<Item = Self> {
        SWITCHES
            .iter()
            .map(|&(name, section, field, build)| Self {
                name,
                section,
                field,
                build,
            })
    }

    /// Returns the operation name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the field reflecting the switch position.
    #[must_use]
    pub fn field(&self) -> FieldPath {
        FieldPath::new(self.section, self.field)
    }

    /// Builds the command that moves the switch to `on`.
    #[must_use]
    pub fn turn(&self, on: bool) -> ProductCommand {
        (self.build)(on)
    }
}

impl std::fmt::Debug for SwitchCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwitchCommand")
            .field("name", &self.name)
            .field("field", &self.field())
            .finish_non_exhaustive()
    }
}
