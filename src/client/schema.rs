// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Known state and config fields per product kind.
//!
//! A product's field maps are seeded from these lists before the first poll
//! so that a stream observation arriving early is not rejected. Keys seen in
//! the first poll snapshot are accepted in addition to these.

use crate::types::{FieldMap, ProductKind};

const CHARGER_STATE: &[&str] = &[
    "cableLocked",
    "cableRating",
    "cellRSSI",
    "chargerFirmware",
    "chargerOpMode",
    "chargerRAT",
    "circuitTotalAllocatedPhaseConductorCurrentL1",
    "circuitTotalAllocatedPhaseConductorCurrentL2",
    "circuitTotalAllocatedPhaseConductorCurrentL3",
    "circuitTotalPhaseConductorCurrentL1",
    "circuitTotalPhaseConductorCurrentL2",
    "circuitTotalPhaseConductorCurrentL3",
    "dynamicChargerCurrent",
    "dynamicCircuitCurrentP1",
    "dynamicCircuitCurrentP2",
    "dynamicCircuitCurrentP3",
    "energyPerHour",
    "inCurrentT2",
    "inCurrentT3",
    "inCurrentT4",
    "inCurrentT5",
    "inVoltageT1T2",
    "inVoltageT1T3",
    "inVoltageT1T4",
    "inVoltageT1T5",
    "inVoltageT2T3",
    "inVoltageT2T4",
    "inVoltageT2T5",
    "inVoltageT3T4",
    "inVoltageT3T5",
    "inVoltageT4T5",
    "isOnline",
    "latestFirmware",
    "latestPulse",
    "ledMode",
    "lifetimeEnergy",
    "localRSSI",
    "lockCablePermanently",
    "offlineMaxCircuitCurrentP1",
    "offlineMaxCircuitCurrentP2",
    "offlineMaxCircuitCurrentP3",
    "outputCurrent",
    "outputPhase",
    "reasonForNoCurrent",
    "sessionEnergy",
    "smartCharging",
    "totalPower",
    "voltage",
    "wiFiAPEnabled",
    "wiFiRSSI",
];

const CHARGER_CONFIG: &[&str] = &[
    "authorizationRequired",
    "circuitMaxCurrentP1",
    "circuitMaxCurrentP2",
    "circuitMaxCurrentP3",
    "enableIdleCurrent",
    "isEnabled",
    "ledStripBrightness",
    "limitToSinglePhaseCharging",
    "localAuthorizationRequired",
    "localNodeType",
    "maxChargerCurrent",
    "phaseMode",
    "smartButtonEnabled",
    "wiFiSSID",
];

const EQUALIZER_STATE: &[&str] = &[
    "activePowerExport",
    "activePowerImport",
    "clockAndDateMeter",
    "cumulativeActivePowerExport",
    "cumulativeActivePowerImport",
    "cumulativeReactivePowerExport",
    "cumulativeReactivePowerImport",
    "currentL1",
    "currentL2",
    "currentL3",
    "isOnline",
    "latestFirmware",
    "latestPulse",
    "maxPowerImport",
    "rcpi",
    "reactivePowerExport",
    "reactivePowerImport",
    "signalRConnected",
    "softwareRelease",
    "voltageL1L2",
    "voltageL1L3",
    "voltageL2L3",
    "voltageNL1",
    "voltageNL2",
    "voltageNL3",
];

const EQUALIZER_CONFIG: &[&str] = &[
    "circuitMaxCurrentP1",
    "circuitMaxCurrentP2",
    "circuitMaxCurrentP3",
    "meterType",
    "meterFuseSize",
    "wiFiSSID",
];

/// Returns the known state field names of a product kind.
#[must_use]
pub fn state_fields(kind: ProductKind) -> &'static [&'static str] {
    match kind {
        ProductKind::Charger => CHARGER_STATE,
        ProductKind::Equalizer => EQUALIZER_STATE,
    }
}

/// Returns the known config field names of a product kind.
#[must_use]
pub fn config_fields(kind: ProductKind) -> &'static [&'static str] {
    match kind {
        ProductKind::Charger => CHARGER_CONFIG,
        ProductKind::Equalizer => EQUALIZER_CONFIG,
    }
}

/// Builds an all-`None` state map for a product kind.
#[must_use]
pub fn empty_state(kind: ProductKind) -> FieldMap {
    seeded(state_fields(kind))
}

/// Builds an all-`None` config map for a product kind.
#[must_use]
pub fn empty_config(kind: ProductKind) -> FieldMap {
    seeded(config_fields(kind))
}

fn seeded(names: &[&str]) -> FieldMap {
    names.iter().map(|name| ((*name).to_string(), None)).collect()
}
