// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Account product tree: sites, circuits, chargers, equalizers.

use serde::{Deserialize, Serialize};

use crate::state::ProductIdentity;
use crate::types::{CircuitId, ProductId, SiteId};

/// A site with its circuits and equalizers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    /// Site id.
    pub id: SiteId,
    /// Site name, used to select monitored sites.
    pub name: String,
    /// Short public key of the site.
    #[serde(default)]
    pub site_key: Option<String>,
    /// Circuits of the site.
    #[serde(default)]
    pub circuits: Vec<Circuit>,
    /// Equalizers installed at the site.
    #[serde(default)]
    pub equalizers: Vec<EqualizerRecord>,
}

impl Site {
    /// Lists every product of the site, equalizers first.
    #[must_use]
    pub fn products(&self) -> Vec<ProductIdentity> {
        let equalizers = self
            .equalizers
            .iter()
            .map(|eq| ProductIdentity::equalizer(eq.id.clone(), eq.name.clone(), self.id));
        let chargers = self.circuits.iter().flat_map(|circuit| {
            circuit.chargers.iter().map(|charger| {
                ProductIdentity::charger(charger.id.clone(), charger.name.clone(), self.id, circuit.id)
                    .with_master(charger.is_master)
            })
        });
        equalizers.chain(chargers).collect()
    }
}

/// An electrical circuit with its chargers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Circuit {
    /// Circuit id.
    pub id: CircuitId,
    /// Label of the circuit in the fuse panel.
    #[serde(default)]
    pub panel_name: String,
    /// Chargers on the circuit.
    #[serde(default)]
    pub chargers: Vec<ChargerRecord>,
}

/// A charger as listed in the account tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargerRecord {
    /// Charger id (serial number).
    pub id: ProductId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Whether this charger is the circuit master.
    #[serde(default)]
    pub is_master: bool,
}

/// An equalizer as listed in the account tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EqualizerRecord {
    /// Equalizer id (serial number).
    pub id: ProductId,
    /// Display name.
    #[serde(default)]
    pub name: String,
}
