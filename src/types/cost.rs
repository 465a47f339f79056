// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Energy cost records.

use serde::{Deserialize, Serialize};

use super::{FieldValue, ProductId};

/// Energy usage and its cost over a time window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostRecord {
    /// Energy used in kWh.
    pub usage: f64,
    /// Cost of that energy.
    pub cost: f64,
    /// ISO currency code, empty until the first cost fetch.
    pub currency_id: String,
}

impl CostRecord {
    /// Names of the fields exposed under each `cost_*` section.
    pub const FIELDS: [&'static str; 3] = ["usage", "cost", "currencyId"];

    /// Returns the value of a named field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "usage" | "totalEnergyUsage" => Some(FieldValue::Number(self.usage)),
            "cost" | "totalCost" => Some(FieldValue::Number(self.cost)),
            "currencyId" => Some(FieldValue::Text(self.currency_id.clone())),
            _ => None,
        }
    }
}

/// One row of a site cost report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCost {
    /// The product the row belongs to.
    #[serde(alias = "chargerId")]
    pub product_id: ProductId,
    /// Energy used in kWh.
    #[serde(alias = "totalEnergyUsage")]
    pub usage: f64,
    /// Cost of that energy.
    #[serde(alias = "totalCost")]
    pub cost: f64,
    /// ISO currency code.
    #[serde(default)]
    pub currency_id: String,
}

impl From<&ProductCost> for CostRecord {
    fn from(row: &ProductCost) -> Self {
        Self {
            usage: row.usage,
            cost: row.cost,
            currency_id: row.currency_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_zero() {
        let record = CostRecord::default();
        assert!(record.usage.abs() < f64::EPSILON);
        assert!(record.cost.abs() < f64::EPSILON);
        assert!(record.currency_id.is_empty());
    }

    #[test]
    fn field_lookup() {
        let record = CostRecord {
            usage: 12.5,
            cost: 30.0,
            currency_id: "NOK".to_string(),
        };
        assert_eq!(record.field("usage"), Some(FieldValue::Number(12.5)));
        assert_eq!(record.field("currencyId"), Some(FieldValue::from("NOK")));
        assert_eq!(record.field("vat"), None);
    }

    #[test]
    fn product_cost_accepts_remote_names() {
        let json = r#"{"chargerId":"EH1","totalEnergyUsage":4.2,"totalCost":9.1,"currencyId":"EUR"}"#;
        let row: ProductCost = serde_json::from_str(json).unwrap();
        assert_eq!(row.product_id, ProductId::new("EH1"));
        assert_eq!(CostRecord::from(&row).currency_id, "EUR");
    }
}
