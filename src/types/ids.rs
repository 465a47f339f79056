// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Identifier types for products, sites and circuits.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a product (charger serial or equalizer id).
///
/// # Examples
///
/// ```
/// use easee_sync::types::ProductId;
///
/// let id = ProductId::new("EH123456");
/// assert_eq!(id.as_str(), "EH123456");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a product identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProductId({})", self.0)
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Numeric identifier of a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(u64);

impl SiteId {
    /// Creates a site identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric identifier of a circuit inside a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CircuitId(u64);

impl CircuitId {
    /// Creates a circuit identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CircuitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two kinds of product mirrored by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    /// An EV charger, attached to a circuit.
    Charger,
    /// A load-balancing equalizer, attached directly to a site.
    Equalizer,
}

impl ProductKind {
    /// Returns `true` for chargers.
    #[must_use]
    pub fn is_charger(self) -> bool {
        matches!(self, Self::Charger)
    }
}

impl fmt::Display for ProductKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Charger => f.write_str("charger"),
            Self::Equalizer => f.write_str("equalizer"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_id_display_and_debug() {
        let id = ProductId::new("EH000001");
        assert_eq!(id.to_string(), "EH000001");
        assert_eq!(format!("{id:?}"), "ProductId(EH000001)");
    }

    #[test]
    fn product_id_deserializes_from_plain_string() {
        let id: ProductId = serde_json::from_str("\"QP123\"").unwrap();
        assert_eq!(id, ProductId::from("QP123"));
    }

    #[test]
    fn site_id_is_transparent() {
        let id: SiteId = serde_json::from_str("42").unwrap();
        assert_eq!(id.value(), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn product_kind_display() {
        assert_eq!(ProductKind::Charger.to_string(), "charger");
        assert!(!ProductKind::Equalizer.is_charger());
    }
}
