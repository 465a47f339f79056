// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared across the engine.
//!
//! This module provides identifiers ([`ProductId`], [`SiteId`],
//! [`CircuitId`]), field addressing ([`FieldPath`], [`Section`]), the
//! normalized [`FieldValue`] with the remote's [`DataType`] tags, and cost
//! records.

mod cost;
mod field;
mod ids;
mod value;

pub use cost::{CostRecord, ProductCost};
pub use field::{FieldPath, Section};
pub use ids::{CircuitId, ProductId, ProductKind, SiteId};
pub use value::{DataType, FieldMap, FieldValue};
