// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Field values and the data types announced by the remote.
//!
//! Observations arrive as raw strings tagged with a [`DataType`]; poll
//! snapshots arrive as JSON. Both are normalized into [`FieldValue`] so that
//! significance checks compare like with like.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FieldError;

/// Data type tag attached to every observation by the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Opaque binary blob.
    Binary,
    /// `true`/`false` (also `1`/`0`).
    Boolean,
    /// Floating point number.
    Double,
    /// Integer number.
    Integer,
    /// Geographic position.
    Position,
    /// UTF-8 string; RFC 3339 strings are read as timestamps.
    String,
    /// Aggregated statistics blob.
    Statistics,
}

impl DataType {
    /// Parses a raw observation value according to this data type.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::InvalidValue`] if the raw string does not match
    /// the announced type.
    pub fn parse_value(self, field: &str, raw: &str) -> Result<FieldValue, FieldError> {
        let invalid = |message: &str| FieldError::InvalidValue {
            field: field.to_string(),
            message: message.to_string(),
        };

        match self {
            Self::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(FieldValue::Bool(true)),
                "false" | "0" => Ok(FieldValue::Bool(false)),
                _ => Err(invalid("expected a boolean")),
            },
            Self::Double | Self::Integer => raw
                .trim()
                .parse::<f64>()
                .map(FieldValue::Number)
                .map_err(|e| invalid(&e.to_string())),
            Self::String => Ok(FieldValue::from_text(raw)),
            Self::Binary | Self::Position | Self::Statistics => {
                Ok(FieldValue::Text(raw.to_string()))
            }
        }
    }
}

impl TryFrom<u8> for DataType {
    type Error = FieldError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => Self::Binary,
            2 => Self::Boolean,
            3 => Self::Double,
            4 => Self::Integer,
            5 => Self::Position,
            6 => Self::String,
            7 => Self::Statistics,
            other => {
                return Err(FieldError::InvalidValue {
                    field: "dataType".to_string(),
                    message: format!("unknown data type {other}"),
                });
            }
        })
    }
}

/// Field name to last known value of one `state` or `config` section.
///
/// A key mapped to `None` is known to the schema but has no value yet.
pub type FieldMap = BTreeMap<String, Option<FieldValue>>;

/// Last known value of a state or config field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Numeric reading (integers are widened).
    Number(f64),
    /// Boolean flag.
    Bool(bool),
    /// Point in time.
    Timestamp(DateTime<Utc>),
    /// Free-form text.
    Text(String),
}

impl FieldValue {
    /// Builds a value from text, recognizing RFC 3339 timestamps.
    #[must_use]
    pub fn from_text(raw: &str) -> Self {
        match DateTime::parse_from_rfc3339(raw) {
            Ok(dt) => Self::Timestamp(dt.with_timezone(&Utc)),
            Err(_) => Self::Text(raw.to_string()),
        }
    }

    /// Converts a JSON value from a poll snapshot.
    ///
    /// Returns `None` for `null`; arrays and objects are kept as their JSON
    /// text.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;

        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n.as_f64().map(Self::Number),
            Value::String(s) => Some(Self::from_text(s)),
            Value::Array(_) | Value::Object(_) => Some(Self::Text(value.to_string())),
        }
    }

    /// Short name of the variant, used in diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Bool(_) => "bool",
            Self::Timestamp(_) => "timestamp",
            Self::Text(_) => "text",
        }
    }

    /// Returns `true` if both values are the same variant.
    #[must_use]
    pub fn same_kind(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Returns the number, if numeric.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the flag, if boolean.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the timestamp, if any.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Returns the text, if textual.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}
