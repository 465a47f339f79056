// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the synchronization engine.
//!
//! The hierarchy separates failures that must reach the host (authentication,
//! connectivity at startup) from failures the engine absorbs on its own
//! (remote hiccups while polling, unknown fields arriving from the stream).

use thiserror::Error;

use crate::types::{FieldPath, ProductId};

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The remote rejected the account credentials.
    ///
    /// This is fatal: the host should prompt for re-authentication instead
    /// of retrying.
    #[error("authentication failed")]
    AuthFailure,

    /// The initial connection could not be established (timeout, server
    /// down, rate limited). The host is expected to retry with its own
    /// backoff.
    #[error("connectivity failure: {0}")]
    Connectivity(String),

    /// Error reported by the remote API.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Error while interpreting a field value.
    #[error("field error: {0}")]
    Field(#[from] FieldError),

    /// The product is not managed by this controller.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// A command name did not resolve to a supported remote operation.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The controller task has already shut down.
    #[error("controller has shut down")]
    ShutDown,
}

/// Errors raised by the remote product API.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed at the transport level.
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be decoded.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Credentials were rejected or the token expired without refresh.
    #[error("authorization failed")]
    AuthFailed,

    /// The account is not allowed to perform this operation.
    #[error("forbidden")]
    Forbidden,

    /// The requested resource does not exist (e.g. no charge plan set).
    #[error("not found")]
    NotFound,

    /// The remote asked us to slow down.
    #[error("too many requests")]
    RateLimited,

    /// The remote returned a server-side failure.
    #[error("server failure (status {0})")]
    ServerFailure(u16),

    /// Request timed out.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// Any other unexpected HTTP status.
    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),

    /// The remote answered with a payload we do not understand.
    #[error("unexpected response format: {0}")]
    UnexpectedFormat(String),

    /// The client was used after being closed.
    #[error("client closed")]
    Closed,
}

impl RemoteError {
    /// Returns `true` for failures that are expected to heal by themselves
    /// on a later attempt.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited | Self::ServerFailure(_) | Self::Timeout(_) => true,
            #[cfg(feature = "http")]
            Self::Http(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if the remote refused access.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthFailed | Self::Forbidden)
    }
}

/// Errors related to field identifiers and raw values.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FieldError {
    /// The field is not part of the product schema.
    #[error("unsupported field: {0}")]
    UnknownField(FieldPath),

    /// A value of a different type than the stored one was offered.
    #[error("type mismatch for {field}: stored {stored}, received {received}")]
    TypeMismatch {
        /// The field that was written.
        field: FieldPath,
        /// Kind of the stored value.
        stored: &'static str,
        /// Kind of the incoming value.
        received: &'static str,
    },

    /// The raw value could not be converted to the announced data type.
    #[error("failed to parse {field}: {message}")]
    InvalidValue {
        /// The field that failed to parse.
        field: String,
        /// Description of the parsing failure.
        message: String,
    },

    /// A field path string is not of the form `section.name`.
    #[error("invalid field path: {0}")]
    InvalidPath(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
