// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! REST client for the cloud product API.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::client::{Observation, ProductApi, ProductSnapshotData, Site};
use crate::command::{Method, ProductCommand};
use crate::error::RemoteError;
use crate::schedule::PeriodDescription;
use crate::types::{DataType, FieldPath, ProductCost, ProductId, ProductKind, SiteId};

// ============================================================================
// HttpConfig
// ============================================================================

/// Connection parameters of the cloud API.
///
/// # Examples
///
/// ```
/// use easee_sync::client::HttpConfig;
/// use std::time::Duration;
///
/// let config = HttpConfig::new("user@example.com", "secret")
///     .with_base_url("http://localhost:8080/")
///     .with_timeout(Duration::from_secs(5));
///
/// assert_eq!(config.base_url(), "http://localhost:8080");
/// assert_eq!(config.username(), "user@example.com");
/// ```
#[derive(Clone)]
pub struct HttpConfig {
    base_url: String,
    username: String,
    password: String,
    timeout: Duration,
    refresh_margin: Duration,
}

impl HttpConfig {
    /// Default API base URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.easee.com";
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
    /// Default time before token expiry at which the token is refreshed.
    pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(60);

    /// Creates a configuration for the given account.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            username: username.into(),
            password: password.into(),
            timeout: Self::DEFAULT_TIMEOUT,
            refresh_margin: Self::DEFAULT_REFRESH_MARGIN,
        }
    }

    /// Sets the API base URL. A trailing slash is removed.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets how long before expiry the access token is refreshed.
    #[must_use]
    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the account user name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Creates a client from this configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn into_client(self) -> Result<HttpProductClient, RemoteError> {
        let client = Client::builder().timeout(self.timeout).build()?;
        Ok(HttpProductClient {
            config: self,
            client,
            token: RwLock::new(None),
            closed: AtomicBool::new(false),
        })
    }
}

impl std::fmt::Debug for HttpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// HttpProductClient
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
    refresh_token: String,
}

#[derive(Clone)]
struct Token {
    access: String,
    refresh: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawObservation {
    #[serde(alias = "id")]
    field: String,
    value: String,
    data_type: u8,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FirmwareResponse {
    latest_firmware: u32,
}

/// Client of the cloud REST API.
///
/// Logs in on [`connect`](ProductApi::connect) and refreshes the access
/// token shortly before it expires. Token state lives behind a lock so the
/// client can be shared between tasks.
///
/// # Examples
///
/// ```no_run
/// use easee_sync::client::{HttpConfig, ProductApi};
///
/// # async fn example() -> Result<(), easee_sync::error::RemoteError> {
/// let client = HttpConfig::new("user@example.com", "secret").into_client()?;
/// client.connect().await?;
/// for site in client.account_products().await? {
///     println!("{}: {} products", site.name, site.products().len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct HttpProductClient {
    config: HttpConfig,
    client: Client,
    token: RwLock<Option<Token>>,
    closed: AtomicBool,
}

impl HttpProductClient {
    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Returns `true` while an access token is held.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.token.read().is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    fn product_path(kind: ProductKind, product: &ProductId) -> String {
        let collection = match kind {
            ProductKind::Charger => "chargers",
            ProductKind::Equalizer => "equalizers",
        };
        format!(
            "/api/{collection}/{}",
            urlencoding::encode(product.as_str())
        )
    }

    fn ensure_open(&self) -> Result<(), RemoteError> {
        if self.closed.load(Ordering::Acquire) {
            Err(RemoteError::Closed)
        } else {
            Ok(())
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> RemoteError {
        if e.is_timeout() {
            RemoteError::Timeout(u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX))
        } else {
            RemoteError::Http(e)
        }
    }

    fn store_token(&self, response: TokenResponse) {
        *self.token.write() = Some(Token {
            access: response.access_token,
            refresh: response.refresh_token,
            expires_at: Instant::now() + Duration::from_secs(response.expires_in),
        });
    }

    async fn login(&self) -> Result<(), RemoteError> {
        self.ensure_open()?;
        tracing::debug!(username = %self.config.username, "Logging in");
        let request = self
            .client
            .post(self.url("/api/accounts/login"))
            .json(&json!({
                "userName": self.config.username,
                "password": self.config.password,
            }));
        let response = self.execute(request).await?;
        self.store_token(decode(response).await?);
        Ok(())
    }

    async fn refresh(&self, token: &Token) -> Result<(), RemoteError> {
        tracing::debug!("Refreshing access token");
        let request = self
            .client
            .post(self.url("/api/accounts/refresh_token"))
            .json(&json!({
                "accessToken": token.access,
                "refreshToken": token.refresh,
            }));
        let response = self.execute(request).await?;
        self.store_token(decode(response).await?);
        Ok(())
    }

    async fn access_token(&self) -> Result<String, RemoteError> {
        self.ensure_open()?;
        let current = self.token.read().clone();
        match current {
            None => self.login().await?,
            Some(token) if token.expires_at <= Instant::now() + self.config.refresh_margin => {
                if let Err(e) = self.refresh(&token).await {
                    tracing::debug!(error = %e, "Token refresh failed, logging in again");
                    self.login().await?;
                }
            }
            Some(token) => return Ok(token.access),
        }
        self.token
            .read()
            .as_ref()
            .map(|t| t.access.clone())
            .ok_or(RemoteError::AuthFailed)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        match classify(status) {
            None => Ok(response),
            Some(RemoteError::AuthFailed) => {
                *self.token.write() = None;
                Err(RemoteError::AuthFailed)
            }
            Some(e) => Err(e),
        }
    }

    async fn authorized(&self, method: Method, path: &str) -> Result<RequestBuilder, RemoteError> {
        let token = self.access_token().await?;
        let url = self.url(path);
        tracing::debug!(url = %url, ?method, "Sending API request");
        let builder = match method {
            Method::Post => self.client.post(url),
            Method::Delete => self.client.delete(url),
        };
        Ok(builder.bearer_auth(token))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
        let token = self.access_token().await?;
        let url = self.url(path);
        tracing::debug!(url = %url, "Sending API request");
        let response = self
            .execute(self.client.get(url).bearer_auth(token))
            .await?;
        decode(response).await
    }
}

impl std::fmt::Debug for HttpProductClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProductClient")
            .field("config", &self.config)
            .field("logged_in", &self.is_logged_in())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Maps an HTTP status to the error it stands for; `None` for success.
pub(crate) fn classify(status: StatusCode) -> Option<RemoteError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::UNAUTHORIZED => RemoteError::AuthFailed,
        StatusCode::FORBIDDEN => RemoteError::Forbidden,
        StatusCode::NOT_FOUND => RemoteError::NotFound,
        StatusCode::TOO_MANY_REQUESTS => RemoteError::RateLimited,
        s if s.is_server_error() => RemoteError::ServerFailure(s.as_u16()),
        s => RemoteError::UnexpectedStatus(s.as_u16()),
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

fn format_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl ProductApi for HttpProductClient {
    async fn connect(&self) -> Result<(), RemoteError> {
        self.login().await
    }

    async fn account_products(&self) -> Result<Vec<Site>, RemoteError> {
        self.get_json("/api/accounts/products").await
    }

    async fn poll_product(
        &self,
        product: &ProductId,
        kind: ProductKind,
    ) -> Result<ProductSnapshotData, RemoteError> {
        let base = Self::product_path(kind, product);
        let state: Value = self.get_json(&format!("{base}/state")).await?;
        let config: Value = self.get_json(&format!("{base}/config")).await?;
        ProductSnapshotData::from_json(&state, &config)
    }

    async fn observations(
        &self,
        product: &ProductId,
        fields: &[FieldPath],
    ) -> Result<Vec<Observation>, RemoteError> {
        let ids = fields
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let path = format!(
            "/state/{}/observations?ids={}",
            urlencoding::encode(product.as_str()),
            urlencoding::encode(&ids)
        );
        let raw: Vec<RawObservation> = self.get_json(&path).await?;

        Ok(raw
            .into_iter()
            .filter_map(|o| {
                let field = o.field.parse::<FieldPath>();
                let data_type = DataType::try_from(o.data_type);
                match (field, data_type) {
                    (Ok(field), Ok(data_type)) => Some(Observation {
                        field,
                        value: o.value,
                        data_type,
                    }),
                    (Err(e), _) | (_, Err(e)) => {
                        tracing::debug!(product_id = %product, error = %e, "Skipping observation");
                        None
                    }
                }
            })
            .collect())
    }

    async fn basic_charge_plan(&self, product: &ProductId) -> Result<PeriodDescription, RemoteError> {
        let base = Self::product_path(ProductKind::Charger, product);
        self.get_json(&format!("{base}/basic_charge_plan")).await
    }

    async fn weekly_charge_plan(&self, product: &ProductId) -> Result<PeriodDescription, RemoteError> {
        let base = Self::product_path(ProductKind::Charger, product);
        self.get_json(&format!("{base}/weekly_charge_plan")).await
    }

    async fn cost_between(
        &self,
        site: SiteId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<Vec<ProductCost>>, RemoteError> {
        let path = format!(
            "/api/sites/{site}/cost/{}/{}",
            urlencoding::encode(&format_instant(from)),
            urlencoding::encode(&format_instant(to))
        );
        match self.get_json::<Option<Vec<ProductCost>>>(&path).await {
            Err(RemoteError::NotFound) => Ok(None),
            other => other,
        }
    }

    async fn latest_firmware(&self, product: &ProductId) -> Result<u32, RemoteError> {
        let path = format!("/firmware/{}/latest", urlencoding::encode(product.as_str()));
        let response: FirmwareResponse = self.get_json(&path).await?;
        Ok(response.latest_firmware)
    }

    async fn send_command(
        &self,
        product: &ProductId,
        command: ProductCommand,
    ) -> Result<(), RemoteError> {
        let request = command.request(product);
        tracing::debug!(product_id = %product, %command, "Sending command");
        let mut builder = self.authorized(request.method, &request.path).await?;
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        self.execute(builder).await?;
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        *self.token.write() = None;
        tracing::debug!("HTTP client closed");
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn classify_statuses() {
        assert!(classify(StatusCode::OK).is_none());
        assert!(classify(StatusCode::NO_CONTENT).is_none());
        assert!(matches!(
            classify(StatusCode::UNAUTHORIZED),
            Some(RemoteError::AuthFailed)
        ));
        assert!(matches!(
            classify(StatusCode::FORBIDDEN),
            Some(RemoteError::Forbidden)
        ));
        assert!(matches!(
            classify(StatusCode::NOT_FOUND),
            Some(RemoteError::NotFound)
        ));
        assert!(matches!(
            classify(StatusCode::TOO_MANY_REQUESTS),
            Some(RemoteError::RateLimited)
        ));
        assert!(matches!(
            classify(StatusCode::BAD_GATEWAY),
            Some(RemoteError::ServerFailure(502))
        ));
        assert!(matches!(
            classify(StatusCode::BAD_REQUEST),
            Some(RemoteError::UnexpectedStatus(400))
        ));
    }

    #[test]
    fn config_defaults() {
        let config = HttpConfig::new("user", "pass");
        assert_eq!(config.base_url(), HttpConfig::DEFAULT_BASE_URL);
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn debug_hides_password() {
        let config = HttpConfig::new("user", "hunter2");
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn product_paths() {
        let id = ProductId::new("EH 1");
        assert_eq!(
            HttpProductClient::product_path(ProductKind::Charger, &id),
            "/api/chargers/EH%201"
        );
        assert_eq!(
            HttpProductClient::product_path(ProductKind::Equalizer, &ProductId::new("QP1")),
            "/api/equalizers/QP1"
        );
    }

    #[test]
    fn instants_are_formatted_in_utc() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(format_instant(at), "2024-03-01T00:00:00Z");
    }

    #[tokio::test]
    async fn closed_client_refuses_requests() {
        let client = HttpConfig::new("user", "pass").into_client().unwrap();
        client.close().await;
        assert!(matches!(
            client.account_products().await,
            Err(RemoteError::Closed)
        ));
    }
}
