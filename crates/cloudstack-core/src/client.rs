//! The API call seam and its HTTP implementation.
//!
//! Resource clients never talk HTTP themselves. They build an [`ApiRequest`] and hand it to an
//! [`ApiCaller`], which returns the decoded JSON body. [`ApiClient`] is the reqwest-backed
//! implementation; tests substitute their own.

use crate::config::CloudStackConfig;
use crate::error::{ApiErrorPayload, Error, Result};
use crate::query::{ApiCommand, ApiRequest};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

const USER_AGENT: &str = concat!("cloudstack-core/", env!("CARGO_PKG_VERSION"));

/// Longest request timeout accepted, matching `CloudStackConfig::request_timeout_secs`.
const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Issues a single CloudStack command.
#[async_trait]
pub trait ApiCaller: Send + Sync {
    /// Send `request` and return the response body.
    ///
    /// Implementations return the whole JSON document, still wrapped in its
    /// `<command>response` envelope.
    async fn call(&self, request: &ApiRequest) -> Result<serde_json::Value>;
}

#[async_trait]
impl<T> ApiCaller for Arc<T>
where
    T: ApiCaller + ?Sized,
{
    async fn call(&self, request: &ApiRequest) -> Result<serde_json::Value> {
        (**self).call(request).await
    }
}

/// Issue `command` through `caller` and decode the response into the command's envelope.
///
/// # Errors
///
/// Returns the caller's error unchanged, or [`Error::ParseError`] if the body does not match
/// the envelope.
pub async fn execute<A, C>(caller: &A, command: &C) -> Result<C::Response>
where
    A: ApiCaller + ?Sized,
    C: ApiCommand + Sync,
{
    let request = command.to_request();
    let body = caller.call(&request).await?;

    debug!(
        command = C::NAME,
        envelope = %request.envelope_key(),
        "Decoding CloudStack response envelope"
    );
    serde_json::from_value(body).map_err(|err| {
        Error::ParseError(format!("Failed to decode `{}` response: {err}", C::NAME))
    })
}

/// Builder for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ApiClientBuilder {
    config: CloudStackConfig,
    timeout: Option<Duration>,
    user_agent: String,
}

impl ApiClientBuilder {
    /// Create a builder for the specified API endpoint with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(api_url: impl Into<String>) -> Result<Self> {
        Ok(Self::from_config(CloudStackConfig::new(api_url)?))
    }

    /// Create a builder from an existing configuration.
    #[must_use]
    pub fn from_config(config: CloudStackConfig) -> Self {
        Self {
            config,
            timeout: None,
            user_agent: USER_AGENT.to_string(),
        }
    }

    /// Override the request timeout.
    ///
    /// Sub-second precision is kept. The value must be non-zero and at most 300 seconds;
    /// [`build`](Self::build) rejects anything else.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The request timeout the built client will use.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or_else(|| self.config.timeout())
    }

    /// Override the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot be parsed, the timeout override is out of range,
    /// the CA certificate cannot be loaded, or the HTTP client cannot be constructed.
    pub fn build(self) -> Result<ApiClient> {
        let base_url = self.config.parse_api_url()?;

        let timeout = self.timeout();
        if timeout.is_zero() || timeout > MAX_REQUEST_TIMEOUT {
            return Err(Error::ValidationError(format!(
                "request timeout must be non-zero and at most {}s, got {timeout:?}",
                MAX_REQUEST_TIMEOUT.as_secs()
            )));
        }

        let mut builder = ClientBuilder::new()
            .user_agent(&self.user_agent)
            .timeout(timeout)
            .connect_timeout(self.config.connect_timeout())
            .pool_idle_timeout(self.config.pool_idle_timeout())
            .pool_max_idle_per_host(self.config.pool_max_idle_per_host);

        if !self.config.tls_verify {
            warn!("TLS verification disabled for CloudStack client");
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(ca_cert) = &self.config.tls_ca_cert {
            debug!("loading CloudStack CA certificate from {}", ca_cert.display());
            let bytes = std::fs::read(ca_cert).map_err(|err| {
                Error::ConfigError(format!(
                    "Failed to read CA certificate {}: {err}",
                    ca_cert.display()
                ))
            })?;
            let cert = reqwest::Certificate::from_pem(&bytes)
                .map_err(|err| Error::ConfigError(format!("Invalid CA certificate: {err}")))?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder
            .build()
            .map_err(|err| Error::ConfigError(format!("Failed to build HTTP client: {err}")))?;

        Ok(ApiClient {
            http,
            base_url: Arc::new(base_url),
        })
    }
}

/// HTTP implementation of [`ApiCaller`].
///
/// Commands are sent as `GET` requests with `command`, `response=json` and the command
/// parameters in the query string. Requests are not signed.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Arc<Url>,
}

impl ApiClient {
    /// Construct a client directly from the API endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(api_url: impl Into<String>) -> Result<Self> {
        ApiClientBuilder::new(api_url)?.build()
    }

    /// Construct a client from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &CloudStackConfig) -> Result<Self> {
        ApiClientBuilder::from_config(config.clone()).build()
    }

    /// Start a builder for the specified API endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn builder(api_url: impl Into<String>) -> Result<ApiClientBuilder> {
        ApiClientBuilder::new(api_url)
    }

    /// Return the API endpoint URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn send(&self, request: &ApiRequest) -> Result<serde_json::Value> {
        let command = request.command();
        let mut query: Vec<(&str, &str)> = vec![("command", command), ("response", "json")];
        query.extend(request.params().iter());

        info!(command, "Sending CloudStack command");
        debug!(command, params = ?request.params(), "CloudStack command parameters");

        let response = self
            .http
            .get(self.base_url.as_str())
            .query(&query)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&text).map_err(|err| {
                Error::ParseError(format!("Failed to parse response for `{command}`: {err}"))
            });
        }

        Err(map_failure(status, &text))
    }
}

#[async_trait]
impl ApiCaller for ApiClient {
    async fn call(&self, request: &ApiRequest) -> Result<serde_json::Value> {
        let result = self.send(request).await;

        if let Err(err) = &result {
            if err.should_log() {
                error!(command = request.command(), code = err.error_code(), "{err}");
            } else {
                debug!(command = request.command(), code = err.error_code(), "{err}");
            }
        }

        result
    }
}

fn map_failure(status: StatusCode, text: &str) -> Error {
    if let Some(payload) = serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .as_ref()
        .and_then(ApiErrorPayload::from_body)
    {
        return payload.into();
    }

    match status {
        StatusCode::NOT_FOUND => Error::NotFound(text.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::InvalidRequest(format!("CloudStack authentication failed: {text}"))
        }
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => {
            Error::ServiceUnavailable(format!("CloudStack temporarily unavailable: {text}"))
        }
        status if status.is_server_error() => {
            Error::ServiceUnavailable(format!("CloudStack server error {status}: {text}"))
        }
        _ => Error::HttpError(format!("CloudStack error {status}: {text}")),
    }
}
