//! HTTP client and configuration for the Letta API.

use crate::auth::AuthConfig;
use crate::error::{LettaError, LettaResult};
use crate::retry::{retry_with_config, RetryConfig};
use reqwest::header::HeaderMap;
use std::time::Duration;
use url::Url;

/// Configuration for the Letta client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for the Letta API.
    pub base_url: Url,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Request timeout duration.
    pub timeout: Duration,
    /// Additional headers to include with all requests.
    pub headers: HeaderMap,
}

impl ClientConfig {
    /// Create a new client configuration.
    pub fn new(base_url: impl AsRef<str>) -> LettaResult<Self> {
        let base_url = Url::parse(base_url.as_ref())?;
        Ok(Self {
            base_url,
            auth: AuthConfig::default(),
            timeout: Duration::from_secs(30),
            headers: HeaderMap::new(),
        })
    }

    /// Set the authentication configuration.
    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set additional headers to include with all requests.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// Letta API client, used by the Provisioner and Router to list agents and
/// relay messages to them (§4.3).
#[derive(Debug, Clone)]
pub struct LettaClient {
    http: reqwest::Client,
    config: ClientConfig,
    retry_config: RetryConfig,
}

impl LettaClient {
    /// Create a new Letta client.
    pub fn new(config: ClientConfig) -> LettaResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(config.headers.clone())
            .build()?;

        Ok(Self {
            http,
            config,
            retry_config: RetryConfig::default(),
        })
    }

    /// Create a new client for a self-hosted/local Letta server.
    pub fn local() -> LettaResult<Self> {
        ClientBuilder::new().base_url("http://localhost:8283").build()
    }

    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    /// Get the HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Get the authentication configuration.
    pub fn auth(&self) -> &AuthConfig {
        &self.config.auth
    }

    /// Get the agent API.
    pub fn agents(&self) -> crate::api::AgentApi<'_> {
        crate::api::AgentApi::new(self)
    }

    /// Get the message API.
    pub fn messages(&self) -> crate::api::MessageApi<'_> {
        crate::api::MessageApi::new(self)
    }

    /// Get the retry configuration.
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry_config
    }

    /// Set the retry configuration.
    pub fn set_retry_config(&mut self, config: RetryConfig) {
        self.retry_config = config;
    }

    // HTTP helper methods

    /// Make a GET request.
    #[tracing::instrument(skip(self), fields(path = %path))]
    pub async fn get<T>(&self, path: &str) -> LettaResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = self.base_url().join(path.trim_start_matches('/'))?;

        retry_with_config(&self.retry_config, || async {
            let mut headers = HeaderMap::new();
            self.auth().apply_to_headers(&mut headers)?;

            tracing::debug!("Sending GET request to {}", url);
            let response = self.http().get(url.clone()).headers(headers).send().await?;

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let headers = response.headers().clone();
                let body = response.text().await?;
                return Err(LettaError::from_response_with_context(
                    status,
                    body,
                    Some(&headers),
                    Some(url.clone()),
                    Some("GET".to_string()),
                ));
            }

            Ok(response.json().await?)
        })
        .await
    }

    /// Make a GET request with query parameters.
    #[tracing::instrument(skip(self, query), fields(path = %path))]
    pub async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> LettaResult<T>
    where
        T: serde::de::DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        let url = self.base_url().join(path.trim_start_matches('/'))?;

        retry_with_config(&self.retry_config, || async {
            let mut headers = HeaderMap::new();
            self.auth().apply_to_headers(&mut headers)?;

            let response = self
                .http()
                .get(url.clone())
                .headers(headers)
                .query(query)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let headers = response.headers().clone();
                let body = response.text().await?;
                return Err(LettaError::from_response_with_context(
                    status,
                    body,
                    Some(&headers),
                    Some(url.clone()),
                    Some("GET".to_string()),
                ));
            }

            Ok(response.json().await?)
        })
        .await
    }

    /// Make a POST request with a JSON body.
    #[tracing::instrument(skip(self, body), fields(path = %path))]
    pub async fn post<T, B>(&self, path: &str, body: &B) -> LettaResult<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let url = self.base_url().join(path.trim_start_matches('/'))?;
        let body_json = serde_json::to_value(body)?;

        retry_with_config(&self.retry_config, || async {
            let mut headers = HeaderMap::new();
            self.auth().apply_to_headers(&mut headers)?;
            headers.insert(
                "Content-Type",
                "application/json"
                    .parse()
                    .map_err(|_| LettaError::config("Failed to parse Content-Type header"))?,
            );

            let response = self
                .http()
                .post(url.clone())
                .headers(headers)
                .json(&body_json)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let headers = response.headers().clone();
                let body = response.text().await?;
                return Err(LettaError::from_response_with_context(
                    status,
                    body,
                    Some(&headers),
                    Some(url.clone()),
                    Some("POST".to_string()),
                ));
            }

            Ok(response.json().await?)
        })
        .await
    }
}

/// Builder for creating a Letta client.
#[derive(Debug, Default)]
pub struct ClientBuilder {
    base_url: Option<String>,
    auth: Option<AuthConfig>,
    timeout: Option<Duration>,
    headers: Option<HeaderMap>,
}

impl ClientBuilder {
    /// Create a new client builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the authentication.
    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Set the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set any custom headers.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Build the client.
    pub fn build(self) -> LettaResult<LettaClient> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| "http://localhost:8283".to_string());

        let mut config = ClientConfig::new(base_url)?;

        if let Some(auth) = self.auth {
            config = config.auth(auth);
        }

        if let Some(timeout) = self.timeout {
            config = config.timeout(timeout);
        }

        if let Some(headers) = self.headers {
            config = config.headers(headers);
        }

        LettaClient::new(config)
    }
}
