//! `reqwest`-backed transport.
//!
//! Owns the connection pool and default headers for one network. The bearer
//! token lives behind a lock so it can be swapped while requests are in flight;
//! each request reads it once when it is built.

use super::Transport;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{
    Client, RequestBuilder,
    header::{ACCEPT, HeaderMap, HeaderValue},
};
use serde_json::Value;
use std::sync::RwLock;
use std::time::Duration;
use url::Url;

pub const DEFAULT_USER_AGENT: &str = concat!("explorer-client/", env!("CARGO_PKG_VERSION"));

/// Connection settings for [`HttpTransport`]
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub access_token: Option<String>,
    /// Per-request timeout; `None` leaves requests unbounded.
    pub request_timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            access_token: None,
            request_timeout: Some(Duration::from_secs(60)),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

pub struct HttpTransport {
    client: Client,
    base_url: Url,
    access_token: RwLock<Option<String>>,
}

impl HttpTransport {
    /// Create a transport rooted at `base_url` (see [`crate::network::resolve`]).
    pub fn new(base_url: Url, options: TransportOptions) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(Error::Validation(format!(
                "{base_url} cannot be used as a base URL"
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = Client::builder()
            .user_agent(options.user_agent)
            .default_headers(headers);
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
            access_token: RwLock::new(options.access_token),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn access_token(&self) -> Option<String> {
        self.access_token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_access_token(&self, token: impl Into<String>) {
        *self.access_token.write().unwrap_or_else(|e| e.into_inner()) = Some(token.into());
    }

    pub fn clear_access_token(&self) {
        *self.access_token.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Append percent-encoded `path` segments to the base URL.
    fn endpoint(&self, path: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Validation(format!("{} cannot be used as a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(path);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<String> {
        let request = match self.access_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "request failed");
            return Err(Error::from_status(status.as_u16(), body));
        }

        Ok(body)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &[&str]) -> Result<String> {
        let url = self.endpoint(path)?;
        tracing::debug!(%url, "GET");
        self.send(self.client.get(url)).await
    }

    async fn post_json(&self, path: &[&str], body: &Value) -> Result<String> {
        let url = self.endpoint(path)?;
        tracing::debug!(%url, "POST");
        self.send(self.client.post(url).json(body)).await
    }
}
