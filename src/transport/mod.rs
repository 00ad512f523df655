//! HTTP boundary for the Explorer API.
//!
//! The polling and listing code only talks to a [`Transport`], which takes the
//! path below the network's base URL as a list of unencoded segments and hands
//! back the raw response body. Non-success statuses and connection failures are
//! already mapped into [`crate::Error`] when a transport returns.
//!
//! # Implementations
//!
//! - [`HttpTransport`] - `reqwest` client with a shared connection pool
//!
//! # Example
//!
//! ```no_run
//! use explorer_client::network;
//! use explorer_client::transport::{HttpTransport, Transport};
//!
//! # async fn run() -> explorer_client::Result<()> {
//! let base = network::resolve("hifisolves")?;
//! let transport = HttpTransport::new(base, Default::default())?;
//! let _body = transport.get(&["api", "collections"]).await?;
//! # Ok(())
//! # }
//! ```

mod http;

pub use http::{HttpTransport, TransportOptions};

use crate::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Request/response transport for the Explorer API
#[async_trait]
pub trait Transport: Send + Sync {
    /// `GET` the endpoint and return the response body.
    async fn get(&self, path: &[&str]) -> Result<String>;

    /// `POST` a JSON body to the endpoint and return the response body.
    async fn post_json(&self, path: &[&str], body: &Value) -> Result<String>;
}
