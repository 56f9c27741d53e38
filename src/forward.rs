//! Proxy relay.
//!
//! Forwards a captured URL to a user-run local proxy server, which answers
//! with a URL that plays the stream through the proxy.
//!
//! # Wire Format
//!
//! ```text
//! POST http://localhost:3500/api/proxy-url
//! {"url": "https://cdn.example.com/master.m3u8"}
//!
//! 200 OK
//! {"proxyUrl": "http://localhost:3500/stream/abc", ...}
//! ```
//!
//! # Errors
//!
//! | Condition | Error |
//! |-----------|-------|
//! | Nothing listening | [`Error::ProxyUnreachable`] |
//! | Non-2xx status | [`Error::ProxyStatus`] with status and body |
//! | 2xx without `proxyUrl` | [`Error::Protocol`] |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default proxy server endpoint.
pub const DEFAULT_PROXY_ENDPOINT: &str = "http://localhost:3500/api/proxy-url";

// ============================================================================
// ProxyResult
// ============================================================================

/// Successful proxy server answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyResult {
    /// URL that plays the stream through the proxy.
    #[serde(rename = "proxyUrl")]
    pub proxy_url: String,

    /// Any other fields the server returned.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// ProxyForwarder
// ============================================================================

/// HTTP client for the proxy server endpoint.
#[derive(Debug, Clone)]
pub struct ProxyForwarder {
    client: reqwest::Client,
    endpoint: Url,
}

impl ProxyForwarder {
    /// Creates a forwarder posting to `endpoint`.
    #[must_use]
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }

    /// Returns the endpoint URL.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Returns the endpoint's scheme, host and port.
    #[must_use]
    pub fn origin(&self) -> String {
        self.endpoint.origin().ascii_serialization()
    }

    /// Sends `url` to the proxy server.
    ///
    /// Runs to completion; there is no timeout or retry.
    ///
    /// # Errors
    ///
    /// - [`Error::ProxyUnreachable`] if the connection is refused
    /// - [`Error::ProxyStatus`] on a non-2xx answer
    /// - [`Error::Protocol`] if a 2xx body lacks `proxyUrl`
    /// - [`Error::Http`] for other transport failures
    pub async fn forward(&self, url: &str) -> Result<ProxyResult> {
        info!(url, endpoint = %self.endpoint, "Sending URL to proxy server");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({ "url": url }))
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    Error::proxy_unreachable(self.origin())
                } else {
                    Error::Http(e)
                }
            })?;

        let status = response.status();
        debug!(status = status.as_u16(), "Proxy server responded");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Proxy server error response");
            return Err(Error::proxy_status(status.as_u16(), body));
        }

        let text = response.text().await?;
        let result: ProxyResult = serde_json::from_str(&text)
            .map_err(|e| Error::protocol(format!("invalid proxy server response: {e}")))?;

        info!(proxy_url = %result.proxy_url, "Proxy URL generated");
        Ok(result)
    }
}

// ============================================================================
// Tests
// ============================================================================
