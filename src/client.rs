//! Display-surface client.
//!
//! Connects to a running host and issues user actions the way the popup
//! does.
//!
//! # Example
//!
//! ```no_run
//! use stream_capturer::SurfaceClient;
//!
//! # async fn example() -> stream_capturer::Result<()> {
//! let mut client = SurfaceClient::connect("ws://127.0.0.1:9300").await?;
//! client.toggle_capture(true).await?;
//! for stream in client.streams().await? {
//!     println!("{} {}", stream.stream_type, stream.url);
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, from_str, from_value, to_string};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use crate::capture::StreamRecord;
use crate::error::{Error, Result};
use crate::forward::ProxyResult;
use crate::identifiers::RequestId;
use crate::protocol::{HostRequest, HostResponse, Message, REPLY_TYPE, Reply};

// ============================================================================
// Constants
// ============================================================================

/// Default time to wait for a reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// HostState
// ============================================================================

/// Capture flag and badge as reported by `getState`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostState {
    /// Persisted capture flag.
    pub is_capturing: bool,
    /// Current badge text.
    pub badge: String,
}

// ============================================================================
// SurfaceClient
// ============================================================================

/// WebSocket client speaking the display-surface protocol.
pub struct SurfaceClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    reply_timeout: Duration,
}

impl SurfaceClient {
    /// Connects to a host.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the host cannot be reached.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let (ws, _) = connect_async(ws_url)
            .await
            .map_err(|e| Error::connection(format!("Failed to connect to {ws_url}: {e}")))?;

        debug!(ws_url, "Connected to host");

        Ok(Self {
            ws,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        })
    }

    /// Sets the reply timeout.
    #[inline]
    #[must_use]
    pub fn with_reply_timeout(mut self, reply_timeout: Duration) -> Self {
        self.reply_timeout = reply_timeout;
        self
    }

    /// Sends a request and waits for its reply.
    ///
    /// Frames that are not the matching reply are skipped.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the host hangs up first
    /// - [`Error::RequestTimeout`] if no reply arrives in time
    pub async fn request(&mut self, request: HostRequest) -> Result<HostResponse> {
        let message = Message::new(request);
        let id = message.id;

        self.ws
            .send(WsMessage::Text(to_string(&message)?.into()))
            .await?;
        trace!(%id, action = message.request.action(), "Message sent");

        match timeout(self.reply_timeout, self.read_reply(id)).await {
            Ok(result) => result,
            Err(_) => Err(Error::request_timeout(
                id,
                self.reply_timeout.as_millis() as u64,
            )),
        }
    }

    async fn read_reply(&mut self, id: RequestId) -> Result<HostResponse> {
        while let Some(frame) = self.ws.next().await {
            let WsMessage::Text(text) = frame? else {
                continue;
            };

            let value: Value = from_str(&text)?;
            if value.get("type").and_then(Value::as_str) != Some(REPLY_TYPE) {
                continue;
            }

            let reply: Reply = from_value(value)?;
            if reply.id == id {
                return Ok(reply.response);
            }
        }

        Err(Error::ConnectionClosed)
    }

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns WebSocket errors from the close handshake.
    pub async fn close(mut self) -> Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}

// ============================================================================
// SurfaceClient - Actions
// ============================================================================

impl SurfaceClient {
    /// Enables or disables capturing; returns the new flag.
    ///
    /// # Errors
    ///
    /// Returns transport errors or the host's failure message.
    pub async fn toggle_capture(&mut self, enabled: bool) -> Result<bool> {
        match self.request(HostRequest::ToggleCapture { enabled }).await? {
            HostResponse::Toggled { is_capturing, .. } => Ok(is_capturing),
            other => Err(unexpected(other)),
        }
    }

    /// Returns the persisted list, newest first.
    ///
    /// # Errors
    ///
    /// Returns transport errors or the host's failure message.
    pub async fn streams(&mut self) -> Result<Vec<StreamRecord>> {
        match self.request(HostRequest::GetStreams).await? {
            HostResponse::Streams { streams } => Ok(streams),
            other => Err(unexpected(other)),
        }
    }

    /// Returns the capture flag and badge.
    ///
    /// # Errors
    ///
    /// Returns transport errors or the host's failure message.
    pub async fn state(&mut self) -> Result<HostState> {
        match self.request(HostRequest::GetState).await? {
            HostResponse::State {
                is_capturing,
                badge,
            } => Ok(HostState {
                is_capturing,
                badge,
            }),
            other => Err(unexpected(other)),
        }
    }

    /// Clears the working set and persisted list.
    ///
    /// # Errors
    ///
    /// Returns transport errors or the host's failure message.
    pub async fn clear(&mut self) -> Result<()> {
        match self.request(HostRequest::ClearStreams).await? {
            HostResponse::Done { success: true } => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Asks the host to forward `url` to the proxy server.
    ///
    /// # Errors
    ///
    /// Returns transport errors or the host's failure message.
    pub async fn send_to_proxy(&mut self, url: impl Into<String>) -> Result<ProxyResult> {
        let request = HostRequest::SendToProxy { url: url.into() };
        match self.request(request).await? {
            HostResponse::Proxied { result, .. } => Ok(result),
            other => Err(unexpected(other)),
        }
    }
}

/// Maps a failure or mismatched reply to an error.
fn unexpected(response: HostResponse) -> Error {
    match response.error() {
        Some(error) => Error::protocol(error),
        None => Error::protocol(format!("Unexpected reply: {response:?}")),
    }
}

// ============================================================================
// Tests
// ============================================================================
