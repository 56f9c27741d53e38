//! WebSocket connection and event loop.
//!
//! This module handles one accepted WebSocket client (the bridge or a
//! display surface), including request/response correlation and routing
//! of incoming events and messages.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Incoming frames (responses, events, messages)
//! - Outgoing commands and replies from the host
//! - Request/response correlation by UUID
//!
//! Events and messages are handed to the [`InboundHandler`] on their own
//! tasks, so a handler waiting on a bridge response never stalls the loop
//! that delivers it.
//!
//! At most [`MAX_PENDING_REQUESTS`] bridge commands are in flight per
//! connection. Further senders wait for a slot instead of failing.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, from_str, from_value, to_string};
use tokio::net::TcpStream;
use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, trace, warn};

use crate::capture::{TabInfo, TabLookup};
use crate::error::{Error, Result};
use crate::identifiers::{ConnectionId, RequestId, TabId};
use crate::protocol::{
    Command, Event, HostRequest, HostResponse, MESSAGE_TYPE, Reply, Request, Response,
};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for bridge commands.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum bridge commands in flight; further senders queue.
pub const MAX_PENDING_REQUESTS: usize = 100;

// ============================================================================
// Types
// ============================================================================

/// Map of request IDs to response channels.
type CorrelationMap = FxHashMap<RequestId, oneshot::Sender<Result<Response>>>;

/// Sink half of a split WebSocket stream.
type WsSink = futures_util::stream::SplitSink<WebSocketStream<TcpStream>, WsMessage>;

// ============================================================================
// InboundHandler
// ============================================================================

/// Receives events and messages arriving on a connection.
#[async_trait]
pub trait InboundHandler: Send + Sync + 'static {
    /// Called for each bridge event.
    ///
    /// `connection` is the connection the event arrived on; tab lookups go
    /// back through it.
    async fn on_event(&self, event: Event, connection: Connection);

    /// Called for each display-surface message; the return value is sent
    /// back as the reply.
    async fn on_message(&self, request: HostRequest) -> HostResponse;
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Send a request and wait for response.
    Send {
        request: Request,
        response_tx: oneshot::Sender<Result<Response>>,
    },
    /// Send a reply to a display-surface message.
    Reply(Reply),
    /// Remove a timed-out correlation entry.
    RemoveCorrelation(RequestId),
    /// Shutdown the connection.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// WebSocket connection to a bridge or display surface.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync` and cheap to clone; clones share the same
/// event loop.
#[derive(Clone)]
pub struct Connection {
    /// Connection identifier.
    id: ConnectionId,
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Correlation map (shared with event loop).
    correlation: Arc<Mutex<CorrelationMap>>,
    /// In-flight slots; closed when the event loop ends.
    slots: Arc<Semaphore>,
    /// Set once the peer has delivered an event.
    bridge: Arc<AtomicBool>,
    /// Timeout for bridge commands.
    command_timeout: Duration,
}

impl Connection {
    /// Creates a new connection from a WebSocket stream.
    ///
    /// Spawns the event loop task internally.
    pub(crate) fn new(
        ws_stream: WebSocketStream<TcpStream>,
        handler: Arc<dyn InboundHandler>,
        command_timeout: Duration,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let connection = Self {
            id: ConnectionId::next(),
            command_tx,
            correlation: Arc::new(Mutex::new(CorrelationMap::default())),
            slots: Arc::new(Semaphore::new(MAX_PENDING_REQUESTS)),
            bridge: Arc::new(AtomicBool::new(false)),
            command_timeout,
        };

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            connection.clone(),
            handler,
        ));

        connection
    }

    /// Returns the connection identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Marks the peer as a bridge.
    ///
    /// Returns `true` the first time only.
    #[inline]
    pub fn mark_bridge(&self) -> bool {
        !self.bridge.swap(true, Ordering::SeqCst)
    }

    /// Sends a command and waits for the response.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if connection is closed
    /// - [`Error::RequestTimeout`] if response not received within timeout
    pub async fn send(&self, command: Command) -> Result<Response> {
        self.send_with_timeout(Request::new(command), self.command_timeout)
            .await
    }

    /// Sends a request and waits for response with custom timeout.
    ///
    /// Waits for a free in-flight slot first; the timeout starts once the
    /// request is handed to the event loop.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if connection is closed
    /// - [`Error::RequestTimeout`] if response not received within timeout
    pub async fn send_with_timeout(
        &self,
        request: Request,
        request_timeout: Duration,
    ) -> Result<Response> {
        let request_id = request.id;

        // Held until the response arrives or the wait gives up.
        let _slot = self
            .slots
            .acquire()
            .await
            .map_err(|_| Error::ConnectionClosed)?;

        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(ConnectionCommand::Send {
                request,
                response_tx,
            })
            .map_err(|_| Error::ConnectionClosed)?;

        match timeout(request_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                let _ = self
                    .command_tx
                    .send(ConnectionCommand::RemoveCorrelation(request_id));

                Err(Error::request_timeout(
                    request_id,
                    request_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Resolves once the event loop has terminated.
    pub async fn closed(&self) {
        self.command_tx.closed().await;
    }

    /// Shuts down the connection gracefully.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop(
        ws_stream: WebSocketStream<TcpStream>,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        connection: Connection,
        handler: Arc<dyn InboundHandler>,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                message = ws_read.next() => {
                    match message {
                        Some(Ok(WsMessage::Text(text))) => {
                            connection.handle_incoming_message(&text, &handler);
                        }

                        Some(Ok(WsMessage::Close(_))) => {
                            debug!(connection_id = %connection.id, "WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(connection_id = %connection.id, error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!(connection_id = %connection.id, "WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { request, response_tx }) => {
                            Self::handle_send_command(
                                request,
                                response_tx,
                                &mut ws_write,
                                &connection.correlation,
                            ).await;
                        }

                        Some(ConnectionCommand::Reply(reply)) => {
                            Self::handle_reply_command(reply, &mut ws_write).await;
                        }

                        Some(ConnectionCommand::RemoveCorrelation(request_id)) => {
                            connection.correlation.lock().remove(&request_id);
                            debug!(?request_id, "Removed timed-out correlation");
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!(connection_id = %connection.id, "Shutdown command received");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        // Dropping the receiver is what `closed()` waits for.
        drop(command_rx);
        connection.slots.close();
        Self::fail_pending_requests(&connection.correlation);

        debug!(connection_id = %connection.id, "Event loop terminated");
    }

    /// Routes an incoming text frame on its `type` field.
    fn handle_incoming_message(&self, text: &str, handler: &Arc<dyn InboundHandler>) {
        let value: Value = match from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, text = %text, "Failed to parse incoming message");
                return;
            }
        };

        match value.get("type").and_then(Value::as_str) {
            Some("success" | "error") => self.handle_response(value),
            Some("event") => self.handle_event(value, handler),
            Some(MESSAGE_TYPE) => self.handle_message(value, handler),
            _ => warn!(text = %text, "Unrecognized message type"),
        }
    }

    /// Completes the pending request a response belongs to.
    fn handle_response(&self, value: Value) {
        let response: Response = match from_value(value) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Malformed response");
                return;
            }
        };

        let tx = self.correlation.lock().remove(&response.id);
        if let Some(tx) = tx {
            let _ = tx.send(Ok(response));
        } else {
            warn!(id = %response.id, "Response for unknown request");
        }
    }

    /// Hands an event to the handler on its own task.
    fn handle_event(&self, value: Value, handler: &Arc<dyn InboundHandler>) {
        let event: Event = match from_value(value) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "Malformed event");
                return;
            }
        };

        trace!(method = %event.method, "Event received");

        let handler = Arc::clone(handler);
        let connection = self.clone();
        tokio::spawn(async move {
            handler.on_event(event, connection).await;
        });
    }

    /// Hands a display-surface message to the handler and queues the reply.
    fn handle_message(&self, value: Value, handler: &Arc<dyn InboundHandler>) {
        let Some(id) = value
            .get("id")
            .cloned()
            .and_then(|v| from_value::<RequestId>(v).ok())
        else {
            warn!("Message without a valid id dropped");
            return;
        };

        let action = value
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let request: HostRequest = match from_value(value) {
            Ok(r) => r,
            Err(e) => {
                let error = if HostRequest::is_known_action(&action) {
                    Error::invalid_argument(e.to_string())
                } else {
                    Error::unknown_action(action)
                };
                warn!(%id, error = %error, "Rejected message");
                let reply = Reply::new(id, HostResponse::failed(error.to_string()));
                let _ = self.command_tx.send(ConnectionCommand::Reply(reply));
                return;
            }
        };

        debug!(%id, action = request.action(), "Message received");

        let handler = Arc::clone(handler);
        let command_tx = self.command_tx.clone();
        tokio::spawn(async move {
            let response = handler.on_message(request).await;
            let _ = command_tx.send(ConnectionCommand::Reply(Reply::new(id, response)));
        });
    }

    /// Handles a send command from the host.
    async fn handle_send_command(
        request: Request,
        response_tx: oneshot::Sender<Result<Response>>,
        ws_write: &mut WsSink,
        correlation: &Arc<Mutex<CorrelationMap>>,
    ) {
        let request_id = request.id;

        let json = match to_string(&request) {
            Ok(j) => j,
            Err(e) => {
                let _ = response_tx.send(Err(Error::Json(e)));
                return;
            }
        };

        // Store correlation before sending
        correlation.lock().insert(request_id, response_tx);

        if let Err(e) = ws_write.send(WsMessage::Text(json.into())).await {
            if let Some(tx) = correlation.lock().remove(&request_id) {
                let _ = tx.send(Err(Error::connection(e.to_string())));
            }
        }

        trace!(?request_id, "Request sent");
    }

    /// Writes a reply frame.
    async fn handle_reply_command(reply: Reply, ws_write: &mut WsSink) {
        let id = reply.id;
        match to_string(&reply) {
            Ok(json) => {
                if let Err(e) = ws_write.send(WsMessage::Text(json.into())).await {
                    warn!(%id, error = %e, "Failed to send reply");
                }
            }
            Err(e) => warn!(%id, error = %e, "Failed to serialize reply"),
        }
    }

    /// Fails all pending requests with ConnectionClosed error.
    fn fail_pending_requests(correlation: &Arc<Mutex<CorrelationMap>>) {
        let pending: Vec<_> = correlation.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending requests on shutdown");
        }
    }
}

// ============================================================================
// Connection - Bridge Commands
// ============================================================================

#[async_trait]
impl TabLookup for Connection {
    async fn tab_info(&self, tab_id: TabId) -> Result<TabInfo> {
        let response = self.send(Command::TabsGet { tab_id }).await?;

        if response.is_error() {
            if response.error.as_deref() == Some("no such tab") {
                return Err(Error::tab_not_found(tab_id));
            }
            return response.into_result().map(|_| TabInfo::default());
        }

        Ok(TabInfo {
            url: response.get_optional_string("url"),
            title: response.get_optional_string("title"),
        })
    }
}

impl Connection {
    /// Pushes badge text to the bridge.
    ///
    /// # Errors
    ///
    /// Returns connection, timeout or bridge errors.
    pub async fn set_badge_text(&self, text: impl Into<String>) -> Result<()> {
        let response = self
            .send(Command::SetBadgeText { text: text.into() })
            .await?;
        response.into_result()?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio_tungstenite::{MaybeTlsStream, accept_async, connect_async};

    type PeerStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

    struct NoopHandler;

    #[async_trait]
    impl InboundHandler for NoopHandler {
        async fn on_event(&self, _event: Event, _connection: Connection) {}

        async fn on_message(&self, _request: HostRequest) -> HostResponse {
            HostResponse::done()
        }
    }

    /// Host-side connection plus the peer socket it talks to.
    async fn connected_pair() -> (Connection, PeerStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            accept_async(stream).await.expect("upgrade")
        });

        let (peer, _) = connect_async(format!("ws://{addr}")).await.expect("connect");
        let ws = accept.await.expect("join");

        let connection = Connection::new(ws, Arc::new(NoopHandler), Duration::from_secs(5));
        (connection, peer)
    }

    async fn next_request(peer: &mut PeerStream) -> Option<Value> {
        match peer.next().await? {
            Ok(WsMessage::Text(text)) => from_str(&text).ok(),
            _ => None,
        }
    }

    fn tab_reply(request: &Value) -> Value {
        json!({
            "id": request["id"],
            "type": "success",
            "result": { "url": "https://example.com/watch", "title": "Watch" }
        })
    }

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_COMMAND_TIMEOUT.as_secs(), 30);
        assert_eq!(MAX_PENDING_REQUESTS, 100);
    }

    #[tokio::test]
    async fn test_tab_lookup_reply_mapping() {
        let (connection, mut peer) = connected_pair().await;

        tokio::spawn(async move {
            while let Some(request) = next_request(&mut peer).await {
                let reply = match request["params"]["tabId"].as_u64() {
                    Some(1) => tab_reply(&request),
                    Some(2) => json!({ "id": request["id"], "type": "error", "error": "no such tab" }),
                    _ => json!({ "id": request["id"], "type": "error", "error": "unknown error" }),
                };
                let frame = WsMessage::Text(reply.to_string().into());
                if peer.send(frame).await.is_err() {
                    break;
                }
            }
        });

        let tab = |id| TabId::new(id).expect("tab id");

        let info = connection.tab_info(tab(1)).await.expect("tab 1");
        assert_eq!(info.url.as_deref(), Some("https://example.com/watch"));
        assert_eq!(info.title.as_deref(), Some("Watch"));

        let err = connection.tab_info(tab(2)).await.expect_err("closed tab");
        assert!(matches!(err, Error::TabNotFound { .. }));

        let err = connection.tab_info(tab(3)).await.expect_err("bridge error");
        assert!(matches!(err, Error::Protocol { .. }));
        assert!(err.to_string().contains("unknown error"));

        connection.shutdown();
    }

    #[tokio::test]
    async fn test_burst_waits_for_free_slot() {
        const BURST: i64 = 150;

        let (connection, mut peer) = connected_pair().await;

        // Replies once a full batch is queued or the sender goes quiet.
        let peer_task = tokio::spawn(async move {
            let mut batch = Vec::new();
            loop {
                let request = timeout(Duration::from_millis(100), next_request(&mut peer)).await;
                let flush = match request {
                    Ok(Some(request)) => {
                        batch.push(request);
                        batch.len() == MAX_PENDING_REQUESTS
                    }
                    Ok(None) => break,
                    Err(_) => !batch.is_empty(),
                };

                if flush {
                    for request in batch.drain(..) {
                        let frame = WsMessage::Text(tab_reply(&request).to_string().into());
                        if peer.send(frame).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        let lookups: Vec<_> = (0..BURST)
            .map(|id| {
                let connection = connection.clone();
                tokio::spawn(async move {
                    let tab_id = TabId::new(id).expect("tab id");
                    connection.tab_info(tab_id).await
                })
            })
            .collect();

        for lookup in lookups {
            lookup.await.expect("join").expect("lookup");
        }

        connection.shutdown();
        peer_task.await.expect("join");
    }

    #[tokio::test]
    async fn test_waiters_fail_when_closed() {
        let (connection, peer) = connected_pair().await;
        drop(peer);
        connection.closed().await;

        let tab = TabId::new(1).expect("tab id");
        let err = connection.tab_info(tab).await.expect_err("closed");
        assert!(matches!(err, Error::ConnectionClosed));
    }
}
