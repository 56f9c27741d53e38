//! WebSocket server for the bridge and display surfaces.
//!
//! A single listener accepts every peer. Peers are not distinguished at
//! accept time; a connection becomes a bridge once it delivers an event.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │              Server                  │
//! │          (single port)               │
//! │  ┌────────────────────────────────┐  │
//! │  │ ConnectionId=1 → bridge        │  │
//! │  │ ConnectionId=2 → popup         │  │
//! │  │ ConnectionId=3 → CLI           │  │
//! │  └────────────────────────────────┘  │
//! └──────────────────────────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;

use super::connection::{Connection, DEFAULT_COMMAND_TIMEOUT, InboundHandler};

// ============================================================================
// Constants
// ============================================================================

/// Default bind address (localhost).
pub const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Accept poll interval; bounds how long shutdown takes to be noticed.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// Server
// ============================================================================

/// Accepts WebSocket peers and hands their traffic to an [`InboundHandler`].
///
/// # Example
///
/// ```ignore
/// let server = Server::bind(DEFAULT_BIND_IP, 0, handler).await?;
/// println!("WebSocket URL: {}", server.ws_url());
/// ```
pub struct Server {
    /// Bound address.
    local_addr: SocketAddr,

    /// Active connections.
    connections: RwLock<FxHashMap<ConnectionId, Connection>>,

    /// Receiver of all inbound traffic.
    handler: Arc<dyn InboundHandler>,

    /// Timeout for bridge commands issued on accepted connections.
    command_timeout: Duration,

    /// Shutdown flag.
    shutdown: AtomicBool,
}

// ============================================================================
// Server - Constructor
// ============================================================================

impl Server {
    /// Binds the listener and starts the accept loop.
    ///
    /// # Arguments
    ///
    /// * `ip` - IP address to bind to
    /// * `port` - Port to bind to (0 for random)
    /// * `handler` - Receiver of events and messages
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn bind(
        ip: IpAddr,
        port: u16,
        handler: Arc<dyn InboundHandler>,
    ) -> Result<Arc<Self>> {
        Self::bind_with_timeout(ip, port, handler, DEFAULT_COMMAND_TIMEOUT).await
    }

    /// Binds the listener with a custom bridge command timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn bind_with_timeout(
        ip: IpAddr,
        port: u16,
        handler: Arc<dyn InboundHandler>,
        command_timeout: Duration,
    ) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(SocketAddr::new(ip, port)).await?;
        let local_addr = listener.local_addr()?;

        let server = Arc::new(Self {
            local_addr,
            connections: RwLock::new(FxHashMap::default()),
            handler,
            command_timeout,
            shutdown: AtomicBool::new(false),
        });

        let server_clone = Arc::clone(&server);
        tokio::spawn(async move {
            server_clone.accept_loop(listener).await;
        });

        info!(addr = %local_addr, "WebSocket server started");

        Ok(server)
    }
}

// ============================================================================
// Server - Public API
// ============================================================================

impl Server {
    /// Returns the WebSocket URL for this server.
    ///
    /// Format: `ws://{ip}:{port}`
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    /// Returns the port the server is bound to.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Returns the bound address.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the number of active connections.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has been called.
    #[inline]
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Stops accepting and closes all connections.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("WebSocket server shutting down");

        let connections: Vec<_> = self.connections.write().drain().collect();
        for (connection_id, connection) in connections {
            connection.shutdown();
            debug!(%connection_id, "Connection closed during shutdown");
        }
    }
}

// ============================================================================
// Server - Accept Loop
// ============================================================================

impl Server {
    /// Background task that accepts new connections.
    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        debug!("Accept loop started");

        loop {
            if self.is_shutdown() {
                debug!("Accept loop shutting down");
                break;
            }

            // Accept with timeout to allow checking shutdown flag
            match timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
                Ok(Ok((stream, addr))) => {
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream, addr).await {
                            warn!(error = %e, ?addr, "Connection handling failed");
                        }
                    });
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Accept failed");
                }
                Err(_) => continue,
            }
        }

        debug!("Accept loop terminated");
    }

    /// Upgrades a TCP stream and tracks the connection until it closes.
    async fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        debug!(?addr, "New TCP connection");

        let ws_stream = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| Error::connection(format!("WebSocket upgrade failed: {e}")))?;

        let connection = Connection::new(
            ws_stream,
            Arc::clone(&self.handler),
            self.command_timeout,
        );
        let connection_id = connection.id();

        info!(%connection_id, ?addr, "WebSocket connection established");

        self.connections
            .write()
            .insert(connection_id, connection.clone());

        connection.closed().await;

        self.connections.write().remove(&connection_id);
        debug!(%connection_id, "Connection removed");

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
