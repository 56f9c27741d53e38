//! Host: wiring of capture, storage, forwarding and transport.
//!
//! The [`Host`] owns the shared [`CaptureState`] and answers both sides of
//! the WebSocket server:
//!
//! - bridge events go through the [`RequestObserver`]
//! - display-surface messages are dispatched by [`Host::handle`]
//!
//! Badge changes are pushed to every connection that has delivered at
//! least one event.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Host construction and validation |
//! | `options` | Host configuration |

// ============================================================================
// Submodules
// ============================================================================

/// Builder pattern for host configuration.
pub mod builder;

/// Host configuration options.
pub mod options;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::capture::{CaptureState, CaptureStore, Observation, RequestObserver};
use crate::error::Result;
use crate::forward::ProxyForwarder;
use crate::protocol::{Event, HostRequest, HostResponse, ParsedEvent};
use crate::storage::Storage;
use crate::transport::{Connection, InboundHandler, Server};

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::HostBuilder;
pub use options::{DEFAULT_PORT, DEFAULT_STORAGE_FILE, HostOptions};

// ============================================================================
// Host
// ============================================================================

/// The capture host.
pub struct Host {
    /// Configuration the host was built with.
    options: HostOptions,
    /// Working set and badge.
    state: Arc<CaptureState>,
    /// Persisted state.
    storage: Arc<dyn Storage>,
    /// Deduplicating persisted list.
    store: Arc<CaptureStore>,
    /// Bridge event pipeline.
    observer: RequestObserver,
    /// Proxy server client.
    forwarder: ProxyForwarder,
}

// ============================================================================
// Host - Constructor
// ============================================================================

impl Host {
    /// Creates a new host builder.
    #[inline]
    #[must_use]
    pub fn builder() -> HostBuilder {
        HostBuilder::new()
    }

    /// Wires components over validated options.
    pub(crate) fn new(options: HostOptions, storage: Arc<dyn Storage>, endpoint: Url) -> Self {
        let state = Arc::new(CaptureState::new());
        let store = Arc::new(CaptureStore::new(
            Arc::clone(&state),
            Arc::clone(&storage),
            options.scheme,
            options.capacity,
        ));
        let observer = RequestObserver::new(Arc::clone(&storage), Arc::clone(&store));

        Self {
            options,
            state,
            storage,
            store,
            observer,
            forwarder: ProxyForwarder::new(endpoint),
        }
    }
}

// ============================================================================
// Host - Accessors
// ============================================================================

impl Host {
    /// Returns the options the host was built with.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &HostOptions {
        &self.options
    }

    /// Returns the shared capture state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> &Arc<CaptureState> {
        &self.state
    }

    /// Returns the storage backend.
    #[inline]
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Returns the capture store.
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<CaptureStore> {
        &self.store
    }

    /// Returns the proxy forwarder.
    #[inline]
    #[must_use]
    pub fn forwarder(&self) -> &ProxyForwarder {
        &self.forwarder
    }
}

// ============================================================================
// Host - Lifecycle
// ============================================================================

impl Host {
    /// Restores installation defaults: capture off, empty list, empty badge.
    ///
    /// # Errors
    ///
    /// Returns storage write errors.
    pub async fn install(&self) -> Result<()> {
        self.storage.reset().await?;
        self.state.reset();
        info!("Installation defaults restored");
        Ok(())
    }

    /// Starts the WebSocket server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if binding fails.
    pub async fn serve(self: &Arc<Self>) -> Result<Arc<Server>> {
        let handler: Arc<dyn InboundHandler> = Arc::clone(self) as Arc<dyn InboundHandler>;
        Server::bind_with_timeout(
            self.options.bind_ip,
            self.options.port,
            handler,
            self.options.lookup_timeout,
        )
        .await
    }

    /// Enables or disables capturing.
    ///
    /// Disabling forgets the working set and blanks the badge; the
    /// persisted list is kept.
    ///
    /// # Errors
    ///
    /// Returns storage write errors.
    pub async fn set_capturing(&self, enabled: bool) -> Result<()> {
        self.storage.set_capturing(enabled).await?;
        if !enabled {
            self.state.reset();
        }
        info!(enabled, "Capture toggled");
        Ok(())
    }
}

// ============================================================================
// Host - Message Dispatch
// ============================================================================

impl Host {
    /// Answers a display-surface request.
    ///
    /// Failures become `{success: false, error}` replies.
    pub async fn handle(&self, request: HostRequest) -> HostResponse {
        let action = request.action();
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                if e.is_storage_error() {
                    error!(action, error = %e, "Persisted state unavailable");
                } else if e.is_proxy_error() {
                    warn!(action, error = %e, "Proxy relay failed");
                } else {
                    warn!(action, error = %e, "Action failed");
                }
                HostResponse::failed(e.to_string())
            }
        }
    }

    async fn dispatch(&self, request: HostRequest) -> Result<HostResponse> {
        match request {
            HostRequest::ToggleCapture { enabled } => {
                self.set_capturing(enabled).await?;
                Ok(HostResponse::Toggled {
                    success: true,
                    is_capturing: enabled,
                })
            }

            HostRequest::GetStreams => Ok(HostResponse::Streams {
                streams: self.store.streams().await?,
            }),

            HostRequest::GetState => Ok(HostResponse::State {
                is_capturing: self.storage.is_capturing().await?,
                badge: self.state.badge_text(),
            }),

            HostRequest::ClearStreams => {
                self.store.clear().await?;
                Ok(HostResponse::done())
            }

            HostRequest::SendToProxy { url } => {
                let result = self.forwarder.forward(&url).await?;
                Ok(HostResponse::Proxied {
                    success: true,
                    result,
                })
            }
        }
    }
}

// ============================================================================
// Host - Badge
// ============================================================================

impl Host {
    /// Mirrors badge changes to a bridge until it disconnects.
    fn spawn_badge_sync(&self, connection: Connection) {
        let mut badge = self.state.subscribe_badge();

        tokio::spawn(async move {
            let connection_id = connection.id();
            let mut text = badge.borrow_and_update().clone();

            loop {
                if let Err(e) = connection.set_badge_text(text.as_str()).await {
                    if e.is_connection_error() {
                        break;
                    }
                    warn!(%connection_id, error = %e, "Failed to set badge text");
                }

                tokio::select! {
                    changed = badge.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        text = badge.borrow_and_update().clone();
                    }
                    () = connection.closed() => break,
                }
            }

            debug!(%connection_id, "Badge sync stopped");
        });
    }
}

// ============================================================================
// InboundHandler
// ============================================================================

#[async_trait]
impl InboundHandler for Host {
    async fn on_event(&self, event: Event, connection: Connection) {
        if connection.mark_bridge() {
            info!(connection_id = %connection.id(), "Bridge connected");
            self.spawn_badge_sync(connection.clone());
        }

        match event.parse() {
            ParsedEvent::NetworkBeforeRequestSent(request) => {
                match self.observer.observe(request, &connection).await {
                    Ok(Observation::Submitted(outcome)) => {
                        debug!(?outcome, "Stream submitted");
                    }
                    Ok(observation) => {
                        trace!(?observation, "Request not captured");
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to record stream");
                    }
                }
            }

            ParsedEvent::Unknown { method, .. } => {
                trace!(%method, "Ignoring event");
            }
        }
    }

    async fn on_message(&self, request: HostRequest) -> HostResponse {
        self.handle(request).await
    }
}

// ============================================================================
// Tests
// ============================================================================
