//! Stream Capturer - passive HLS/DASH stream detection.
//!
//! This library watches the network requests browser tabs make, keeps the
//! ones that look like streaming manifests, and lets display surfaces list
//! them or hand one to a local proxy server.
//!
//! # Architecture
//!
//! The host is a WebSocket server with two kinds of peers:
//!
//! - **Bridge (Extension)**: Forwards `network.beforeRequestSent` events,
//!   answers `tabs.get` lookups, shows the badge
//! - **Display surfaces (popup, CLI)**: Send user actions, read the list
//!
//! Key design principles:
//!
//! - One owned [`CaptureState`] (working set + badge) shared by `Arc`
//! - The capture flag is read from storage on every event
//! - Persisted list writes are serialized by the [`CaptureStore`]
//! - Event-driven; no polling
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use stream_capturer::{Host, HostOptions, Result, SurfaceClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let host = Arc::new(
//!         Host::builder()
//!             .options(HostOptions::new().with_port(9300))
//!             .build()
//!             .await?,
//!     );
//!     let server = host.serve().await?;
//!
//!     let mut client = SurfaceClient::connect(&server.ws_url()).await?;
//!     client.toggle_capture(true).await?;
//!     println!("{} streams", client.streams().await?.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`capture`] | Classification, deduplication, observer |
//! | [`client`] | Display-surface WebSocket client |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`forward`] | Proxy server relay |
//! | [`host`] | Host wiring and configuration |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | WebSocket message types |
//! | [`storage`] | Persisted state backends |
//! | [`transport`] | WebSocket transport layer |

// ============================================================================
// Modules
// ============================================================================

/// Stream classification, deduplication and capture pipeline.
pub mod capture;

/// Display-surface client.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Proxy server relay.
pub mod forward;

/// Host wiring and configuration.
///
/// Use [`Host::builder()`] to create a configured host.
pub mod host;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// WebSocket protocol message types.
pub mod protocol;

/// Persisted state backends.
pub mod storage;

/// WebSocket transport layer.
///
/// Handles the WebSocket server and connection event loops.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Capture types
pub use capture::{
    CaptureState, CaptureStore, Classification, Fingerprint, FingerprintScheme, Observation,
    ObservedRequest, RequestObserver, SourceContext, StreamFilter, StreamRecord, StreamType,
    SubmitOutcome, TabInfo, TabLookup, classify, format_age,
};

// Client types
pub use client::{HostState, SurfaceClient};

// Error types
pub use error::{Error, Result};

// Forwarding types
pub use forward::{DEFAULT_PROXY_ENDPOINT, ProxyForwarder, ProxyResult};

// Host types
pub use host::{DEFAULT_PORT, Host, HostBuilder, HostOptions};

// Identifier types
pub use identifiers::{ConnectionId, RequestId, TabId};

// Protocol types
pub use protocol::{HostRequest, HostResponse};

// Storage types
pub use storage::{FileStorage, MemoryStorage, Storage, StoredState};

// Transport types
pub use transport::{Connection, InboundHandler, Server};
