//! WebSocket transport layer.
//!
//! This module handles communication between the host (Rust) and its
//! peers: the bridge extension and display surfaces.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Host (Rust)    │         WebSocket            │  Bridge         │
//! │                 │◄────────────────────────────►│  (Extension)    │
//! │  Server         │      localhost:PORT          ├─────────────────┤
//! │  → Connection   │◄────────────────────────────►│  Popup / CLI    │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Server::bind` - Bind and start accepting
//! 2. Peer connects; a `Connection` event loop is spawned
//! 3. Events and messages go to the `InboundHandler`
//! 4. Host sends bridge commands through the `Connection`
//! 5. Peer disconnects or `Server::shutdown` closes it
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket connection and event loop |
//! | `server` | WebSocket server binding and acceptance |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

/// WebSocket server.
pub mod server;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, DEFAULT_COMMAND_TIMEOUT, InboundHandler, MAX_PENDING_REQUESTS};
pub use server::{DEFAULT_BIND_IP, Server};
