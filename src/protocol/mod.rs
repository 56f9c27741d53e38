//! WebSocket protocol message types.
//!
//! This module defines the message format for communication between the
//! host (Rust), the bridge (browser extension), and display surfaces.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Host → Bridge | Command (`tabs.get`, `action.setBadgeText`) |
//! | `Response` | Bridge → Host | Command result |
//! | `Event` | Bridge → Host | Observed network request |
//! | `Message` | Surface → Host | User action |
//! | `Reply` | Host → Surface | Action result |
//!
//! Incoming frames are routed on their `type` field: `success`/`error`
//! are responses, `event` events, `message` display-surface messages.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Bridge command definitions |
//! | `event` | Event types |
//! | `message` | Display-surface messages and replies |
//! | `request` | Request and Response types |

// ============================================================================
// Submodules
// ============================================================================

/// Bridge command definitions.
pub mod command;

/// Event message types.
pub mod event;

/// Display-surface messages and replies.
pub mod message;

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::Command;
pub use event::{Event, ParsedEvent};
pub use message::{HostRequest, HostResponse, MESSAGE_TYPE, Message, REPLY_TYPE, Reply};
pub use request::{Request, Response, ResponseType};
