//! Persisted key-value state.
//!
//! Two keys survive restarts and are shared between the observer and
//! display surfaces:
//!
//! | Key | Type |
//! |-----|------|
//! | `isCapturing` | `bool` |
//! | `capturedStreams` | `[StreamRecord]`, newest first |
//!
//! # Backends
//!
//! | Backend | Description |
//! |---------|-------------|
//! | [`MemoryStorage`] | Process-local, for tests and ephemeral hosts |
//! | [`FileStorage`] | JSON file, written through on every change |

// ============================================================================
// Submodules
// ============================================================================

/// JSON file backend.
pub mod file;

/// In-memory backend.
pub mod memory;

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capture::StreamRecord;
use crate::error::Result;

// ============================================================================
// Re-exports
// ============================================================================

pub use file::FileStorage;
pub use memory::MemoryStorage;

// ============================================================================
// StoredState
// ============================================================================

/// Everything a backend persists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredState {
    /// Capture-enabled flag.
    #[serde(default)]
    pub is_capturing: bool,

    /// Retained records, newest first.
    #[serde(default)]
    pub captured_streams: Vec<StreamRecord>,
}

// ============================================================================
// Storage
// ============================================================================

/// Key-value access to persisted state.
///
/// Callers go through the backend on every access and must not keep their
/// own copy of the capture flag. The host is the only writer of the backing
/// store while it runs: a backend may answer reads from the last state it
/// wrote, so edits made by other processes are not seen and are overwritten
/// by the next write.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Reads `isCapturing`.
    async fn is_capturing(&self) -> Result<bool>;

    /// Writes `isCapturing`.
    async fn set_capturing(&self, enabled: bool) -> Result<()>;

    /// Reads `capturedStreams`.
    async fn streams(&self) -> Result<Vec<StreamRecord>>;

    /// Replaces `capturedStreams`.
    async fn set_streams(&self, streams: Vec<StreamRecord>) -> Result<()>;

    /// Restores installation defaults: capture off, no streams.
    async fn reset(&self) -> Result<()> {
        self.set_capturing(false).await?;
        self.set_streams(Vec::new()).await
    }
}
