//! JSON file storage backend.
//!
//! The whole state is one JSON object:
//!
//! ```json
//! { "isCapturing": true, "capturedStreams": [ ... ] }
//! ```
//!
//! Writes go to a sibling temp file which is then renamed over the
//! original, so a crash mid-write leaves the previous state intact.

// ============================================================================
// Imports
// ============================================================================

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::capture::StreamRecord;
use crate::error::{Error, Result};

use super::{Storage, StoredState};

// ============================================================================
// FileStorage
// ============================================================================

/// Storage persisted to a JSON file.
///
/// Reads are served from the in-process copy, which is the file's
/// contents as of open or the last write. The file is not re-read: an
/// external edit made while the host runs is ignored and replaced on the
/// next write.
#[derive(Debug)]
pub struct FileStorage {
    /// Path of the state file.
    path: PathBuf,
    /// Current contents.
    state: Mutex<StoredState>,
    /// Whether the file did not exist when opened.
    fresh: bool,
}

impl FileStorage {
    /// Opens the state file, starting from defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the file exists but cannot be read
    /// - [`Error::Storage`] if the file is not valid state JSON
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let (state, fresh) = match fs::read_to_string(&path).await {
            Ok(text) => {
                let state: StoredState = serde_json::from_str(&text).map_err(|e| {
                    Error::storage(format!("invalid state file {}: {e}", path.display()))
                })?;
                (state, false)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => (StoredState::default(), true),
            Err(e) => return Err(e.into()),
        };

        info!(
            path = %path.display(),
            fresh,
            streams = state.captured_streams.len(),
            "State file opened"
        );

        Ok(Self {
            path,
            state: Mutex::new(state),
            fresh,
        })
    }

    /// Returns the state file path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if no state file existed when opened.
    #[inline]
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Applies `update` and writes the result to disk.
    async fn write_with<F>(&self, update: F) -> Result<()>
    where
        F: FnOnce(&mut StoredState) + Send,
    {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        update(&mut next);

        persist(&self.path, &next).await?;
        *state = next;
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn is_capturing(&self) -> Result<bool> {
        Ok(self.state.lock().await.is_capturing)
    }

    async fn set_capturing(&self, enabled: bool) -> Result<()> {
        self.write_with(|s| s.is_capturing = enabled).await
    }

    async fn streams(&self) -> Result<Vec<StreamRecord>> {
        Ok(self.state.lock().await.captured_streams.clone())
    }

    async fn set_streams(&self, streams: Vec<StreamRecord>) -> Result<()> {
        self.write_with(|s| s.captured_streams = streams).await
    }
}

/// Writes `state` to `path` via a temp file and rename.
async fn persist(path: &Path, state: &StoredState) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_string_pretty(state)?;
    let tmp = path.with_extension("json.tmp");

    fs::write(&tmp, json).await?;
    fs::rename(&tmp, path).await?;

    debug!(
        path = %path.display(),
        streams = state.captured_streams.len(),
        "State written"
    );
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
