//! Capture store.
//!
//! Deduplicates submitted records by fingerprint, keeps only retained
//! types, and bounds the persisted list to the most recent entries.
//!
//! # Submission
//!
//! 1. Fingerprint the URL with its query string removed
//! 2. Drop silently if the fingerprint is already in the working set
//! 3. Add the fingerprint (the badge follows the working-set size)
//! 4. If the type is retained: read list, prepend, truncate, write back

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use crate::error::Result;
use crate::storage::Storage;

use super::fingerprint::FingerprintScheme;
use super::record::StreamRecord;
use super::state::CaptureState;

// ============================================================================
// Constants
// ============================================================================

/// Default number of records kept in the persisted list.
pub const DEFAULT_CAPACITY: usize = 50;

// ============================================================================
// SubmitOutcome
// ============================================================================

/// What happened to a submitted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Fingerprint already seen; nothing changed.
    Duplicate,
    /// Counted in the working set but not persisted.
    Counted {
        /// Working-set size after insertion.
        working_set: usize,
    },
    /// Counted and prepended to the persisted list.
    Retained {
        /// Working-set size after insertion.
        working_set: usize,
        /// Whether the oldest record was dropped to stay within capacity.
        evicted: bool,
    },
}

// ============================================================================
// CaptureStore
// ============================================================================

/// Deduplicating, capacity-bounded store of detected streams.
pub struct CaptureStore {
    /// Shared working set and badge.
    state: Arc<CaptureState>,
    /// Persisted list backend.
    storage: Arc<dyn Storage>,
    /// Fingerprint scheme.
    scheme: FingerprintScheme,
    /// Maximum persisted records.
    capacity: usize,
    /// Serializes read-modify-write of the persisted list.
    write_lock: AsyncMutex<()>,
}

impl CaptureStore {
    /// Creates a store over shared state and storage.
    #[must_use]
    pub fn new(
        state: Arc<CaptureState>,
        storage: Arc<dyn Storage>,
        scheme: FingerprintScheme,
        capacity: usize,
    ) -> Self {
        Self {
            state,
            storage,
            scheme,
            capacity,
            write_lock: AsyncMutex::new(()),
        }
    }

    /// Returns the shared capture state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> &Arc<CaptureState> {
        &self.state
    }

    /// Returns the persisted-list capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Submits a detected record.
    ///
    /// # Errors
    ///
    /// Returns storage errors from reading or writing the persisted list.
    /// The fingerprint stays in the working set in that case.
    pub async fn submit(&self, record: StreamRecord) -> Result<SubmitOutcome> {
        let fingerprint = self.scheme.fingerprint(&record.url);

        let Some(working_set) = self.state.insert(fingerprint) else {
            debug!(url = %record.url, "Duplicate stream dropped");
            return Ok(SubmitOutcome::Duplicate);
        };

        if !record.stream_type.is_retained() {
            debug!(
                url = %record.url,
                stream_type = %record.stream_type,
                working_set,
                "Stream counted, not retained"
            );
            return Ok(SubmitOutcome::Counted { working_set });
        }

        let _guard = self.write_lock.lock().await;

        let mut streams = self.storage.streams().await?;
        info!(
            url = %record.url,
            stream_type = %record.stream_type,
            tab_id = %record.source.tab_id,
            "Stream captured"
        );
        streams.insert(0, record);

        let evicted = streams.len() > self.capacity;
        streams.truncate(self.capacity);

        self.storage.set_streams(streams).await?;

        Ok(SubmitOutcome::Retained {
            working_set,
            evicted,
        })
    }

    /// Returns the persisted list, newest first.
    ///
    /// # Errors
    ///
    /// Returns storage read errors.
    pub async fn streams(&self) -> Result<Vec<StreamRecord>> {
        self.storage.streams().await
    }

    /// Empties the working set, the badge and the persisted list.
    ///
    /// # Errors
    ///
    /// Returns storage write errors; the working set is cleared regardless.
    pub async fn clear(&self) -> Result<()> {
        self.state.reset();

        let _guard = self.write_lock.lock().await;
        self.storage.set_streams(Vec::new()).await?;

        info!("Captured streams cleared");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
