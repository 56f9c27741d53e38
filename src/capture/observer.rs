//! Request observer.
//!
//! Receives every request notification from the bridge and decides, per
//! event, whether it becomes a captured stream.
//!
//! # Flow
//!
//! ```text
//! request ─► capture flag? ─► classify ─► tab lookup ─► CaptureStore
//!               (storage)      (stream?)    (bridge)
//! ```
//!
//! The capture flag is read from storage on every event. Disabling capture
//! does not unsubscribe anything; events simply stop having side effects.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Result;
use crate::identifiers::TabId;
use crate::storage::Storage;

use super::classify::classify;
use super::record::{SourceContext, StreamRecord, now_millis};
use super::store::{CaptureStore, SubmitOutcome};

// ============================================================================
// ObservedRequest
// ============================================================================

/// A network request reported by the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedRequest {
    /// Browser-assigned request ID.
    pub request_id: String,
    /// Request URL.
    pub url: String,
    /// HTTP method.
    pub method: String,
    /// Originating tab, `None` for requests outside any tab.
    pub tab_id: Option<TabId>,
}

// ============================================================================
// TabLookup
// ============================================================================

/// Current address and title of a tab.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabInfo {
    /// Tab address.
    pub url: Option<String>,
    /// Tab title.
    pub title: Option<String>,
}

/// Resolves tab metadata at detection time.
#[async_trait]
pub trait TabLookup: Send + Sync {
    /// Looks up a tab's current address and title.
    async fn tab_info(&self, tab_id: TabId) -> Result<TabInfo>;
}

// ============================================================================
// Observation
// ============================================================================

/// What the observer did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Capture is disabled.
    CaptureDisabled,
    /// URL matched no stream pattern.
    NotStream,
    /// Tab could not be resolved; event dropped.
    TabUnavailable,
    /// Record handed to the store.
    Submitted(SubmitOutcome),
}

// ============================================================================
// RequestObserver
// ============================================================================

/// Turns bridge request events into store submissions.
pub struct RequestObserver {
    storage: Arc<dyn Storage>,
    store: Arc<CaptureStore>,
}

impl RequestObserver {
    /// Creates an observer feeding `store`.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, store: Arc<CaptureStore>) -> Self {
        Self { storage, store }
    }

    /// Handles one request event.
    ///
    /// Tab lookup failures are logged and the event is dropped; they are
    /// not errors. The record is stamped at detection, before the lookup.
    ///
    /// # Errors
    ///
    /// Returns storage errors from reading the capture flag or writing the
    /// persisted list.
    pub async fn observe(
        &self,
        request: ObservedRequest,
        lookup: &dyn TabLookup,
    ) -> Result<Observation> {
        if !self.storage.is_capturing().await? {
            return Ok(Observation::CaptureDisabled);
        }

        let classification = classify(&request.url);
        if !classification.is_stream {
            return Ok(Observation::NotStream);
        }
        let detected_at = now_millis();

        debug!(
            url = %request.url,
            stream_type = %classification.stream_type,
            "Stream URL detected"
        );

        let Some(tab_id) = request.tab_id else {
            warn!(url = %request.url, "Stream request has no tab, dropped");
            return Ok(Observation::TabUnavailable);
        };

        let info = match lookup.tab_info(tab_id).await {
            Ok(info) => info,
            Err(e) if e.is_timeout() => {
                warn!(tab_id = %tab_id, error = %e, "Tab lookup timed out");
                return Ok(Observation::TabUnavailable);
            }
            Err(e) => {
                warn!(tab_id = %tab_id, error = %e, "Failed to get tab info");
                return Ok(Observation::TabUnavailable);
            }
        };

        let record = StreamRecord::new(
            request.url,
            classification.stream_type,
            request.method,
            SourceContext {
                tab_id,
                tab_url: info.url,
                tab_title: info.title,
            },
        )
        .with_timestamp(detected_at);

        let outcome = self.store.submit(record).await?;
        Ok(Observation::Submitted(outcome))
    }
}

// ============================================================================
// Tests
// ============================================================================
