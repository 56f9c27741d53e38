//! Captured stream records.

// ============================================================================
// Imports
// ============================================================================

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::identifiers::TabId;

use super::classify::StreamType;

// ============================================================================
// SourceContext
// ============================================================================

/// Originating tab of a detected request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceContext {
    /// Tab that issued the request.
    pub tab_id: TabId,

    /// Tab address at detection time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_url: Option<String>,

    /// Tab title at detection time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_title: Option<String>,
}

// ============================================================================
// StreamRecord
// ============================================================================

/// One detected stream URL occurrence.
///
/// Records are immutable once built; the store only inserts, reads and
/// deletes them.
///
/// # Format
///
/// ```json
/// {
///   "url": "https://cdn.example.com/master.m3u8",
///   "type": "master-m3u8",
///   "timestamp": 1700000000000,
///   "tabId": 3,
///   "method": "GET",
///   "tabUrl": "https://example.com/watch",
///   "tabTitle": "Example"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecord {
    /// Full observed URL.
    pub url: String,

    /// Classified stream type.
    #[serde(rename = "type")]
    pub stream_type: StreamType,

    /// Capture instant in milliseconds since the Unix epoch.
    pub timestamp: u64,

    /// HTTP method of the originating request.
    pub method: String,

    /// Originating tab.
    #[serde(flatten)]
    pub source: SourceContext,
}

impl StreamRecord {
    /// Builds a record stamped with the current time.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        stream_type: StreamType,
        method: impl Into<String>,
        source: SourceContext,
    ) -> Self {
        Self {
            url: url.into(),
            stream_type,
            timestamp: now_millis(),
            method: method.into(),
            source,
        }
    }

    /// Replaces the capture instant.
    #[inline]
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns the tab title, or `"Unknown"` when it was not resolved.
    #[inline]
    #[must_use]
    pub fn title_or_unknown(&self) -> &str {
        self.source.tab_title.as_deref().unwrap_or("Unknown")
    }
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceContext {
        SourceContext {
            tab_id: TabId::new(3).expect("valid tab id"),
            tab_url: Some("https://example.com/watch".into()),
            tab_title: Some("Example".into()),
        }
    }

    #[test]
    fn test_record_wire_shape() {
        let mut record = StreamRecord::new(
            "https://cdn.example.com/master.m3u8",
            StreamType::MasterM3u8,
            "GET",
            source(),
        );
        record.timestamp = 1_700_000_000_000;

        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["type"], "master-m3u8");
        assert_eq!(value["tabId"], 3);
        assert_eq!(value["tabUrl"], "https://example.com/watch");
        assert_eq!(value["tabTitle"], "Example");
        assert_eq!(value["timestamp"], 1_700_000_000_000u64);
    }

    #[test]
    fn test_record_parses_without_tab_metadata() {
        let json_str = r#"{
            "url": "https://x.workers.dev/a",
            "type": "cloudflare-workers",
            "timestamp": 1,
            "tabId": 9,
            "method": "POST"
        }"#;

        let record: StreamRecord = serde_json::from_str(json_str).expect("parse");
        assert_eq!(record.stream_type, StreamType::CloudflareWorkers);
        assert_eq!(record.source.tab_url, None);
        assert_eq!(record.title_or_unknown(), "Unknown");
    }

    #[test]
    fn test_new_stamps_time() {
        let record = StreamRecord::new("u", StreamType::Other, "GET", source());
        assert!(record.timestamp > 0);
    }
}
