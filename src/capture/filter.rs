//! Display-side filtering and formatting of captured streams.

// ============================================================================
// Imports
// ============================================================================

use chrono::{Local, TimeZone};
use rustc_hash::FxHashSet;

use super::classify::StreamType;
use super::fingerprint::strip_query;
use super::record::StreamRecord;

// ============================================================================
// StreamFilter
// ============================================================================

/// Filter applied by display surfaces before listing streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamFilter {
    /// Only keep records of this type.
    pub stream_type: Option<StreamType>,
    /// Keep only the first (newest) record per query-stripped URL.
    pub hide_duplicates: bool,
}

impl StreamFilter {
    /// Creates a filter that keeps everything.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stream_type: None,
            hide_duplicates: false,
        }
    }

    /// Restricts to one stream type.
    #[inline]
    #[must_use]
    pub fn with_type(mut self, stream_type: StreamType) -> Self {
        self.stream_type = Some(stream_type);
        self
    }

    /// Hides records whose query-stripped URL was already listed.
    #[inline]
    #[must_use]
    pub fn with_hide_duplicates(mut self) -> Self {
        self.hide_duplicates = true;
        self
    }

    /// Applies the filter, preserving order.
    #[must_use]
    pub fn apply<'a>(&self, streams: &'a [StreamRecord]) -> Vec<&'a StreamRecord> {
        let mut seen = FxHashSet::default();

        streams
            .iter()
            .filter(|s| self.stream_type.is_none_or(|t| s.stream_type == t))
            .filter(|s| !self.hide_duplicates || seen.insert(strip_query(&s.url)))
            .collect()
    }

    /// Message shown when the filtered list is empty.
    #[must_use]
    pub fn empty_message(&self, total: usize) -> String {
        if total > 0 {
            if let Some(t) = self.stream_type {
                return format!("No {} type streams found.", t.label());
            }
            if self.hide_duplicates {
                return "No streams found after removing duplicates.".to_string();
            }
        }
        "No captured streams yet.".to_string()
    }
}

// ============================================================================
// Formatting
// ============================================================================

/// Formats a capture timestamp relative to `now_ms`.
///
/// Under a minute is `Just now`, under an hour `N minutes ago`, under a
/// day `N hours ago`, otherwise local date and time.
#[must_use]
pub fn format_age(timestamp_ms: u64, now_ms: u64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);

    if diff < 60_000 {
        "Just now".to_string()
    } else if diff < 3_600_000 {
        format!("{} minutes ago", diff / 60_000)
    } else if diff < 86_400_000 {
        format!("{} hours ago", diff / 3_600_000)
    } else {
        i64::try_from(timestamp_ms)
            .ok()
            .and_then(|ms| Local.timestamp_millis_opt(ms).single())
            .map(|dt| dt.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string())
            .unwrap_or_else(|| timestamp_ms.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
