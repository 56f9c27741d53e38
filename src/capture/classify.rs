//! URL classification.
//!
//! Decides whether a request URL is stream-related and which kind of
//! stream resource it points at.
//!
//! # Rules
//!
//! A URL is stream-related when any of these case-insensitive patterns
//! match: `.m3u8`, `.mpd`, `.ts` at the end, `.m4s` at the end, `.mp4`,
//! `/hls/`, `/dash/`, `/manifest`, `workers.dev`.
//!
//! The type is chosen by the first matching rule:
//!
//! | Rule | Type |
//! |------|------|
//! | `master.m3u8` or `playlist.m3u8` | [`StreamType::MasterM3u8`] |
//! | `.m3u8` | [`StreamType::VariantM3u8`] |
//! | `.ts` | [`StreamType::TsSegment`] |
//! | `.m4s` | [`StreamType::M4sSegment`] |
//! | `.mpd` | [`StreamType::DashManifest`] |
//! | `workers.dev` | [`StreamType::CloudflareWorkers`] |
//! | otherwise | [`StreamType::Other`] |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Patterns
// ============================================================================

/// Edge-function host suffix treated as a stream source.
pub const WORKERS_DOMAIN: &str = "workers.dev";

static STREAM_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)\.m3u8",
        r"(?i)\.mpd",
        r"(?i)\.ts$",
        r"(?i)\.m4s$",
        r"(?i)\.mp4",
        r"(?i)/hls/",
        r"(?i)/dash/",
        r"(?i)/manifest",
        r"(?i)workers\.dev",
    ])
    .expect("stream patterns are valid")
});

static PLAYLIST_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)playlist\.m3u8").expect("playlist pattern is valid"));

// ============================================================================
// StreamType
// ============================================================================

/// Kind of stream resource a URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamType {
    /// Top-level HLS playlist listing variants.
    #[serde(rename = "master-m3u8")]
    MasterM3u8,
    /// HLS media playlist for a single rendition.
    #[serde(rename = "variant-m3u8")]
    VariantM3u8,
    /// MPEG-TS media segment.
    #[serde(rename = "ts-segment")]
    TsSegment,
    /// Fragmented MP4 media segment.
    #[serde(rename = "m4s-segment")]
    M4sSegment,
    /// DASH MPD manifest.
    #[serde(rename = "dash-manifest")]
    DashManifest,
    /// Resource served from an edge-function host.
    #[serde(rename = "cloudflare-workers")]
    CloudflareWorkers,
    /// Stream-related but none of the above.
    #[serde(rename = "other")]
    Other,
}

impl StreamType {
    /// Every variant, in classification priority order.
    pub const ALL: [StreamType; 7] = [
        Self::MasterM3u8,
        Self::VariantM3u8,
        Self::TsSegment,
        Self::M4sSegment,
        Self::DashManifest,
        Self::CloudflareWorkers,
        Self::Other,
    ];

    /// Returns the wire name (`master-m3u8`, ...).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MasterM3u8 => "master-m3u8",
            Self::VariantM3u8 => "variant-m3u8",
            Self::TsSegment => "ts-segment",
            Self::M4sSegment => "m4s-segment",
            Self::DashManifest => "dash-manifest",
            Self::CloudflareWorkers => "cloudflare-workers",
            Self::Other => "other",
        }
    }

    /// Returns the human-readable label shown by display surfaces.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::MasterM3u8 => "Master M3U8",
            Self::VariantM3u8 => "Variant M3U8",
            Self::TsSegment => "TS Segment",
            Self::M4sSegment => "M4S Segment",
            Self::DashManifest => "DASH",
            Self::CloudflareWorkers => "CF Workers",
            Self::Other => "Other",
        }
    }

    /// Returns `true` if records of this type are persisted.
    #[inline]
    #[must_use]
    pub const fn is_retained(&self) -> bool {
        matches!(
            self,
            Self::MasterM3u8 | Self::VariantM3u8 | Self::CloudflareWorkers
        )
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::invalid_argument(format!("unknown stream type: {s}")))
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Result of classifying a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Whether any stream pattern matched.
    pub is_stream: bool,
    /// Type chosen by the first matching rule.
    pub stream_type: StreamType,
}

/// Classifies a URL.
#[must_use]
pub fn classify(url: &str) -> Classification {
    Classification {
        is_stream: is_stream_url(url),
        stream_type: stream_type(url),
    }
}

/// Returns `true` if any stream pattern matches the URL.
#[inline]
#[must_use]
pub fn is_stream_url(url: &str) -> bool {
    STREAM_PATTERNS.is_match(url)
}

/// Picks the stream type for a URL, first matching rule wins.
#[must_use]
pub fn stream_type(url: &str) -> StreamType {
    if url.contains("master.m3u8") || PLAYLIST_PATTERN.is_match(url) {
        StreamType::MasterM3u8
    } else if url.contains(".m3u8") {
        StreamType::VariantM3u8
    } else if url.contains(".ts") {
        StreamType::TsSegment
    } else if url.contains(".m4s") {
        StreamType::M4sSegment
    } else if url.contains(".mpd") {
        StreamType::DashManifest
    } else if url.contains(WORKERS_DOMAIN) {
        StreamType::CloudflareWorkers
    } else {
        StreamType::Other
    }
}

// ============================================================================
// Tests
// ============================================================================
