//! Stream capture pipeline.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`classify()`] | URL → stream flag and [`StreamType`] |
//! | [`FingerprintScheme`] | Query-stripped duplicate key |
//! | [`CaptureState`] | Working set and badge |
//! | [`CaptureStore`] | Dedupe, retain, bound, persist |
//! | [`RequestObserver`] | Bridge event → store submission |
//! | [`StreamFilter`] | Display-side filtering |

// ============================================================================
// Submodules
// ============================================================================

/// URL classification rules.
pub mod classify;

/// Display-side filtering and formatting.
pub mod filter;

/// Duplicate-detection fingerprints.
pub mod fingerprint;

/// Request observer.
pub mod observer;

/// Captured stream records.
pub mod record;

/// In-memory working set and badge.
pub mod state;

/// Deduplicating, bounded capture store.
pub mod store;

// ============================================================================
// Re-exports
// ============================================================================

pub use classify::{Classification, StreamType, classify};
pub use filter::{StreamFilter, format_age};
pub use fingerprint::{Fingerprint, FingerprintScheme};
pub use observer::{Observation, ObservedRequest, RequestObserver, TabInfo, TabLookup};
pub use record::{SourceContext, StreamRecord};
pub use state::CaptureState;
pub use store::{CaptureStore, DEFAULT_CAPACITY, SubmitOutcome};
