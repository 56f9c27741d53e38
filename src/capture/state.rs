//! In-memory capture state.
//!
//! Owns the duplicate-detection working set and the badge counter. One
//! instance lives for the whole host process and is shared by the
//! observer, store and message router.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tokio::sync::watch;
use tracing::debug;

use super::fingerprint::Fingerprint;

// ============================================================================
// CaptureState
// ============================================================================

/// Working set of seen fingerprints plus the visible badge text.
///
/// The badge mirrors the working-set size: empty string when the set is
/// empty, the decimal count otherwise.
pub struct CaptureState {
    /// Fingerprints seen since the last reset.
    working_set: Mutex<FxHashSet<Fingerprint>>,
    /// Badge text broadcast.
    badge: watch::Sender<String>,
}

impl Default for CaptureState {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureState {
    /// Creates an empty state with a blank badge.
    #[must_use]
    pub fn new() -> Self {
        let (badge, _) = watch::channel(String::new());
        Self {
            working_set: Mutex::new(FxHashSet::default()),
            badge,
        }
    }

    /// Adds a fingerprint to the working set and refreshes the badge.
    ///
    /// Returns the new working-set size, or `None` if the fingerprint was
    /// already present.
    pub fn insert(&self, fingerprint: Fingerprint) -> Option<usize> {
        let mut set = self.working_set.lock();
        if !set.insert(fingerprint) {
            return None;
        }

        let count = set.len();
        self.badge.send_replace(badge_text(count));
        Some(count)
    }

    /// Returns `true` if the fingerprint is in the working set.
    #[inline]
    #[must_use]
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.working_set.lock().contains(fingerprint)
    }

    /// Returns the working-set size.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.working_set.lock().len()
    }

    /// Returns `true` if nothing has been seen since the last reset.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.working_set.lock().is_empty()
    }

    /// Empties the working set and blanks the badge.
    pub fn reset(&self) {
        let mut set = self.working_set.lock();
        let dropped = set.len();
        set.clear();
        self.badge.send_replace(String::new());
        debug!(dropped, "Working set reset");
    }

    /// Returns the current badge text.
    #[inline]
    #[must_use]
    pub fn badge_text(&self) -> String {
        self.badge.borrow().clone()
    }

    /// Subscribes to badge changes.
    #[inline]
    #[must_use]
    pub fn subscribe_badge(&self) -> watch::Receiver<String> {
        self.badge.subscribe()
    }
}

/// Renders a working-set size as badge text.
#[inline]
#[must_use]
pub fn badge_text(count: usize) -> String {
    if count == 0 {
        String::new()
    } else {
        count.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::capture::fingerprint::FingerprintScheme;

    fn fp(url: &str) -> Fingerprint {
        FingerprintScheme::Sha256.fingerprint(url)
    }

    #[test]
    fn test_insert_counts_and_dedupes() {
        let state = CaptureState::new();
        assert_eq!(state.insert(fp("https://a/1.m3u8")), Some(1));
        assert_eq!(state.insert(fp("https://a/2.m3u8")), Some(2));
        assert_eq!(state.insert(fp("https://a/1.m3u8?t=9")), None);
        assert_eq!(state.len(), 2);
        assert_eq!(state.badge_text(), "2");
    }

    #[test]
    fn test_reset_blanks_badge() {
        let state = CaptureState::new();
        state.insert(fp("https://a/1.m3u8"));
        state.reset();

        assert!(state.is_empty());
        assert_eq!(state.badge_text(), "");
        assert!(!state.contains(&fp("https://a/1.m3u8")));
    }

    #[test]
    fn test_badge_text() {
        assert_eq!(badge_text(0), "");
        assert_eq!(badge_text(12), "12");
    }

    #[tokio::test]
    async fn test_badge_subscription_sees_changes() {
        let state = CaptureState::new();
        let mut rx = state.subscribe_badge();

        state.insert(fp("https://a/1.m3u8"));
        rx.changed().await.expect("badge changed");
        assert_eq!(*rx.borrow_and_update(), "1");

        state.reset();
        rx.changed().await.expect("badge changed");
        assert_eq!(*rx.borrow_and_update(), "");
    }
}
