//! In-memory storage backend.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::capture::StreamRecord;
use crate::error::Result;

use super::{Storage, StoredState};

// ============================================================================
// MemoryStorage
// ============================================================================

/// Storage that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<StoredState>,
}

impl MemoryStorage {
    /// Creates empty storage (capture off, no streams).
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates storage pre-populated with `state`.
    #[inline]
    #[must_use]
    pub fn with_state(state: StoredState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Returns a copy of everything stored.
    #[must_use]
    pub fn snapshot(&self) -> StoredState {
        self.state.lock().clone()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn is_capturing(&self) -> Result<bool> {
        Ok(self.state.lock().is_capturing)
    }

    async fn set_capturing(&self, enabled: bool) -> Result<()> {
        self.state.lock().is_capturing = enabled;
        Ok(())
    }

    async fn streams(&self) -> Result<Vec<StreamRecord>> {
        Ok(self.state.lock().captured_streams.clone())
    }

    async fn set_streams(&self, streams: Vec<StreamRecord>) -> Result<()> {
        self.state.lock().captured_streams = streams;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let storage = MemoryStorage::new();
        assert!(!tokio_test::block_on(storage.is_capturing()).expect("read"));
        assert!(tokio_test::block_on(storage.streams()).expect("read").is_empty());
    }

    #[tokio::test]
    async fn test_reset_restores_defaults() {
        let storage = MemoryStorage::new();
        storage.set_capturing(true).await.expect("write");
        storage.reset().await.expect("reset");
        assert_eq!(storage.snapshot(), StoredState::default());
    }
}
