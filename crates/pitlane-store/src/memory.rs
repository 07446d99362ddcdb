//! In-process snapshot store

use parking_lot::Mutex;
use pitlane_core::RaceSnapshot;

use crate::{SessionStore, StoreError, StoreResult};

/// Keeps the snapshot in memory; saves can be made to fail on demand
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<RaceSnapshot>>,
    fail_saves: Mutex<bool>,
    saves: Mutex<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot
    pub fn with_snapshot(snapshot: RaceSnapshot) -> Self {
        MemoryStore {
            snapshot: Mutex::new(Some(snapshot)),
            ..Self::default()
        }
    }

    /// Make every subsequent save fail (or succeed again)
    pub fn set_fail_saves(&self, fail: bool) {
        *self.fail_saves.lock() = fail;
    }

    /// Last successfully saved snapshot
    pub fn snapshot(&self) -> Option<RaceSnapshot> {
        self.snapshot.lock().clone()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> u64 {
        *self.saves.lock()
    }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> StoreResult<Option<RaceSnapshot>> {
        Ok(self.snapshot.lock().clone())
    }

    fn save(&self, snapshot: &RaceSnapshot) -> StoreResult<()> {
        if *self.fail_saves.lock() {
            return Err(StoreError::Unavailable("saves disabled".into()));
        }
        *self.snapshot.lock() = Some(snapshot.clone());
        *self.saves.lock() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.load().unwrap().is_none());

        store.save(&RaceSnapshot::empty()).unwrap();
        assert_eq!(store.load().unwrap(), Some(RaceSnapshot::empty()));
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_memory_store_failing_saves() {
        let store = MemoryStore::new();
        store.set_fail_saves(true);
        assert!(store.save(&RaceSnapshot::empty()).is_err());
        assert!(store.snapshot().is_none());
        assert_eq!(store.save_count(), 0);
    }
}
