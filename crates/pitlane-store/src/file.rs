//! JSON file snapshot store

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use pitlane_core::RaceSnapshot;

use crate::{SessionStore, StoreResult};

/// Default snapshot location, relative to the working directory
pub const DEFAULT_STATE_FILE: &str = "race-state.json";

/// Snapshot kept as pretty-printed JSON in a single file
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Default for JsonFileStore {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_FILE)
    }
}

impl SessionStore for JsonFileStore {
    fn load(&self) -> StoreResult<Option<RaceSnapshot>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot = serde_json::from_str(&contents)?;
        tracing::debug!(path = %self.path.display(), "snapshot loaded");
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &RaceSnapshot) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(snapshot)?;
        let temp = self.temp_path();
        fs::write(&temp, json)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitlane_core::{DriverId, RaceMode, Session, SessionId};

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("pitlane-store-{}-{}", std::process::id(), name))
            .join("race-state.json")
    }

    #[test]
    fn test_missing_file_loads_none() {
        let store = JsonFileStore::new(scratch_path("missing"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let path = scratch_path("roundtrip");
        let store = JsonFileStore::new(&path);

        let mut session = Session::new(SessionId(1));
        session.add_driver(DriverId(1), "Al", 8).unwrap();
        session.mode = RaceMode::Hazard;
        let snapshot = RaceSnapshot {
            sessions: vec![session],
            current_session_id: Some(SessionId(1)),
            next_session_id: SessionId(2),
        };

        store.save(&snapshot).unwrap();
        assert_eq!(store.load().unwrap(), Some(snapshot));
        assert!(!store.temp_path().exists());

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let path = scratch_path("corrupt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(crate::StoreError::Json(_))));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
