//! Pitlane Store - persisted race state
//!
//! The store loads one snapshot at startup and overwrites it after every
//! mutating command. Last write wins; there are no transactions.

pub mod file;
pub mod memory;

pub use file::{JsonFileStore, DEFAULT_STATE_FILE};
pub use memory::MemoryStore;

use pitlane_core::RaceSnapshot;
use thiserror::Error;

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Load-at-startup / save-after-mutation contract
pub trait SessionStore: Send + Sync {
    /// Read the last saved snapshot, `None` if nothing was saved yet
    fn load(&self) -> StoreResult<Option<RaceSnapshot>>;

    /// Replace the saved snapshot
    fn save(&self, snapshot: &RaceSnapshot) -> StoreResult<()>;
}
