//! Pitlane Core - Fundamental race types and primitives
//!
//! This crate defines the types shared by every Pitlane component:
//! - Identifiers (SessionId, DriverId, LapId)
//! - Wall-clock timestamps
//! - The race data model (Session, Driver, Car, Lap) and mode graph
//! - The error taxonomy surfaced to callers
//! - The persisted snapshot and the leaderboard calculator

pub mod id;
pub mod time;
pub mod mode;
pub mod session;
pub mod snapshot;
pub mod leaderboard;
pub mod error;

pub use id::*;
pub use time::*;
pub use mode::*;
pub use session::*;
pub use snapshot::*;
pub use leaderboard::*;
pub use error::*;
