//! Pitlane Runtime - race session authority
//!
//! This crate implements the single in-process authority for race state:
//! 1. Session CRUD and roster management
//! 2. Mode transitions (pending, flags, finished, ended)
//! 3. Race timers, including resume after a restart
//! 4. Lap recording with server-derived lap times
//! 5. Typed domain events for the display surfaces

pub mod config;
pub mod event;
pub mod service;

pub use config::*;
pub use event::*;
pub use service::*;
