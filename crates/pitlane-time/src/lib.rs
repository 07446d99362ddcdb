//! Pitlane Time - Wall clock and race timing
//!
//! This crate implements:
//! - `Clock`: injectable wall clock (system or manual)
//! - `RaceTimer`: the per-race tick, finish deadline and pre-race countdown
//!   tasks, re-armable after a restart

pub mod clock;
pub mod scheduler;

pub use clock::*;
pub use scheduler::*;
