//! Pitlane Transport - the broadcaster edge
//!
//! Display and control surfaces connect over WebSocket, one socket per
//! channel. This crate:
//! 1. Checks role credentials before a protected channel is opened
//! 2. Decodes commands and runs them against the race service
//! 3. Fans race events out to the channels that display them
//! 4. Hosts the axum server and its configuration

pub mod channel;
pub mod command;
pub mod config;
pub mod gate;
pub mod server;

pub use channel::*;
pub use command::*;
pub use config::*;
pub use gate::*;
pub use server::*;
