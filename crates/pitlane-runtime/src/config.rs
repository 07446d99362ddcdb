//! Race control configuration

use std::time::Duration;

/// Race control configuration
#[derive(Clone, Debug, PartialEq)]
pub struct RaceConfig {
    /// Length of a race from start to automatic finish
    pub race_duration: Duration,
    /// Default length of the pre-race countdown, in seconds
    pub countdown_seconds: u64,
    /// Maximum number of sessions waiting to race
    pub max_pending_sessions: usize,
    /// Maximum number of drivers in one session
    pub max_drivers: usize,
    /// Events buffered per subscriber before it starts lagging
    pub event_capacity: usize,
}

impl Default for RaceConfig {
    fn default() -> Self {
        RaceConfig {
            race_duration: Duration::from_secs(600),
            countdown_seconds: 5,
            max_pending_sessions: 4,
            max_drivers: 8,
            event_capacity: 256,
        }
    }
}

impl RaceConfig {
    /// One-minute races for trying things out at the track
    pub fn development() -> Self {
        RaceConfig {
            race_duration: Duration::from_secs(60),
            ..Self::default()
        }
    }

    pub fn with_race_duration(mut self, duration: Duration) -> Self {
        self.race_duration = duration;
        self
    }
}
