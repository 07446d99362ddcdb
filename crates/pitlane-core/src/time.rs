//! Wall-clock primitives
//!
//! Session start/end marks and lap timestamps are wall-clock instants so they
//! survive a process restart. Stored as milliseconds since the Unix epoch.

use std::fmt;
use std::ops::Add;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const EPOCH: Timestamp = Timestamp(0);

    #[inline]
    pub fn from_millis(millis: u64) -> Self {
        Timestamp(millis)
    }

    #[inline]
    pub fn from_secs(secs: u64) -> Self {
        Timestamp(secs * 1000)
    }

    #[inline]
    pub fn as_millis(self) -> u64 {
        self.0
    }

    /// Signed seconds elapsed since `earlier`.
    /// Negative when `earlier` lies in the future (clock skew); never clamped.
    #[inline]
    pub fn seconds_since(self, earlier: Timestamp) -> f64 {
        (self.0 as i128 - earlier.0 as i128) as f64 / 1000.0
    }

    /// Time elapsed since `earlier`, zero if `earlier` is in the future
    #[inline]
    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }

    #[inline]
    pub fn saturating_sub(self, duration: Duration) -> Self {
        Timestamp(self.0.saturating_sub(duration.as_millis() as u64))
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        Timestamp(self.0 + rhs.as_millis() as u64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}ms)", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_since() {
        let start = Timestamp::from_secs(100);
        let later = start + Duration::from_millis(22_500);
        assert_eq!(later.seconds_since(start), 22.5);
    }

    #[test]
    fn test_seconds_since_negative_under_skew() {
        let start = Timestamp::from_secs(100);
        let earlier = Timestamp::from_secs(98);
        assert_eq!(earlier.seconds_since(start), -2.0);
    }

    #[test]
    fn test_saturating_duration_since() {
        let start = Timestamp::from_secs(10);
        assert_eq!(
            Timestamp::from_secs(15).saturating_duration_since(start),
            Duration::from_secs(5)
        );
        assert_eq!(
            Timestamp::from_secs(5).saturating_duration_since(start),
            Duration::ZERO
        );
    }
}
