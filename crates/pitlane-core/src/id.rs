//! Identity types for Pitlane
//!
//! Session ids are handed out sequentially and never reused. Driver and lap
//! ids share a second counter seeded from the largest id found on load.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Session identity - one scheduled race
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl SessionId {
    pub const FIRST: SessionId = SessionId(1);

    #[inline]
    pub fn new(id: u64) -> Self {
        SessionId(id)
    }

    /// The id that follows this one
    #[inline]
    pub fn next(self) -> Self {
        SessionId(self.0 + 1)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Session({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Driver identity - unique across the process, scoped to one session
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverId(pub u64);

impl DriverId {
    #[inline]
    pub fn new(id: u64) -> Self {
        DriverId(id)
    }
}

impl fmt::Debug for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Driver({})", self.0)
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lap identity
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LapId(pub u64);

impl LapId {
    #[inline]
    pub fn new(id: u64) -> Self {
        LapId(id)
    }
}

impl fmt::Debug for LapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lap({})", self.0)
    }
}

/// Monotonic generator for driver and lap ids
#[derive(Clone, Debug)]
pub struct IdSequence {
    next: u64,
}

impl IdSequence {
    /// Start handing out ids strictly above `highest_seen`
    pub fn after(highest_seen: u64) -> Self {
        IdSequence {
            next: highest_seen + 1,
        }
    }

    pub fn next_driver(&mut self) -> DriverId {
        DriverId(self.bump())
    }

    pub fn next_lap(&mut self) -> LapId {
        LapId(self.bump())
    }

    fn bump(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

impl Default for IdSequence {
    fn default() -> Self {
        Self::after(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_next() {
        assert_eq!(SessionId::FIRST.next(), SessionId(2));
    }

    #[test]
    fn test_id_sequence_skips_seen() {
        let mut seq = IdSequence::after(41);
        assert_eq!(seq.next_driver(), DriverId(42));
        assert_eq!(seq.next_lap(), LapId(43));
        assert_eq!(seq.next_driver(), DriverId(44));
    }

    #[test]
    fn test_ids_serialize_as_plain_integers() {
        let json = serde_json::to_string(&(SessionId(3), DriverId(7))).unwrap();
        assert_eq!(json, "[3,7]");
    }
}
