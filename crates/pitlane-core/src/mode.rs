//! Session mode graph
//!
//! ```text
//! pending -> safe <-> hazard <-> danger -> finished -> danger (ended)
//! ```
//!
//! `danger` is overloaded: it is both the red race flag and the mode a session
//! is archived in by `end_session`. Display surfaces key off the literal string,
//! so the overload is kept on the wire. `Session::archived` tells the two apart.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::RaceError;

/// Current stage or flag of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaceMode {
    /// Created, roster still editable
    #[default]
    Pending,
    /// Green flag, laps are recorded
    Safe,
    /// Yellow flag
    Hazard,
    /// Red flag, or archived after `end_session`
    Danger,
    /// Chequered flag, timers stopped
    Finished,
}

impl RaceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RaceMode::Pending => "pending",
            RaceMode::Safe => "safe",
            RaceMode::Hazard => "hazard",
            RaceMode::Danger => "danger",
            RaceMode::Finished => "finished",
        }
    }

    /// Is this one of the lateral race flags?
    #[inline]
    pub fn is_flag(self) -> bool {
        matches!(self, RaceMode::Safe | RaceMode::Hazard | RaceMode::Danger)
    }
}

impl fmt::Display for RaceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A race-control request to change the flag
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeRequest {
    /// Switch to safe, hazard or danger
    Flag(RaceMode),
    /// "finish" - same as finishing the session
    Finish,
}

impl FromStr for ModeRequest {
    type Err = RaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "safe" => Ok(ModeRequest::Flag(RaceMode::Safe)),
            "hazard" => Ok(ModeRequest::Flag(RaceMode::Hazard)),
            "danger" => Ok(ModeRequest::Flag(RaceMode::Danger)),
            "finish" => Ok(ModeRequest::Finish),
            _ => Err(RaceError::UnknownMode(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_request_case_insensitive() {
        assert_eq!(
            "Hazard".parse::<ModeRequest>().unwrap(),
            ModeRequest::Flag(RaceMode::Hazard)
        );
        assert_eq!("FINISH".parse::<ModeRequest>().unwrap(), ModeRequest::Finish);
    }

    #[test]
    fn test_mode_request_rejects_non_flags() {
        assert!("pending".parse::<ModeRequest>().is_err());
        assert!("finished".parse::<ModeRequest>().is_err());
        assert!("checkered".parse::<ModeRequest>().is_err());
    }

    #[test]
    fn test_mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&RaceMode::Hazard).unwrap(), "\"hazard\"");
        let mode: RaceMode = serde_json::from_str("\"finished\"").unwrap();
        assert_eq!(mode, RaceMode::Finished);
    }

    #[test]
    fn test_flags() {
        assert!(RaceMode::Safe.is_flag());
        assert!(RaceMode::Danger.is_flag());
        assert!(!RaceMode::Pending.is_flag());
        assert!(!RaceMode::Finished.is_flag());
    }
}
