//! Persisted race state
//!
//! The whole state is written after every mutating command and read back once
//! at startup. No schema version, no incremental writes.

use serde::{Deserialize, Serialize};

use crate::{Session, SessionId};

/// Full snapshot of race control state
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceSnapshot {
    /// All sessions in creation order
    pub sessions: Vec<Session>,
    pub current_session_id: Option<SessionId>,
    pub next_session_id: SessionId,
}

impl RaceSnapshot {
    /// Initial state when nothing has been persisted yet
    pub fn empty() -> Self {
        RaceSnapshot {
            sessions: Vec::new(),
            current_session_id: None,
            next_session_id: SessionId::FIRST,
        }
    }

    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// The session the current-session pointer refers to
    pub fn current(&self) -> Option<&Session> {
        self.current_session_id.and_then(|id| self.session(id))
    }

    pub fn current_mut(&mut self) -> Option<&mut Session> {
        let id = self.current_session_id?;
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    /// Earliest pending session by creation order
    pub fn next_pending(&self) -> Option<&Session> {
        self.sessions.iter().find(|s| s.is_pending())
    }

    pub fn pending(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter().filter(|s| s.is_pending())
    }

    /// Largest driver or lap id in the snapshot, 0 if there is none
    pub fn highest_entity_id(&self) -> u64 {
        self.sessions
            .iter()
            .flat_map(|s| {
                s.drivers
                    .iter()
                    .map(|d| d.id.0)
                    .chain(s.laps.iter().map(|l| l.id.0))
            })
            .max()
            .unwrap_or(0)
    }
}

impl Default for RaceSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DriverId, LapId, Lap, RaceMode, Timestamp};

    #[test]
    fn test_snapshot_json_shape() {
        let mut session = Session::new(SessionId(1));
        session.add_driver(DriverId(4), "Al", 8).unwrap();
        let snapshot = RaceSnapshot {
            sessions: vec![session],
            current_session_id: Some(SessionId(1)),
            next_session_id: SessionId(2),
        };

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["currentSessionId"], 1);
        assert_eq!(value["nextSessionId"], 2);
        assert_eq!(value["sessions"][0]["mode"], "pending");
        assert_eq!(value["sessions"][0]["startTime"], serde_json::Value::Null);
        assert_eq!(value["sessions"][0]["drivers"][0]["lastLapMark"], 0.0);
        assert_eq!(value["sessions"][0]["cars"][0]["carNumber"], 1);
    }

    #[test]
    fn test_snapshot_without_archived_flag_loads() {
        let json = r#"{
            "sessions": [{
                "id": 3, "mode": "danger", "drivers": [], "cars": [], "laps": [],
                "startTime": 1000, "endTime": 2000
            }],
            "currentSessionId": null,
            "nextSessionId": 4
        }"#;
        let snapshot: RaceSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.sessions[0].mode, RaceMode::Danger);
        assert!(!snapshot.sessions[0].archived);
        assert_eq!(snapshot.current_session_id, None);
    }

    #[test]
    fn test_current_and_next_pending() {
        let mut first = Session::new(SessionId(1));
        first.mode = RaceMode::Finished;
        let snapshot = RaceSnapshot {
            sessions: vec![first, Session::new(SessionId(2)), Session::new(SessionId(3))],
            current_session_id: Some(SessionId(3)),
            next_session_id: SessionId(4),
        };
        assert_eq!(snapshot.current().unwrap().id, SessionId(3));
        assert_eq!(snapshot.next_pending().unwrap().id, SessionId(2));
        assert_eq!(snapshot.pending().count(), 2);
    }

    #[test]
    fn test_dangling_current_pointer() {
        let snapshot = RaceSnapshot {
            sessions: vec![],
            current_session_id: Some(SessionId(9)),
            next_session_id: SessionId(10),
        };
        assert!(snapshot.current().is_none());
    }

    #[test]
    fn test_highest_entity_id() {
        let mut session = Session::new(SessionId(1));
        session.add_driver(DriverId(7), "Al", 8).unwrap();
        session.laps.push(Lap {
            id: LapId(12),
            driver_id: DriverId(7),
            lap_time: 30.0,
            timestamp: Timestamp::from_secs(5),
        });
        let snapshot = RaceSnapshot {
            sessions: vec![session],
            current_session_id: None,
            next_session_id: SessionId(2),
        };
        assert_eq!(snapshot.highest_entity_id(), 12);
        assert_eq!(RaceSnapshot::empty().highest_entity_id(), 0);
    }
}
