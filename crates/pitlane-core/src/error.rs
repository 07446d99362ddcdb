//! Error types for Pitlane race control

use thiserror::Error;

use crate::{DriverId, SessionId};

/// Broad class of a rejected command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or missing argument
    Validation,
    /// Command not valid in the current mode, or no current session
    Precondition,
    /// Unknown session or driver
    NotFound,
    /// Roster or session limit reached
    Capacity,
}

/// Race control errors
///
/// Messages are shown verbatim on the front desk and race control screens.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RaceError {
    // Validation errors
    #[error("Driver name cannot be empty")]
    EmptyDriverName,

    #[error("Car number must be positive")]
    InvalidCarNumber,

    #[error("Unknown race mode: {0}")]
    UnknownMode(String),

    #[error("Driver already exists")]
    DuplicateDriver,

    #[error("Car number already assigned to another driver")]
    CarNumberTaken,

    // Precondition errors
    #[error("No active session")]
    NoActiveSession,

    #[error("No pending session")]
    NoPendingSession,

    #[error("Cannot modify drivers during race")]
    RosterLocked,

    #[error("Cannot assign cars during race")]
    CarsLocked,

    #[error("Race not started")]
    RaceNotStarted,

    #[error("Race already in progress in session {0}")]
    RaceInProgress(SessionId),

    #[error("Race mode cannot be changed after finish")]
    RaceOver,

    #[error("Race timers are not running")]
    TimersUnavailable,

    // Not found errors
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Driver not found: {0}")]
    DriverNotFound(DriverId),

    // Capacity errors
    #[error("Maximum of {0} upcoming sessions allowed")]
    TooManyPendingSessions(usize),

    #[error("Max {0} drivers in a session")]
    SessionFull(usize),
}

impl RaceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RaceError::EmptyDriverName
            | RaceError::InvalidCarNumber
            | RaceError::UnknownMode(_)
            | RaceError::DuplicateDriver
            | RaceError::CarNumberTaken => ErrorKind::Validation,

            RaceError::NoActiveSession
            | RaceError::NoPendingSession
            | RaceError::RosterLocked
            | RaceError::CarsLocked
            | RaceError::RaceNotStarted
            | RaceError::RaceInProgress(_)
            | RaceError::RaceOver
            | RaceError::TimersUnavailable => ErrorKind::Precondition,

            RaceError::SessionNotFound(_) | RaceError::DriverNotFound(_) => ErrorKind::NotFound,

            RaceError::TooManyPendingSessions(_) | RaceError::SessionFull(_) => {
                ErrorKind::Capacity
            }
        }
    }
}

/// Result type for race control operations
pub type RaceResult<T> = Result<T, RaceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(RaceError::EmptyDriverName.kind(), ErrorKind::Validation);
        assert_eq!(RaceError::RosterLocked.kind(), ErrorKind::Precondition);
        assert_eq!(RaceError::TimersUnavailable.kind(), ErrorKind::Precondition);
        assert_eq!(
            RaceError::SessionNotFound(SessionId(9)).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(RaceError::SessionFull(8).kind(), ErrorKind::Capacity);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            RaceError::RosterLocked.to_string(),
            "Cannot modify drivers during race"
        );
        assert_eq!(
            RaceError::TooManyPendingSessions(4).to_string(),
            "Maximum of 4 upcoming sessions allowed"
        );
    }
}
