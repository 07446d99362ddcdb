//! Domain events raised by race control

use pitlane_core::{Car, Driver, Lap, RaceMode, Session};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Something display surfaces may want to react to
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum RaceEvent {
    SessionCreated(Session),
    SessionSwitched(Session),
    SessionDeleted(Session),
    SessionStarted(Session),
    SessionFinished(Session),
    /// The session was archived; its mode reads `danger`
    SessionEnded(Session),
    /// Earliest pending session after a change, if any
    NextSessionUpdated(Option<Session>),
    DriverAdded(Driver),
    DriverRemoved(Driver),
    DriverEdited(Driver),
    CarAssigned(Car),
    LapRecorded(Lap),
    RaceModeChanged(RaceMode),
    /// Seconds left in the running race
    TimerUpdate(u64),
    /// Seconds left before the race starts
    CountdownTick(u64),
}

impl RaceEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            RaceEvent::SessionCreated(_) => "sessionCreated",
            RaceEvent::SessionSwitched(_) => "sessionSwitched",
            RaceEvent::SessionDeleted(_) => "sessionDeleted",
            RaceEvent::SessionStarted(_) => "sessionStarted",
            RaceEvent::SessionFinished(_) => "sessionFinished",
            RaceEvent::SessionEnded(_) => "sessionEnded",
            RaceEvent::NextSessionUpdated(_) => "nextSessionUpdated",
            RaceEvent::DriverAdded(_) => "driverAdded",
            RaceEvent::DriverRemoved(_) => "driverRemoved",
            RaceEvent::DriverEdited(_) => "driverEdited",
            RaceEvent::CarAssigned(_) => "carAssigned",
            RaceEvent::LapRecorded(_) => "lapRecorded",
            RaceEvent::RaceModeChanged(_) => "raceModeChanged",
            RaceEvent::TimerUpdate(_) => "timerUpdate",
            RaceEvent::CountdownTick(_) => "countdownTick",
        }
    }
}

/// Event receiver handed to subscribers
pub type EventReceiver = broadcast::Receiver<RaceEvent>;

/// Bounded fan-out of race events
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<RaceEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        EventBus { sender }
    }

    /// Never blocks; an event with no subscribers is dropped
    pub fn publish(&self, event: RaceEvent) {
        tracing::trace!(event = event.name(), "publish");
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
