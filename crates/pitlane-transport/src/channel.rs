//! Display channels and event fan-out
//!
//! Each surface listens on one channel. `route` turns a race event into the
//! messages each channel shows; `initial_view` is what a surface gets on
//! connect so it can render before the next event.

use std::fmt;
use std::str::FromStr;

use pitlane_core::{RaceMode, Session};
use pitlane_runtime::{RaceEvent, RaceService};
use serde::Serialize;
use serde_json::{json, Value};

use crate::Role;

/// Broadcaster channels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    FrontDesk,
    RaceControl,
    LapLineTracker,
    NextRace,
    LeaderBoard,
    RaceFlags,
    RaceCountdown,
}

impl Channel {
    pub const ALL: [Channel; 7] = [
        Channel::FrontDesk,
        Channel::RaceControl,
        Channel::LapLineTracker,
        Channel::NextRace,
        Channel::LeaderBoard,
        Channel::RaceFlags,
        Channel::RaceCountdown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::FrontDesk => "front-desk",
            Channel::RaceControl => "race-control",
            Channel::LapLineTracker => "lap-line-tracker",
            Channel::NextRace => "next-race",
            Channel::LeaderBoard => "leader-board",
            Channel::RaceFlags => "race-flags",
            Channel::RaceCountdown => "race-countdown",
        }
    }

    /// Role a connection must prove, `None` for public displays
    pub fn required_role(self) -> Option<Role> {
        match self {
            Channel::FrontDesk => Some(Role::Receptionist),
            Channel::RaceControl => Some(Role::Safety),
            Channel::LapLineTracker => Some(Role::Observer),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or(())
    }
}

/// One message pushed to a channel
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChannelMessage {
    pub event: &'static str,
    pub data: Value,
}

impl ChannelMessage {
    pub fn new(event: &'static str, data: Value) -> Self {
        ChannelMessage { event, data }
    }
}

/// A message addressed to one channel
pub type Delivery = (Channel, ChannelMessage);

/// Messages each channel should receive for `event`
pub fn route(event: &RaceEvent, service: &RaceService) -> Vec<Delivery> {
    let name = event.name();
    match event {
        RaceEvent::SessionCreated(_)
        | RaceEvent::SessionSwitched(_)
        | RaceEvent::SessionDeleted(_) => {
            vec![(Channel::FrontDesk, front_desk_update(service, Some(name)))]
        }
        RaceEvent::DriverAdded(_)
        | RaceEvent::DriverRemoved(_)
        | RaceEvent::DriverEdited(_)
        | RaceEvent::CarAssigned(_) => vec![
            (Channel::FrontDesk, front_desk_update(service, Some(name))),
            (Channel::NextRace, next_race_update(service, service.next_session())),
        ],
        RaceEvent::SessionStarted(session) | RaceEvent::SessionFinished(session) => vec![
            (Channel::FrontDesk, front_desk_update(service, Some(name))),
            (
                Channel::RaceControl,
                race_control_update(service, Some(name), Some(session.clone())),
            ),
            (Channel::LapLineTracker, lap_line_update(Some(session.clone()))),
            (
                Channel::LeaderBoard,
                leaderboard_update(service, Some(session.clone())),
            ),
        ],
        RaceEvent::SessionEnded(_) => vec![
            (Channel::FrontDesk, front_desk_update(service, Some(name))),
            (
                Channel::RaceControl,
                race_control_update(service, Some(name), service.current_session()),
            ),
            (Channel::LapLineTracker, lap_line_update(None)),
            (
                Channel::LeaderBoard,
                leaderboard_update(service, service.current_session()),
            ),
        ],
        RaceEvent::NextSessionUpdated(next) => {
            vec![(Channel::NextRace, next_race_update(service, next.clone()))]
        }
        RaceEvent::LapRecorded(_) => vec![(
            Channel::LeaderBoard,
            leaderboard_update(service, service.current_session()),
        )],
        RaceEvent::RaceModeChanged(mode) => vec![
            (Channel::RaceFlags, mode_message(*mode)),
            (Channel::RaceControl, mode_message(*mode)),
            (Channel::LeaderBoard, mode_message(*mode)),
            (
                Channel::LeaderBoard,
                leaderboard_update(service, service.current_session()),
            ),
        ],
        RaceEvent::TimerUpdate(remaining) => vec![
            (Channel::LeaderBoard, ChannelMessage::new("timerUpdate", json!(remaining))),
            (Channel::RaceCountdown, ChannelMessage::new("timerTick", json!(remaining))),
        ],
        RaceEvent::CountdownTick(remaining) => vec![
            (Channel::RaceCountdown, ChannelMessage::new("countdownTick", json!(remaining))),
            (Channel::RaceControl, ChannelMessage::new("countdownTick", json!(remaining))),
        ],
    }
}

/// What a channel shows right after connecting
pub fn initial_view(channel: Channel, service: &RaceService) -> Vec<ChannelMessage> {
    let live = service.current_session().filter(Session::is_live);
    match channel {
        Channel::FrontDesk => vec![front_desk_update(service, None)],
        Channel::RaceControl => vec![race_control_update(service, None, live)],
        Channel::LapLineTracker => vec![lap_line_update(live)],
        Channel::NextRace => vec![next_race_update(service, service.next_session())],
        Channel::LeaderBoard => vec![leaderboard_update(service, service.current_session())],
        // Flags read safe until a race says otherwise
        Channel::RaceFlags => vec![mode_message(
            service
                .race_mode()
                .filter(|m| *m != RaceMode::Pending)
                .unwrap_or(RaceMode::Safe),
        )],
        Channel::RaceCountdown => Vec::new(),
    }
}

fn front_desk_update(service: &RaceService, last_event: Option<&'static str>) -> ChannelMessage {
    let current = service.current_session().filter(Session::is_pending);
    let mut data = json!({
        "currentSession": current,
        "allSessions": service.pending_sessions(),
        "nextSession": service.next_session(),
    });
    if let Some(last_event) = last_event {
        data["lastEvent"] = json!(last_event);
    }
    ChannelMessage::new("state:update", data)
}

fn race_control_update(
    service: &RaceService,
    last_event: Option<&'static str>,
    current: Option<Session>,
) -> ChannelMessage {
    let mut data = json!({
        "currentSession": current,
        "nextSession": service.next_session(),
    });
    if let Some(last_event) = last_event {
        data["lastEvent"] = json!(last_event);
    }
    ChannelMessage::new("state:update", data)
}

fn lap_line_update(current: Option<Session>) -> ChannelMessage {
    ChannelMessage::new("state:update", json!({ "currentSession": current }))
}

fn next_race_update(service: &RaceService, next: Option<Session>) -> ChannelMessage {
    ChannelMessage::new(
        "nextRace:update",
        json!({
            "session": next,
            "hasSessions": !service.sessions().is_empty(),
        }),
    )
}

fn leaderboard_update(service: &RaceService, session: Option<Session>) -> ChannelMessage {
    ChannelMessage::new(
        "leaderboardUpdated",
        json!({
            "leaderboard": service.leaderboard(),
            "session": session,
        }),
    )
}

fn mode_message(mode: RaceMode) -> ChannelMessage {
    ChannelMessage::new("raceModeChanged", json!(mode.as_str()))
}
