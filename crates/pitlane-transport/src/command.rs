//! Inbound commands and their replies

use pitlane_core::{DriverId, RaceError, SessionId};
use pitlane_runtime::RaceService;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Channel;

/// A command sent by a control surface as `{"command": "...", ...}`
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "command")]
pub enum Command {
    #[serde(rename = "session:create")]
    CreateSession,

    #[serde(rename = "session:switch", rename_all = "camelCase")]
    SwitchSession { session_id: SessionId },

    #[serde(rename = "session:delete", rename_all = "camelCase")]
    DeleteSession { session_id: SessionId },

    #[serde(rename = "driver:add")]
    AddDriver { name: String },

    #[serde(rename = "driver:remove")]
    RemoveDriver { name: String },

    #[serde(rename = "driver:edit", rename_all = "camelCase")]
    EditDriver { driver_id: DriverId, new_name: String },

    #[serde(rename = "car:assign", rename_all = "camelCase")]
    AssignCar { driver_id: DriverId, car_number: u32 },

    /// `lapTime` is the client's own measurement
    #[serde(rename = "lap:record", rename_all = "camelCase")]
    RecordLap {
        driver_id: DriverId,
        #[serde(default)]
        lap_time: Option<f64>,
    },

    #[serde(rename = "session:start")]
    StartSession,

    #[serde(rename = "session:finish")]
    FinishSession,

    #[serde(rename = "session:end")]
    EndSession,

    #[serde(rename = "mode:change")]
    ChangeMode { mode: String },

    #[serde(rename = "countdown:start")]
    StartCountdown {
        #[serde(default)]
        seconds: Option<u64>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateSession => "session:create",
            Command::SwitchSession { .. } => "session:switch",
            Command::DeleteSession { .. } => "session:delete",
            Command::AddDriver { .. } => "driver:add",
            Command::RemoveDriver { .. } => "driver:remove",
            Command::EditDriver { .. } => "driver:edit",
            Command::AssignCar { .. } => "car:assign",
            Command::RecordLap { .. } => "lap:record",
            Command::StartSession => "session:start",
            Command::FinishSession => "session:finish",
            Command::EndSession => "session:end",
            Command::ChangeMode { .. } => "mode:change",
            Command::StartCountdown { .. } => "countdown:start",
        }
    }

    /// The only channel this command is accepted on
    pub fn channel(&self) -> Channel {
        match self {
            Command::CreateSession
            | Command::SwitchSession { .. }
            | Command::DeleteSession { .. }
            | Command::AddDriver { .. }
            | Command::RemoveDriver { .. }
            | Command::EditDriver { .. }
            | Command::AssignCar { .. } => Channel::FrontDesk,
            Command::RecordLap { .. } => Channel::LapLineTracker,
            Command::StartSession
            | Command::FinishSession
            | Command::EndSession
            | Command::ChangeMode { .. }
            | Command::StartCountdown { .. } => Channel::RaceControl,
        }
    }
}

/// Reply to one command: `{success: true, ...}` or `{success: false, error}`
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Reply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Reply {
    pub fn ok() -> Self {
        Reply {
            success: true,
            error: None,
            data: Map::new(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Reply {
            success: false,
            error: Some(error.into()),
            data: Map::new(),
        }
    }

    /// Attach a payload field. A payload that cannot be encoded turns the
    /// reply into a failure.
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.data.insert(key.to_string(), value);
                self
            }
            Err(e) => {
                tracing::error!(field = key, error = %e, "failed to encode reply payload");
                Reply::failed(format!("Failed to encode {key}"))
            }
        }
    }
}

impl From<RaceError> for Reply {
    fn from(err: RaceError) -> Self {
        Reply::failed(err.to_string())
    }
}

/// Run a command against the race service
pub fn dispatch(service: &RaceService, command: Command) -> Reply {
    let result = match command {
        Command::CreateSession => service
            .create_session()
            .map(|s| Reply::ok().with("session", s)),
        Command::SwitchSession { session_id } => service
            .set_current_session(session_id)
            .map(|s| Reply::ok().with("session", s)),
        Command::DeleteSession { session_id } => service
            .delete_session(session_id)
            .map(|s| Reply::ok().with("session", s)),
        Command::AddDriver { name } => service
            .add_driver(&name)
            .map(|d| Reply::ok().with("driver", d)),
        Command::RemoveDriver { name } => match service.remove_driver(&name) {
            Ok(Some(driver)) => Ok(Reply::ok().with("driver", driver)),
            Ok(None) => Ok(Reply::failed("Driver not found")),
            Err(e) => Err(e),
        },
        Command::EditDriver {
            driver_id,
            new_name,
        } => service
            .edit_driver(driver_id, &new_name)
            .map(|d| Reply::ok().with("driver", d)),
        Command::AssignCar {
            driver_id,
            car_number,
        } => service
            .assign_car(driver_id, car_number)
            .map(|c| Reply::ok().with("car", c)),
        Command::RecordLap {
            driver_id,
            lap_time,
        } => service
            .record_lap(driver_id, lap_time)
            .map(|lap| Reply::ok().with("lap", lap)),
        Command::StartSession => service
            .start_session()
            .map(|s| Reply::ok().with("session", s)),
        Command::FinishSession => service
            .finish_session()
            .map(|s| Reply::ok().with("session", s)),
        Command::EndSession => service
            .end_session()
            .map(|s| Reply::ok().with("session", s)),
        Command::ChangeMode { mode } => service
            .set_race_mode(&mode)
            .map(|m| Reply::ok().with("mode", m)),
        Command::StartCountdown { seconds } => service
            .start_countdown(seconds)
            .map(|s| Reply::ok().with("seconds", s)),
    };
    result.unwrap_or_else(Reply::from)
}

/// Decode, check ownership and dispatch one text frame from `channel`
pub fn handle_text(channel: Channel, service: &RaceService, text: &str) -> Reply {
    let command: Command = match serde_json::from_str(text) {
        Ok(command) => command,
        Err(e) => {
            tracing::debug!(channel = %channel, error = %e, "undecodable command");
            return Reply::failed(format!("Invalid command: {e}"));
        }
    };
    if command.channel() != channel {
        tracing::warn!(channel = %channel, command = command.name(), "command sent on wrong channel");
        return Reply::failed(format!("{} is not accepted on {}", command.name(), channel));
    }

    let name = command.name();
    let reply = dispatch(service, command);
    if let Some(error) = &reply.error {
        tracing::info!(channel = %channel, command = name, error = %error, "command rejected");
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitlane_runtime::RaceConfig;
    use pitlane_store::MemoryStore;
    use pitlane_time::ManualClock;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn service() -> (Arc<RaceService>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let service = RaceService::open(
            RaceConfig::default(),
            Arc::new(MemoryStore::new()),
            clock.clone(),
        );
        (service, clock)
    }

    fn reply_json(reply: &Reply) -> Value {
        serde_json::to_value(reply).unwrap()
    }

    #[test]
    fn test_decode_commands() {
        let cmd: Command = serde_json::from_str(r#"{"command":"session:create"}"#).unwrap();
        assert_eq!(cmd, Command::CreateSession);

        let cmd: Command =
            serde_json::from_str(r#"{"command":"car:assign","driverId":3,"carNumber":7}"#).unwrap();
        assert_eq!(
            cmd,
            Command::AssignCar {
                driver_id: DriverId(3),
                car_number: 7
            }
        );

        let cmd: Command =
            serde_json::from_str(r#"{"command":"lap:record","driverId":2,"lapTime":31.4}"#).unwrap();
        assert_eq!(
            cmd,
            Command::RecordLap {
                driver_id: DriverId(2),
                lap_time: Some(31.4)
            }
        );

        let cmd: Command = serde_json::from_str(r#"{"command":"countdown:start"}"#).unwrap();
        assert_eq!(cmd, Command::StartCountdown { seconds: None });

        assert!(serde_json::from_str::<Command>(r#"{"command":"driver:add"}"#).is_err());
        assert!(serde_json::from_str::<Command>(r#"{"command":"pit:stop"}"#).is_err());
    }

    #[test]
    fn test_reply_shape() {
        let json = reply_json(&Reply::ok().with("mode", "safe"));
        assert_eq!(json, json!({"success": true, "mode": "safe"}));

        let json = reply_json(&Reply::from(RaceError::RosterLocked));
        assert_eq!(
            json,
            json!({"success": false, "error": "Cannot modify drivers during race"})
        );
    }

    #[test]
    fn test_unencodable_payload_fails_reply() {
        let mut payload = std::collections::BTreeMap::new();
        payload.insert(vec![1u8], 1u8);
        let reply = Reply::ok().with("mode", "safe").with("bad", payload);
        assert_eq!(reply, Reply::failed("Failed to encode bad"));
    }

    #[test]
    fn test_front_desk_flow() {
        let (service, _) = service();
        let reply = handle_text(Channel::FrontDesk, &service, r#"{"command":"session:create"}"#);
        assert!(reply.success);
        assert_eq!(reply.data["session"]["id"], 1);

        let reply = handle_text(
            Channel::FrontDesk,
            &service,
            r#"{"command":"driver:add","name":"Al"}"#,
        );
        assert!(reply.success);

        let reply = handle_text(
            Channel::FrontDesk,
            &service,
            r#"{"command":"driver:add","name":"Al"}"#,
        );
        assert_eq!(reply.error.as_deref(), Some("Driver already exists"));

        let reply = handle_text(
            Channel::FrontDesk,
            &service,
            r#"{"command":"driver:remove","name":"Zed"}"#,
        );
        assert_eq!(reply, Reply::failed("Driver not found"));
    }

    #[test]
    fn test_command_rejected_on_wrong_channel() {
        let (service, _) = service();
        let reply = handle_text(Channel::RaceFlags, &service, r#"{"command":"session:create"}"#);
        assert!(!reply.success);
        assert!(service.sessions().is_empty());

        let reply = handle_text(Channel::FrontDesk, &service, r#"{"command":"session:start"}"#);
        assert_eq!(
            reply.error.as_deref(),
            Some("session:start is not accepted on front-desk")
        );
    }

    #[test]
    fn test_lap_record_reply() {
        let (service, clock) = service();
        service.create_session().unwrap();
        let al = service.add_driver("Al").unwrap();
        handle_text(Channel::RaceControl, &service, r#"{"command":"session:start"}"#);
        clock.advance(Duration::from_secs(42));

        let frame = json!({"command": "lap:record", "driverId": al.id, "lapTime": 41.9}).to_string();
        let reply = handle_text(Channel::LapLineTracker, &service, &frame);
        let json = reply_json(&reply);
        assert_eq!(json["success"], true);
        assert_eq!(json["lap"]["lapTime"], 42.0);
        assert_eq!(json["lap"]["driverId"], json!(al.id));
    }

    #[test]
    fn test_mode_change_and_finish() {
        let (service, _) = service();
        let reply = handle_text(
            Channel::RaceControl,
            &service,
            r#"{"command":"mode:change","mode":"hazard"}"#,
        );
        assert_eq!(reply.error.as_deref(), Some("No active session"));

        service.create_session().unwrap();
        dispatch(&service, Command::StartSession);
        let reply = dispatch(
            &service,
            Command::ChangeMode {
                mode: "hazard".into(),
            },
        );
        assert_eq!(reply.data["mode"], "hazard");

        let reply = dispatch(&service, Command::FinishSession);
        assert_eq!(reply.data["session"]["mode"], "finished");
        let reply = dispatch(&service, Command::FinishSession);
        assert!(reply.success);
        assert!(reply.data["session"].is_null());
    }
}
