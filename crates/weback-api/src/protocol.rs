//! Stream protocol: outbound command messages and inbound notifications.
//!
//! Outbound messages are plain serde values; they are only turned into
//! text at the transport boundary. Location commands (go to point, clean
//! a rectangle) are a shadow update followed by a separate sync request --
//! the device ignores the location without the sync. Simple field updates
//! are a single shadow update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Open key/value status of a device, exactly as the cloud reports it.
pub type StatusBlob = serde_json::Map<String, Value>;

/// Status keys shared between the encoder and status readers.
pub mod keys {
    pub const WORKING_STATUS: &str = "working_status";
    pub const FAN_STATUS: &str = "fan_status";
    pub const BATTERY_LEVEL: &str = "battery_level";
    pub const CONNECTED: &str = "connected";
    pub const ERROR_INFO: &str = "error_info";
    pub const GOTO_POINT: &str = "goto_point";
    pub const VIRTUAL_RECT_INFO: &str = "virtual_rect_info";
}

const PLANNING_LOCATION: &str = "PlanningLocation";
const PLANNING_RECT: &str = "PlanningRect";

/// `notify_info` value of a device status push.
pub const STATUS_UPDATE_NOTIFY: &str = "thing_status_update";

// ── Outbound ────────────────────────────────────────────────────────

/// A single outbound stream message, tagged by its `opt` field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "opt")]
pub enum Message {
    /// Ask the cloud to push the device's current status.
    #[serde(rename = "thing_status_get")]
    StatusQuery { sub_type: String, thing_name: String },

    /// Shadow-style state update relayed to the device.
    #[serde(rename = "send_to_device")]
    ShadowUpdate {
        topic_name: String,
        sub_type: String,
        topic_payload: ShadowPayload,
        thing_name: String,
    },

    /// Make the device pick up a pending shadow change.
    #[serde(rename = "sync_thing")]
    Sync { sub_type: String, thing_name: String },
}

/// `topic_payload` of a shadow update: `{"state": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShadowPayload {
    pub state: StatusBlob,
}

impl Message {
    /// The device this message is addressed to.
    pub fn thing_name(&self) -> &str {
        match self {
            Self::StatusQuery { thing_name, .. }
            | Self::ShadowUpdate { thing_name, .. }
            | Self::Sync { thing_name, .. } => thing_name,
        }
    }

    /// Wire value of the `opt` field.
    pub fn opt(&self) -> &'static str {
        match self {
            Self::StatusQuery { .. } => "thing_status_get",
            Self::ShadowUpdate { .. } => "send_to_device",
            Self::Sync { .. } => "sync_thing",
        }
    }

    /// Serialize to the text frame sent on the stream.
    pub fn to_text(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

/// "Get current status" request.
pub fn status_query(thing_name: &str, sub_type: &str) -> Message {
    Message::StatusQuery {
        sub_type: sub_type.to_owned(),
        thing_name: thing_name.to_owned(),
    }
}

/// Single-field shadow update, e.g. `working_status` or `fan_status`.
pub fn set_field(thing_name: &str, sub_type: &str, key: &str, value: impl Into<Value>) -> Message {
    let mut state = StatusBlob::new();
    state.insert(key.to_owned(), value.into());
    shadow_update(thing_name, sub_type, state)
}

/// Navigate to `point`: planning-location update, then sync.
pub fn goto_point(thing_name: &str, sub_type: &str, point: &Value) -> (Message, Message) {
    location_command(thing_name, sub_type, PLANNING_LOCATION, keys::GOTO_POINT, point)
}

/// Clean the zone `rect`: planning-rect update, then sync.
pub fn clean_rect(thing_name: &str, sub_type: &str, rect: &Value) -> (Message, Message) {
    location_command(thing_name, sub_type, PLANNING_RECT, keys::VIRTUAL_RECT_INFO, rect)
}

fn location_command(
    thing_name: &str,
    sub_type: &str,
    mode: &str,
    key: &str,
    target: &Value,
) -> (Message, Message) {
    let mut state = StatusBlob::new();
    state.insert(keys::WORKING_STATUS.to_owned(), Value::from(mode));
    state.insert(key.to_owned(), target.clone());
    (
        shadow_update(thing_name, sub_type, state),
        sync(thing_name, sub_type),
    )
}

fn shadow_update(thing_name: &str, sub_type: &str, state: StatusBlob) -> Message {
    Message::ShadowUpdate {
        topic_name: format!("$aws/things/{thing_name}/shadow/update"),
        sub_type: sub_type.to_owned(),
        topic_payload: ShadowPayload { state },
        thing_name: thing_name.to_owned(),
    }
}

fn sync(thing_name: &str, sub_type: &str) -> Message {
    Message::Sync {
        sub_type: sub_type.to_owned(),
        thing_name: thing_name.to_owned(),
    }
}

// ── Inbound ─────────────────────────────────────────────────────────

/// A device status push received on the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    /// Device the update belongs to. `None` when the push did not say.
    pub thing_name: Option<String>,
    pub status: StatusBlob,
    pub received_at: DateTime<Utc>,
}

impl StatusUpdate {
    /// Whether this update should be applied to `thing_name`.
    ///
    /// Pushes without a device id are delivered to every device.
    pub fn is_for(&self, thing_name: &str) -> bool {
        self.thing_name.as_deref().is_none_or(|name| name == thing_name)
    }
}

#[derive(Deserialize)]
struct Notification {
    #[serde(default)]
    notify_info: Option<String>,
    #[serde(default)]
    thing_name: Option<String>,
    #[serde(default)]
    thing_status: Option<Value>,
}

/// Parse an inbound text frame.
///
/// Returns `Ok(None)` for well-formed frames that are not status pushes
/// and `Err(Error::Protocol)` for anything malformed.
pub fn parse_inbound(text: &str) -> Result<Option<StatusUpdate>, Error> {
    let note: Notification = serde_json::from_str(text).map_err(|e| Error::Protocol {
        message: format!("invalid stream payload: {e}"),
    })?;

    if note.notify_info.as_deref() != Some(STATUS_UPDATE_NOTIFY) {
        return Ok(None);
    }

    let status = match note.thing_status {
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(Error::Protocol {
                message: format!("thing_status is not an object: {other}"),
            });
        }
        None => {
            return Err(Error::Protocol {
                message: "status update without thing_status".into(),
            });
        }
    };

    let thing_name = note.thing_name.or_else(|| {
        status
            .get("thing_name")
            .and_then(Value::as_str)
            .map(String::from)
    });

    Ok(Some(StatusUpdate {
        thing_name,
        status,
        received_at: Utc::now(),
    }))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn status_query_wire_format() {
        let msg = serde_json::to_value(status_query("robot-1", "vacuum")).unwrap();
        assert_eq!(
            msg,
            json!({"opt": "thing_status_get", "sub_type": "vacuum", "thing_name": "robot-1"})
        );
    }

    #[test]
    fn set_field_wire_format() {
        let msg = serde_json::to_value(set_field("robot-1", "vacuum", "fan_status", "Strong")).unwrap();
        assert_eq!(
            msg,
            json!({
                "topic_name": "$aws/things/robot-1/shadow/update",
                "opt": "send_to_device",
                "sub_type": "vacuum",
                "topic_payload": {"state": {"fan_status": "Strong"}},
                "thing_name": "robot-1"
            })
        );
    }

    #[test]
    fn goto_point_is_update_then_sync() {
        let point = json!([1200, -350]);
        let (update, sync) = goto_point("robot-1", "vacuum", &point);

        assert_eq!(update.opt(), "send_to_device");
        assert_eq!(sync.opt(), "sync_thing");
        assert_eq!(
            serde_json::to_value(&update).unwrap()["topic_payload"]["state"],
            json!({"working_status": "PlanningLocation", "goto_point": [1200, -350]})
        );
        assert_eq!(
            serde_json::to_value(&sync).unwrap(),
            json!({"opt": "sync_thing", "sub_type": "vacuum", "thing_name": "robot-1"})
        );
    }

    #[test]
    fn clean_rect_is_update_then_sync() {
        let rect = json!({"x1": 0, "y1": 0, "x2": 500, "y2": 800});
        let (update, sync) = clean_rect("robot-1", "vacuum", &rect);

        assert_eq!(
            serde_json::to_value(&update).unwrap()["topic_payload"]["state"],
            json!({"working_status": "PlanningRect", "virtual_rect_info": rect})
        );
        assert_eq!(sync.opt(), "sync_thing");
        assert_eq!(sync.thing_name(), "robot-1");
    }

    #[test]
    fn payload_values_are_escaped() {
        let text = set_field("robot \"1\"", "vacuum", "working_status", "Auto'Clean")
            .to_text()
            .unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back["thing_name"], "robot \"1\"");
        assert_eq!(back["topic_payload"]["state"]["working_status"], "Auto'Clean");
    }

    #[test]
    fn parse_status_update() {
        let text = json!({
            "notify_info": "thing_status_update",
            "thing_name": "robot-1",
            "thing_status": {"working_status": "AutoClean", "battery_level": 87}
        })
        .to_string();

        let update = parse_inbound(&text).unwrap().unwrap();
        assert_eq!(update.thing_name.as_deref(), Some("robot-1"));
        assert_eq!(update.status["working_status"], "AutoClean");
        assert!(update.is_for("robot-1"));
        assert!(!update.is_for("robot-2"));
    }

    #[test]
    fn device_id_falls_back_to_status_body() {
        let text = json!({
            "notify_info": "thing_status_update",
            "thing_status": {"thing_name": "robot-9", "working_status": "Charging"}
        })
        .to_string();

        let update = parse_inbound(&text).unwrap().unwrap();
        assert_eq!(update.thing_name.as_deref(), Some("robot-9"));
    }

    #[test]
    fn update_without_device_id_is_for_everyone() {
        let text = json!({
            "notify_info": "thing_status_update",
            "thing_status": {"working_status": "Charging"}
        })
        .to_string();

        let update = parse_inbound(&text).unwrap().unwrap();
        assert!(update.thing_name.is_none());
        assert!(update.is_for("anything"));
    }

    #[test]
    fn other_notifications_are_ignored() {
        let text = json!({"notify_info": "thing_online", "thing_name": "robot-1"}).to_string();
        assert!(parse_inbound(&text).unwrap().is_none());

        let text = json!({"thing_status": {"working_status": "AutoClean"}}).to_string();
        assert!(parse_inbound(&text).unwrap().is_none());
    }

    #[test]
    fn malformed_payloads_are_protocol_errors() {
        assert!(matches!(parse_inbound("not json"), Err(Error::Protocol { .. })));
        assert!(matches!(parse_inbound("[1, 2]"), Err(Error::Protocol { .. })));

        let text = json!({"notify_info": "thing_status_update", "thing_status": "broken"}).to_string();
        assert!(matches!(parse_inbound(&text), Err(Error::Protocol { .. })));

        let text = json!({"notify_info": "thing_status_update"}).to_string();
        assert!(matches!(parse_inbound(&text), Err(Error::Protocol { .. })));
    }
}
