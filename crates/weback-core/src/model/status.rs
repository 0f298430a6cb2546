// ── Robot status ──
//
// Typed reads over the open status blob. The blob itself is kept exactly
// as the cloud sent it; every accessor tolerates missing or oddly typed
// values.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use weback_api::protocol::keys;
use weback_api::{StatusBlob, StatusUpdate};

use super::mode::{FanSpeed, Mode, WorkingMode};

/// Battery level assumed while the device has not reported anything.
const DEFAULT_BATTERY_LEVEL: u8 = 100;

/// Snapshot of one device's status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RobotStatus {
    blob: StatusBlob,
    updated_at: Option<DateTime<Utc>>,
}

impl RobotStatus {
    /// Wrap a blob as-is (e.g. the bootstrap status from the device list).
    pub fn new(blob: StatusBlob) -> Self {
        Self {
            blob,
            updated_at: None,
        }
    }

    /// Status carried by a stream push. Replaces the previous blob wholesale.
    pub fn from_update(update: &StatusUpdate) -> Self {
        Self {
            blob: update.status.clone(),
            updated_at: Some(update.received_at),
        }
    }

    pub fn blob(&self) -> &StatusBlob {
        &self.blob
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.blob.get(key)
    }

    /// When the last stream push arrived. `None` for list-time status.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Raw `working_status`, if present and a string.
    pub fn raw_mode(&self) -> Option<&str> {
        self.get(keys::WORKING_STATUS).and_then(Value::as_str)
    }

    /// Whether the device has never reported a working mode.
    pub fn is_uninitialized(&self) -> bool {
        self.raw_mode().is_none()
    }

    /// Fill in the "idle, not reported yet" defaults.
    ///
    /// Only applies when `working_status` is missing: sets it to
    /// `Hibernating`, and `battery_level` / `fan_status` to 100 / `Normal`
    /// if those are missing too. Returns whether anything changed.
    pub fn ensure_defaults(&mut self) -> bool {
        if !self.is_uninitialized() {
            return false;
        }
        self.blob.insert(
            keys::WORKING_STATUS.to_owned(),
            Value::from(WorkingMode::Hibernating.as_str()),
        );
        self.blob
            .entry(keys::BATTERY_LEVEL)
            .or_insert_with(|| Value::from(DEFAULT_BATTERY_LEVEL));
        self.blob
            .entry(keys::FAN_STATUS)
            .or_insert_with(|| Value::from(FanSpeed::Normal.as_str()));
        true
    }

    /// Current mode; an unreported mode reads as `Hibernating`.
    pub fn mode(&self) -> Mode {
        self.raw_mode()
            .map_or(Mode::Known(WorkingMode::Hibernating), Mode::parse)
    }

    /// Battery percentage, from a number or a numeric string. Clamped to 100.
    pub fn battery_level(&self) -> Option<u8> {
        let level = match self.get(keys::BATTERY_LEVEL)? {
            Value::Number(n) => n.as_u64()?,
            Value::String(s) => s.trim().parse::<u64>().ok()?,
            _ => return None,
        };
        u8::try_from(level.min(100)).ok()
    }

    /// Raw `fan_status` string.
    pub fn raw_fan_status(&self) -> Option<&str> {
        self.get(keys::FAN_STATUS).and_then(Value::as_str)
    }

    pub fn fan_speed(&self) -> Option<FanSpeed> {
        self.raw_fan_status()?.parse().ok()
    }

    /// Cloud-side connectivity flag: `"true"` or `true`.
    pub fn is_connected(&self) -> bool {
        match self.get(keys::CONNECTED) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true",
            _ => false,
        }
    }

    /// Vendor error text, if any.
    pub fn error_info(&self) -> Option<String> {
        match self.get(keys::ERROR_INFO)? {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::LifecycleState;

    fn status(value: Value) -> RobotStatus {
        match value {
            Value::Object(blob) => RobotStatus::new(blob),
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn missing_mode_gets_idle_defaults() {
        let mut s = status(json!({"connected": "true"}));
        assert!(s.is_uninitialized());
        assert_eq!(s.mode(), Mode::Known(WorkingMode::Hibernating));

        assert!(s.ensure_defaults());
        assert_eq!(s.raw_mode(), Some("Hibernating"));
        assert_eq!(s.battery_level(), Some(100));
        assert_eq!(s.fan_speed(), Some(FanSpeed::Normal));
        assert_eq!(s.mode().lifecycle(), Some(LifecycleState::Idle));

        // Defaults stick: a second pass is a no-op
        assert!(!s.ensure_defaults());
    }

    #[test]
    fn defaults_keep_reported_fields() {
        let mut s = status(json!({"battery_level": 42, "fan_status": "Strong"}));
        s.ensure_defaults();
        assert_eq!(s.raw_mode(), Some("Hibernating"));
        assert_eq!(s.battery_level(), Some(42));
        assert_eq!(s.fan_speed(), Some(FanSpeed::Strong));
    }

    #[test]
    fn reported_mode_is_left_alone() {
        let mut s = status(json!({"working_status": "AutoClean"}));
        assert!(!s.ensure_defaults());
        assert_eq!(s.battery_level(), None);
        assert_eq!(s.mode(), Mode::Known(WorkingMode::AutoClean));
    }

    #[test]
    fn battery_level_formats() {
        assert_eq!(status(json!({"battery_level": 87})).battery_level(), Some(87));
        assert_eq!(status(json!({"battery_level": "64"})).battery_level(), Some(64));
        assert_eq!(status(json!({"battery_level": 250})).battery_level(), Some(100));
        assert_eq!(status(json!({"battery_level": "full"})).battery_level(), None);
        assert_eq!(status(json!({"battery_level": -5})).battery_level(), None);
    }

    #[test]
    fn connected_flag() {
        assert!(status(json!({"connected": "true"})).is_connected());
        assert!(status(json!({"connected": true})).is_connected());
        assert!(!status(json!({"connected": "false"})).is_connected());
        assert!(!status(json!({})).is_connected());
    }

    #[test]
    fn error_info_variants() {
        assert_eq!(status(json!({})).error_info(), None);
        assert_eq!(status(json!({"error_info": ""})).error_info(), None);
        assert_eq!(
            status(json!({"error_info": "WheelStuck"})).error_info().as_deref(),
            Some("WheelStuck")
        );
        assert_eq!(
            status(json!({"error_info": {"code": 3}})).error_info().as_deref(),
            Some(r#"{"code":3}"#)
        );
    }

    #[test]
    fn update_replaces_blob() {
        let update = StatusUpdate {
            thing_name: Some("robot-1".into()),
            status: json!({"working_status": "Charging"}).as_object().unwrap().clone(),
            received_at: Utc::now(),
        };
        let s = RobotStatus::from_update(&update);
        assert_eq!(s.raw_mode(), Some("Charging"));
        assert_eq!(s.updated_at(), Some(update.received_at));
        assert!(s.get("battery_level").is_none());
    }
}
