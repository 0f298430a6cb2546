//! Shared helpers for command handlers.

use std::time::Duration;

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::Value;
use weback_core::{DeviceSession, LifecycleState};

use crate::error::CliError;
use crate::output::Tone;

/// Serializable view of one robot, shared by `devices` and `watch`.
#[derive(Debug, Serialize)]
pub struct DeviceView {
    pub thing_name: String,
    pub nickname: String,
    pub sub_type: String,
    pub mode: String,
    pub state: Option<LifecycleState>,
    pub battery: Option<u8>,
    pub fan: Option<String>,
    pub available: bool,
    pub error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&DeviceSession> for DeviceView {
    fn from(device: &DeviceSession) -> Self {
        let mode = device.current_mode();
        let status = device.status();
        Self {
            thing_name: device.thing_name().to_owned(),
            nickname: device.descriptor().thing_nickname.clone(),
            sub_type: device.sub_type().to_owned(),
            state: mode.lifecycle(),
            mode: mode.to_string(),
            battery: status.battery_level(),
            fan: status.raw_fan_status().map(str::to_owned),
            available: status.is_connected(),
            error: status.error_info(),
            updated_at: status.updated_at(),
        }
    }
}

impl DeviceView {
    pub fn display_name(&self) -> &str {
        if self.nickname.is_empty() {
            &self.thing_name
        } else {
            &self.nickname
        }
    }

    pub fn state_label(&self) -> &'static str {
        self.state.map_or("unknown", <&'static str>::from)
    }

    pub fn tone(&self) -> Tone {
        match self.state {
            Some(LifecycleState::Cleaning | LifecycleState::Returning) => Tone::Busy,
            Some(LifecycleState::Docked | LifecycleState::Idle) => Tone::Good,
            Some(LifecycleState::Error) => Tone::Warn,
            Some(LifecycleState::Paused) | None => Tone::Muted,
        }
    }

    pub fn battery_label(&self) -> String {
        self.battery.map_or_else(|| "-".into(), |b| format!("{b}%"))
    }
}

/// Parse a JSON command argument (point or rectangle).
pub fn parse_json_arg(field: &str, raw: &str) -> Result<Value, CliError> {
    serde_json::from_str(raw).map_err(|e| CliError::Validation {
        field: field.into(),
        reason: format!("invalid JSON: {e}"),
    })
}

/// Parse a human duration such as `5s` or `1m 30s`.
pub fn parse_wait(raw: &str) -> Result<Duration, CliError> {
    humantime::parse_duration(raw).map_err(|e| CliError::Validation {
        field: "wait".into(),
        reason: e.to_string(),
    })
}

/// Spinner on stderr; hidden in quiet mode.
pub fn spinner(message: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_owned());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_accepts_human_durations() {
        assert_eq!(parse_wait("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_wait("1m 30s").unwrap(), Duration::from_secs(90));
        assert!(matches!(parse_wait("soon"), Err(CliError::Validation { .. })));
    }

    #[test]
    fn json_args_are_checked() {
        assert_eq!(
            parse_json_arg("point", r#"{"x": 1, "y": 2}"#).unwrap(),
            serde_json::json!({"x": 1, "y": 2})
        );
        match parse_json_arg("point", "{x: 1}") {
            Err(CliError::Validation { field, .. }) => assert_eq!(field, "point"),
            other => panic!("expected Validation, got {other:?}"),
        }
    }
}
