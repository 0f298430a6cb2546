// ── Working modes ──
//
// The vendor reports its state as a free-form `working_status` string.
// Known strings parse into `WorkingMode`; everything else is kept raw in
// `Mode::Other`. Classification into categories and lifecycle states is
// a total function over both.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// A recognised `working_status` value. Variant names are the wire strings.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
pub enum WorkingMode {
    // Cleaning
    AutoClean,
    EdgeClean,
    EdgeDetect,
    SpotClean,
    RoomClean,
    MopClean,
    SmartClean,
    ZmodeClean,
    DirectionControl,
    Relocation,
    PlanningLocation,
    PlanningRect,
    // Charging
    Charging,
    PileCharging,
    DirCharging,
    // Docked
    Hibernating,
    ChargeDone,
    // Idle
    Standby,
    BackCharging,
    LocationAlarm,
    // Error
    Malfunction,
}

impl WorkingMode {
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    pub fn category(self) -> ModeCategory {
        match self {
            Self::AutoClean
            | Self::EdgeClean
            | Self::EdgeDetect
            | Self::SpotClean
            | Self::RoomClean
            | Self::MopClean
            | Self::SmartClean
            | Self::ZmodeClean
            | Self::DirectionControl
            | Self::Relocation
            | Self::PlanningLocation
            | Self::PlanningRect => ModeCategory::Cleaning,
            Self::Charging | Self::PileCharging | Self::DirCharging => ModeCategory::Charging,
            Self::Hibernating | Self::ChargeDone => ModeCategory::Docked,
            Self::Standby | Self::BackCharging | Self::LocationAlarm => ModeCategory::Idle,
            Self::Malfunction => ModeCategory::Error,
        }
    }

    /// Coarse state for a generic vacuum front end.
    pub fn lifecycle(self) -> LifecycleState {
        match self {
            Self::AutoClean
            | Self::EdgeClean
            | Self::EdgeDetect
            | Self::SpotClean
            | Self::RoomClean
            | Self::MopClean
            | Self::SmartClean
            | Self::ZmodeClean
            | Self::DirectionControl
            | Self::Relocation
            | Self::PlanningLocation
            | Self::PlanningRect => LifecycleState::Cleaning,
            Self::Charging | Self::PileCharging | Self::DirCharging => LifecycleState::Docked,
            Self::Hibernating | Self::ChargeDone | Self::LocationAlarm => LifecycleState::Idle,
            Self::Standby => LifecycleState::Paused,
            Self::BackCharging => LifecycleState::Returning,
            Self::Malfunction => LifecycleState::Error,
        }
    }
}

/// Disjoint classification of every `working_status` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ModeCategory {
    Cleaning,
    Charging,
    Docked,
    Idle,
    Error,
}

impl ModeCategory {
    /// Classify a raw vendor string. Unknown strings are `Idle`.
    pub fn classify(raw: &str) -> Self {
        raw.parse::<WorkingMode>()
            .map_or(Self::Idle, WorkingMode::category)
    }
}

/// Generic vacuum lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    Cleaning,
    Returning,
    Paused,
    Docked,
    Error,
}

/// Current `working_status`, recognised or not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Mode {
    Known(WorkingMode),
    Other(String),
}

impl Mode {
    pub fn parse(raw: &str) -> Self {
        raw.parse().map_or_else(|_| Self::Other(raw.to_owned()), Self::Known)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(mode) => mode.as_str(),
            Self::Other(raw) => raw,
        }
    }

    pub fn known(&self) -> Option<WorkingMode> {
        match self {
            Self::Known(mode) => Some(*mode),
            Self::Other(_) => None,
        }
    }

    pub fn category(&self) -> ModeCategory {
        self.known().map_or(ModeCategory::Idle, WorkingMode::category)
    }

    /// `None` for strings we do not recognise.
    pub fn lifecycle(&self) -> Option<LifecycleState> {
        self.known().map(WorkingMode::lifecycle)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<WorkingMode> for Mode {
    fn from(mode: WorkingMode) -> Self {
        Self::Known(mode)
    }
}

// ── Fan speed ───────────────────────────────────────────────────────

/// Suction level (`fan_status`). `Pause` is reported but cannot be set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum FanSpeed {
    Quiet,
    Normal,
    Strong,
    Pause,
}

impl FanSpeed {
    /// Speeds a caller may request, low to high.
    pub const SETTABLE: [FanSpeed; 3] = [FanSpeed::Quiet, FanSpeed::Normal, FanSpeed::Strong];

    pub fn as_str(self) -> &'static str {
        self.into()
    }

    pub fn is_settable(self) -> bool {
        self != Self::Pause
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn wire_strings_round_trip() {
        for mode in WorkingMode::iter() {
            assert_eq!(mode.as_str().parse::<WorkingMode>().unwrap(), mode);
            assert_eq!(mode.to_string(), mode.as_str());
        }
    }

    #[test]
    fn classification_matches_vendor_sets() {
        let cleaning = [
            "AutoClean",
            "EdgeClean",
            "EdgeDetect",
            "SpotClean",
            "RoomClean",
            "MopClean",
            "SmartClean",
            "ZmodeClean",
            "DirectionControl",
            "Relocation",
            "PlanningLocation",
            "PlanningRect",
        ];
        for raw in cleaning {
            assert_eq!(ModeCategory::classify(raw), ModeCategory::Cleaning, "{raw}");
        }
        for raw in ["Charging", "PileCharging", "DirCharging"] {
            assert_eq!(ModeCategory::classify(raw), ModeCategory::Charging, "{raw}");
        }
        for raw in ["Hibernating", "ChargeDone"] {
            assert_eq!(ModeCategory::classify(raw), ModeCategory::Docked, "{raw}");
        }
        for raw in ["Standby", "BackCharging", "LocationAlarm"] {
            assert_eq!(ModeCategory::classify(raw), ModeCategory::Idle, "{raw}");
        }
        assert_eq!(ModeCategory::classify("Malfunction"), ModeCategory::Error);
    }

    #[test]
    fn unknown_strings_are_idle_without_lifecycle() {
        for raw in ["", "autoclean", "TurboMode", "Standby "] {
            assert_eq!(ModeCategory::classify(raw), ModeCategory::Idle, "{raw:?}");
            let mode = Mode::parse(raw);
            assert_eq!(mode, Mode::Other(raw.to_owned()));
            assert_eq!(mode.lifecycle(), None);
            assert_eq!(mode.as_str(), raw);
        }
    }

    #[test]
    fn lifecycle_mapping() {
        assert_eq!(WorkingMode::AutoClean.lifecycle(), LifecycleState::Cleaning);
        assert_eq!(WorkingMode::PlanningRect.lifecycle(), LifecycleState::Cleaning);
        assert_eq!(WorkingMode::PileCharging.lifecycle(), LifecycleState::Docked);
        assert_eq!(WorkingMode::Hibernating.lifecycle(), LifecycleState::Idle);
        assert_eq!(WorkingMode::ChargeDone.lifecycle(), LifecycleState::Idle);
        assert_eq!(WorkingMode::Standby.lifecycle(), LifecycleState::Paused);
        assert_eq!(WorkingMode::BackCharging.lifecycle(), LifecycleState::Returning);
        assert_eq!(WorkingMode::LocationAlarm.lifecycle(), LifecycleState::Idle);
        assert_eq!(WorkingMode::Malfunction.lifecycle(), LifecycleState::Error);
    }

    #[test]
    fn fan_speed_parsing() {
        assert_eq!("quiet".parse::<FanSpeed>().unwrap(), FanSpeed::Quiet);
        assert_eq!("Strong".parse::<FanSpeed>().unwrap(), FanSpeed::Strong);
        assert_eq!(FanSpeed::Normal.as_str(), "Normal");
        assert!("Turbo".parse::<FanSpeed>().is_err());
        assert!(!FanSpeed::Pause.is_settable());
        assert!(FanSpeed::SETTABLE.iter().all(|s| s.is_settable()));
    }
}
