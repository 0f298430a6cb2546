// ── Domain model ──

mod mode;
mod status;

pub use mode::{FanSpeed, LifecycleState, Mode, ModeCategory, WorkingMode};
pub use status::RobotStatus;
