//! Command dispatch: bridges CLI args to device sessions and output formatting.

pub mod config_cmd;
pub mod devices;
pub mod util;
pub mod watch;

use weback_core::Controller;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a cloud-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Devices(args) => devices::handle(controller, args, global).await,
        Command::Watch(args) => watch::handle(controller, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "local command reached cloud dispatch".into(),
        )),
    }
}
