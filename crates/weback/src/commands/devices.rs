//! Device command handlers.

use tabled::Tabled;
use weback_core::{Controller, DeviceSession, FanSpeed, WorkingMode};

use crate::cli::{DevicesArgs, DevicesCommand, FanSpeedArg, GlobalOpts};
use crate::error::CliError;
use crate::output::{self, paint};

use super::util::{self, DeviceView};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Thing")]
    thing_name: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    sub_type: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Battery")]
    battery: String,
    #[tabled(rename = "Online")]
    online: String,
}

impl DeviceRow {
    fn new(v: &DeviceView, color: bool) -> Self {
        Self {
            thing_name: v.thing_name.clone(),
            name: v.nickname.clone(),
            sub_type: v.sub_type.clone(),
            state: paint(v.state_label(), v.tone(), color),
            mode: v.mode.clone(),
            battery: v.battery_label(),
            online: if v.available { "yes" } else { "no" }.into(),
        }
    }
}

pub(crate) fn detail(v: &DeviceView, color: bool) -> String {
    let mut lines = vec![
        format!("Thing:    {}", v.thing_name),
        format!("Name:     {}", v.display_name()),
        format!("Type:     {}", v.sub_type),
        format!("State:    {}", paint(v.state_label(), v.tone(), color)),
        format!("Mode:     {}", v.mode),
        format!("Battery:  {}", v.battery_label()),
        format!("Fan:      {}", v.fan.as_deref().unwrap_or("-")),
        format!("Online:   {}", if v.available { "yes" } else { "no" }),
    ];
    if let Some(ref error) = v.error {
        lines.push(format!("Error:    {}", paint(error, output::Tone::Warn, color)));
    }
    if let Some(at) = v.updated_at {
        lines.push(format!("Updated:  {}", at.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    lines.join("\n")
}

fn print_device(device: &DeviceSession, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(global.color());
    let view = DeviceView::from(device);
    let out = output::render_single(
        global.output(),
        &view,
        |v| detail(v, color),
        |v| v.thing_name.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn sent(global: &GlobalOpts, what: &str, device: &DeviceSession) {
    if !global.quiet {
        eprintln!("{what} sent to {}", device.display_name());
    }
}

impl From<FanSpeedArg> for FanSpeed {
    fn from(arg: FanSpeedArg) -> Self {
        match arg {
            FanSpeedArg::Quiet => FanSpeed::Quiet,
            FanSpeedArg::Normal => FanSpeed::Normal,
            FanSpeedArg::Strong => FanSpeed::Strong,
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
pub async fn handle(controller: &Controller, args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        DevicesCommand::List => {
            let color = output::should_color(global.color());
            let views: Vec<DeviceView> = controller.devices().iter().map(DeviceView::from).collect();
            let out = output::render_list(
                global.output(),
                &views,
                |v| DeviceRow::new(v, color),
                |v| v.thing_name.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Get { device } => print_device(&controller.device(&device)?, global),

        DevicesCommand::Status { device, wait } => {
            let device = controller.device(&device)?;
            let wait = wait.as_deref().map(util::parse_wait).transpose()?;
            let mut updates = device.subscribe();
            device.refresh_status().await?;

            if let Some(wait) = wait {
                let bar = util::spinner("waiting for status", global.quiet);
                let pushed = tokio::time::timeout(wait, updates.changed()).await;
                bar.finish_and_clear();
                if !matches!(pushed, Ok(Some(_))) {
                    tracing::warn!(
                        thing = %device.thing_name(),
                        "no status push within {}, showing cached status",
                        humantime::format_duration(wait)
                    );
                }
            }
            print_device(&device, global)
        }

        DevicesCommand::Start { device } => {
            let device = controller.device(&device)?;
            device.start().await?;
            sent(global, "Start", &device);
            Ok(())
        }

        DevicesCommand::Pause { device } => {
            let device = controller.device(&device)?;
            device.pause().await?;
            sent(global, "Pause", &device);
            Ok(())
        }

        DevicesCommand::Stop { device } => {
            let device = controller.device(&device)?;
            device.stop().await?;
            sent(global, "Stop", &device);
            Ok(())
        }

        DevicesCommand::Dock { device } => {
            let device = controller.device(&device)?;
            device.return_to_base().await?;
            sent(global, "Return to dock", &device);
            Ok(())
        }

        DevicesCommand::Spot { device } => {
            let device = controller.device(&device)?;
            device.spot_clean().await?;
            sent(global, "Spot clean", &device);
            Ok(())
        }

        DevicesCommand::Locate { device } => {
            let device = controller.device(&device)?;
            device.locate().await?;
            sent(global, "Locate", &device);
            Ok(())
        }

        DevicesCommand::Fan { device, speed } => {
            let device = controller.device(&device)?;
            let speed = FanSpeed::from(speed);
            device.set_fan_speed(speed).await?;
            sent(global, &format!("Fan speed {speed}"), &device);
            Ok(())
        }

        DevicesCommand::Mode { device, mode } => {
            let parsed: WorkingMode = mode.parse().map_err(|_| CliError::Validation {
                field: "mode".into(),
                reason: format!("unknown working mode '{mode}'"),
            })?;
            let device = controller.device(&device)?;
            device.set_working_mode(parsed).await?;
            sent(global, &format!("Mode {parsed}"), &device);
            Ok(())
        }

        DevicesCommand::Goto { device, point } => {
            let point = util::parse_json_arg("point", &point)?;
            let device = controller.device(&device)?;
            device.goto_point(&point).await?;
            sent(global, "Go-to", &device);
            Ok(())
        }

        DevicesCommand::CleanRect { device, rect } => {
            let rect = util::parse_json_arg("rect", &rect)?;
            let device = controller.device(&device)?;
            device.clean_rect(&rect).await?;
            sent(global, "Zone clean", &device);
            Ok(())
        }
    }
}
