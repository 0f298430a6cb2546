//! `weback watch`: print status pushes as they arrive.

use chrono::Local;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use tokio_stream::wrappers::WatchStream;
use weback_core::{ConnectionState, Controller, DeviceSession};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output::{self, Tone, paint};

use super::util::DeviceView;

pub async fn handle(controller: &Controller, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let devices: Vec<DeviceSession> = match args.device {
        Some(ref id) => vec![controller.device(id)?],
        None => controller.devices().iter().cloned().collect(),
    };
    if devices.is_empty() {
        if !global.quiet {
            eprintln!("No robots on this account");
        }
        return Ok(());
    }

    // Subscribe before asking for fresh status so the answers are not missed.
    let updates: Vec<BoxStream<'static, DeviceSession>> = devices
        .iter()
        .map(|device| {
            let device = device.clone();
            device
                .subscribe()
                .into_stream()
                .map(move |_| device.clone())
                .boxed()
        })
        .collect();
    let mut updates = stream::select_all(updates);
    let mut links = WatchStream::from_changes(controller.watch_connection_state()?);

    for device in &devices {
        if let Err(e) = device.refresh_status().await {
            tracing::warn!(thing = %device.thing_name(), error = %e, "status refresh not sent");
        }
    }

    let color = output::should_color(global.color());
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            biased;
            _ = &mut ctrl_c => break,
            next = updates.next() => match next {
                Some(device) => {
                    let line = format_update(global.output(), &DeviceView::from(&device), color)?;
                    output::print_output(&line, global.quiet);
                }
                None => break,
            },
            Some(state) = links.next() => {
                tracing::info!(%state, "stream state changed");
                // Status lines own stdout; link changes go to stderr
                if !global.quiet {
                    eprintln!("{}", format_link_change(state, color));
                }
            }
        }
    }
    Ok(())
}

fn format_link_change(state: ConnectionState, color: bool) -> String {
    let tone = match state {
        ConnectionState::Open => Tone::Good,
        ConnectionState::Connecting => Tone::Busy,
        ConnectionState::Error => Tone::Warn,
        ConnectionState::Closed => Tone::Muted,
    };
    format!(
        "{}  stream {}",
        Local::now().format("%H:%M:%S"),
        paint(&state.to_string(), tone, color)
    )
}

fn format_update(format: OutputFormat, view: &DeviceView, color: bool) -> Result<String, CliError> {
    match format {
        OutputFormat::Table | OutputFormat::Plain => Ok(format!(
            "{}  {:<20} {:<10} {:<18} {}",
            Local::now().format("%H:%M:%S"),
            view.display_name(),
            paint(view.state_label(), view.tone(), color),
            view.mode,
            view.battery_label(),
        )),
        // One document per update: JSON lines or YAML documents
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_single(
            OutputFormat::JsonCompact,
            view,
            |_| String::new(),
            |_| String::new(),
        ),
        OutputFormat::Yaml => {
            let doc = output::render_single(OutputFormat::Yaml, view, |_| String::new(), |_| String::new())?;
            Ok(format!("---\n{}", doc.trim_end()))
        }
    }
}
