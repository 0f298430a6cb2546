//! Clap derive structures for the `weback` CLI.
//!
//! Defines the command tree, global flags, and shared value enums. Kept
//! free of workspace crates so the build script can render man pages.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// weback -- control WeBack robot vacuums from the command line
#[derive(Debug, Parser)]
#[command(
    name = "weback",
    version,
    about = "Control WeBack robot vacuums from the command line",
    long_about = "Talks to the WeBack cloud: logs in with your app account, lists\n\
        your robots, reads their status and sends them commands over the\n\
        cloud's WebSocket relay.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Account profile to use
    #[arg(long, short = 'p', env = "WEBACK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Account e-mail or phone number (overrides profile)
    #[arg(long, env = "WEBACK_ACCOUNT", global = true)]
    pub account: Option<String>,

    /// Country calling code of the account, e.g. 34 (overrides profile)
    #[arg(long, env = "WEBACK_REGION", global = true)]
    pub region: Option<String>,

    /// Output format [default: from config, else table]
    #[arg(long, short = 'o', env = "WEBACK_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output [default: from config, else auto]
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// HTTP request timeout in seconds (overrides profile)
    #[arg(long, env = "WEBACK_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List robots, read their status and send commands
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Print status pushes as they arrive, until Ctrl-C
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List robots on the account
    #[command(alias = "ls")]
    List,

    /// Show one robot's cached status
    Get {
        /// Thing name or nickname
        device: String,
    },

    /// Ask the cloud for fresh status and print it
    Status {
        /// Thing name or nickname
        device: String,

        /// How long to wait for the pushed status, e.g. "5s"
        #[arg(long, value_name = "DURATION")]
        wait: Option<String>,
    },

    /// Start automatic cleaning
    #[command(alias = "resume")]
    Start {
        /// Thing name or nickname
        device: String,
    },

    /// Pause cleaning
    Pause {
        /// Thing name or nickname
        device: String,
    },

    /// Stop cleaning
    Stop {
        /// Thing name or nickname
        device: String,
    },

    /// Send the robot back to its dock
    #[command(alias = "home")]
    Dock {
        /// Thing name or nickname
        device: String,
    },

    /// Clean the area around the robot
    Spot {
        /// Thing name or nickname
        device: String,
    },

    /// Make the robot play its locator sound
    Locate {
        /// Thing name or nickname
        device: String,
    },

    /// Set the suction power
    Fan {
        /// Thing name or nickname
        device: String,

        /// Fan speed
        speed: FanSpeedArg,
    },

    /// Set a raw working mode, e.g. EdgeClean
    Mode {
        /// Thing name or nickname
        device: String,

        /// Working mode as the cloud names it
        mode: String,
    },

    /// Drive to a point on the robot's map
    Goto {
        /// Thing name or nickname
        device: String,

        /// Point as JSON, e.g. '{"x": 120, "y": -40}'
        point: String,
    },

    /// Clean a rectangular zone on the robot's map
    CleanRect {
        /// Thing name or nickname
        device: String,

        /// Rectangle as JSON, in the robot's map format
        rect: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FanSpeedArg {
    Quiet,
    Normal,
    Strong,
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Only this robot (thing name or nickname); all robots if omitted
    pub device: Option<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive setup wizard
    Init,

    /// Show the configuration with secrets masked
    Show,

    /// Store a profile's password in the system keyring
    SetPassword,

    /// Print the config file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
