//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use weback_config::ConfigError;
use weback_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the WeBack cloud")]
    #[diagnostic(
        code(weback::connection_failed),
        help("Check your network connection.\nDetails: {reason}")
    )]
    ConnectionFailed { reason: String },

    #[error("Command was not delivered to the robot")]
    #[diagnostic(
        code(weback::send_failed),
        help(
            "The cloud stream could not be opened or dropped mid-send.\n\
             Details: {message}\n\
             Run again; each command makes one fresh connection attempt."
        )
    )]
    SendFailed { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(weback::auth_failed),
        help(
            "Check the account, region calling code and password of profile '{profile}'.\n\
             Run: weback config set-password --profile {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No password configured for profile '{profile}'")]
    #[diagnostic(
        code(weback::no_credentials),
        help(
            "Configure one with: weback config init\n\
             Or set the WEBACK_PASSWORD environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("Robot '{identifier}' not found")]
    #[diagnostic(
        code(weback::not_found),
        help("Run: weback devices list to see the robots on this account")
    )]
    NotFound { identifier: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("Cloud API error: {message}")]
    #[diagnostic(code(weback::api_error))]
    ApiError { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(weback::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(weback::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: weback config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No account configured")]
    #[diagnostic(
        code(weback::no_config),
        help(
            "Create a profile with: weback config init\n\
             Or pass --account and --region.\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("System keyring error: {message}")]
    #[diagnostic(
        code(weback::keyring),
        help("Use password_env or WEBACK_PASSWORD if no keyring is available.")
    )]
    Keyring { message: String },

    #[error(transparent)]
    #[diagnostic(code(weback::config))]
    Config(Box<ConfigError>),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(weback::timeout),
        help("Increase timeout with --timeout or check your connection.")
    )]
    Timeout { seconds: u64 },

    // ── Internal / IO ────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    #[diagnostic(code(weback::internal))]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::SendFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } | Self::Keyring { .. } => {
                exit_code::AUTH
            }
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::ProfileNotFound { .. } | Self::NoConfig { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }

    /// Name the profile whose credentials were rejected.
    pub fn with_profile(self, name: &str) -> Self {
        match self {
            Self::AuthFailed { message, .. } => Self::AuthFailed {
                profile: name.to_owned(),
                message,
            },
            other => other,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed { reason },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                profile: "current".into(),
                message,
            },

            CoreError::NotConnected => CliError::ConnectionFailed {
                reason: "not connected to the cloud".into(),
            },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::DeviceNotFound { identifier } => CliError::NotFound { identifier },

            CoreError::SendFailed { message } => CliError::SendFailed { message },

            CoreError::InvalidArgument { message } => CliError::Validation {
                field: "argument".into(),
                reason: message,
            },

            CoreError::Api { message } => CliError::ApiError { message },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::UnknownProfile { profile } => CliError::ProfileNotFound {
                name: profile,
                available: "(none)".into(),
            },
            ConfigError::Keyring(e) => CliError::Keyring {
                message: e.to_string(),
            },
            other => CliError::Config(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let cases = [
            (
                CoreError::AuthenticationFailed {
                    message: "bad password".into(),
                },
                exit_code::AUTH,
            ),
            (
                CoreError::DeviceNotFound {
                    identifier: "kitchen".into(),
                },
                exit_code::NOT_FOUND,
            ),
            (
                CoreError::SendFailed {
                    message: "stream refused".into(),
                },
                exit_code::CONNECTION,
            ),
            (CoreError::Timeout { timeout_secs: 10 }, exit_code::TIMEOUT),
            (
                CoreError::InvalidArgument {
                    message: "Pause".into(),
                },
                exit_code::USAGE,
            ),
            (
                CoreError::Api {
                    message: "rejected".into(),
                },
                exit_code::GENERAL,
            ),
        ];

        for (core, code) in cases {
            let label = core.to_string();
            assert_eq!(CliError::from(core).exit_code(), code, "{label}");
        }
    }

    #[test]
    fn auth_failures_name_the_profile() {
        let err = CliError::from(CoreError::AuthenticationFailed {
            message: "Session expired".into(),
        })
        .with_profile("home");

        assert!(matches!(err, CliError::AuthFailed { ref profile, .. } if profile == "home"));
        let help = Diagnostic::help(&err).unwrap().to_string();
        assert!(help.contains("--profile home"), "{help}");

        let other = CliError::from(CoreError::NotConnected).with_profile("home");
        assert!(matches!(other, CliError::ConnectionFailed { .. }));
    }

    #[test]
    fn missing_password_is_an_auth_failure() {
        let err = CliError::from(ConfigError::NoCredentials {
            profile: "home".into(),
        });
        assert!(matches!(err, CliError::NoCredentials { ref profile } if profile == "home"));
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }
}
