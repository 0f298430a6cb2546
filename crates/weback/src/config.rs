//! CLI configuration: thin wrapper around `weback_config`.
//!
//! Adds profile resolution that respects `GlobalOpts` overrides
//! (--profile, --account, --region, --timeout).

use clap::ValueEnum;
use weback_config::{Config, ConfigError, Defaults, Profile};
use weback_core::ControllerConfig;

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};
use crate::error::CliError;

pub use weback_config::{config_path, load_config_or_default, save_config, store_password};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .unwrap_or_else(|| config.default_profile_name().to_owned())
}

impl GlobalOpts {
    pub fn output(&self) -> OutputFormat {
        self.output.unwrap_or(OutputFormat::Table)
    }

    pub fn color(&self) -> ColorMode {
        self.color.unwrap_or(ColorMode::Auto)
    }
}

/// Fill `--output` and `--color` from the `[defaults]` table when they
/// were not given on the command line or in the environment.
pub fn apply_output_defaults(global: &mut GlobalOpts, defaults: &Defaults) {
    if global.output.is_none() {
        global.output = parse_default("output", &defaults.output);
    }
    if global.color.is_none() {
        global.color = parse_default("color", &defaults.color);
    }
}

fn parse_default<T: ValueEnum>(key: &str, value: &str) -> Option<T> {
    match T::from_str(value, true) {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(key, value, "ignoring unknown value in [defaults]");
            None
        }
    }
}

/// Build a `ControllerConfig` from the config file, profile, and CLI
/// overrides. Also returns the name of the profile it came from.
pub fn build_controller_config(global: &GlobalOpts) -> Result<(String, ControllerConfig), CliError> {
    let cfg = load_config_or_default();
    let name = active_profile_name(global, &cfg);
    let profile = select_profile(global, &cfg, &name)?;
    let password = weback_config::resolve_password(&profile, &name)?;
    let config = weback_config::profile_to_controller_config(&profile, &name, &cfg.defaults, password)?;
    Ok((name, config))
}

/// Pick the profile and apply flag overrides.
///
/// Without a stored profile, `--account` alone is enough to start from an
/// empty one; the region check happens in `profile_to_controller_config`.
fn select_profile(global: &GlobalOpts, cfg: &Config, name: &str) -> Result<Profile, CliError> {
    let mut profile = match cfg.profile(name) {
        Ok(p) => p.clone(),
        Err(ConfigError::UnknownProfile { .. }) if global.account.is_some() => Profile::default(),
        Err(ConfigError::UnknownProfile { .. }) if global.profile.is_some() || !cfg.profiles.is_empty() => {
            return Err(CliError::ProfileNotFound {
                name: name.to_owned(),
                available: available_profiles(cfg),
            });
        }
        Err(ConfigError::UnknownProfile { .. }) => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(ref account) = global.account {
        profile.account.clone_from(account);
    }
    if let Some(ref region) = global.region {
        profile.region.clone_from(region);
    }
    if global.timeout.is_some() {
        profile.timeout = global.timeout;
    }
    Ok(profile)
}

fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}
