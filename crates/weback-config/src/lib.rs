//! Configuration for the weback CLI.
//!
//! TOML profiles, password resolution (env + keyring + plaintext), and
//! translation to `weback_core::ControllerConfig`. The CLI layers its
//! command-line overrides on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use weback_core::ControllerConfig;

/// Keyring service name.
pub const KEYRING_SERVICE: &str = "weback";

/// Environment variable consulted for the password after `password_env`.
pub const PASSWORD_ENV: &str = "WEBACK_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use when none is given.
    pub fn default_profile_name(&self) -> &str {
        self.default_profile.as_deref().unwrap_or("default")
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles.get(name).ok_or_else(|| ConfigError::UnknownProfile {
            profile: name.into(),
        })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_language")]
    pub language: String,

    /// Overall HTTP timeout, seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// HTTP connect timeout, seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Stream open wait, seconds.
    #[serde(default = "default_stream_wait")]
    pub stream_wait: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            language: default_language(),
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            stream_wait: default_stream_wait(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_language() -> String {
    "en".into()
}
fn default_timeout() -> u64 {
    90
}
fn default_connect_timeout() -> u64 {
    30
}
fn default_stream_wait() -> u64 {
    10
}

/// A named WeBack account.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Account identifier (e-mail or phone number).
    pub account: String,

    /// Calling code of the account's country, e.g. "34".
    pub region: String,

    /// Password (plaintext -- prefer keyring or env var).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable name containing the password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    /// Override the login endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_wait: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("rs", "weback", "weback").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("weback");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
///
/// Environment overrides use `WEBACK_` and `__` as the nesting separator,
/// e.g. `WEBACK_DEFAULTS__TIMEOUT=30`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("WEBACK_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if it cannot be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Password resolution ─────────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))?)
}

/// Store a profile's password in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(password)?;
    Ok(())
}

/// Resolve a profile's password from the real environment and keyring.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_password_with(
        profile,
        profile_name,
        |var| std::env::var(var).ok(),
        |name| keyring_entry(name).ok()?.get_password().ok(),
    )
}

/// Password chain: `password_env` → `WEBACK_PASSWORD` → keyring → plaintext.
pub fn resolve_password_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env → env var lookup
    if let Some(pw) = profile.password_env.as_deref().and_then(&env) {
        return Ok(SecretString::from(pw));
    }

    // 2. Global env var
    if let Some(pw) = env(PASSWORD_ENV) {
        return Ok(SecretString::from(pw));
    }

    // 3. Keyring
    if let Some(pw) = keyring(profile_name) {
        return Ok(SecretString::from(pw));
    }

    // 4. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `ControllerConfig` from a profile and the global defaults.
pub fn profile_to_controller_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
    password: SecretString,
) -> Result<ControllerConfig, ConfigError> {
    if profile.account.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "account".into(),
            reason: format!("profile '{profile_name}' has no account"),
        });
    }
    if profile.region.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "region".into(),
            reason: format!("profile '{profile_name}' has no region calling code"),
        });
    }

    let mut config = ControllerConfig::new(profile.account.clone(), password, profile.region.clone());

    if let Some(ref raw) = profile.auth_url {
        config.auth_url = raw.parse().map_err(|_| ConfigError::Validation {
            field: "auth_url".into(),
            reason: format!("invalid URL: {raw}"),
        })?;
    }
    config.language = profile
        .language
        .clone()
        .unwrap_or_else(|| defaults.language.clone());
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.connect_timeout =
        Duration::from_secs(profile.connect_timeout.unwrap_or(defaults.connect_timeout));
    config.stream_wait = Duration::from_secs(profile.stream_wait.unwrap_or(defaults.stream_wait));

    Ok(config)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn profile() -> Profile {
        Profile {
            account: "me@example.com".into(),
            region: "34".into(),
            ..Profile::default()
        }
    }

    #[test]
    fn load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(cfg.default_profile_name(), "default");
        assert_eq!(cfg.defaults.timeout, 90);
        assert_eq!(cfg.defaults.stream_wait, 10);
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn save_then_load_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        let mut home = profile();
        home.password_env = Some("HOME_VACUUM_PW".into());
        home.stream_wait = Some(5);
        cfg.profiles.insert("home".into(), home);
        cfg.default_profile = Some("home".into());
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.default_profile_name(), "home");
        let home = loaded.profile("home").unwrap();
        assert_eq!(home.account, "me@example.com");
        assert_eq!(home.password_env.as_deref(), Some("HOME_VACUUM_PW"));
        assert_eq!(home.stream_wait, Some(5));
        assert!(home.password.is_none());
    }

    #[test]
    fn unknown_profile() {
        let cfg = Config::default();
        assert!(matches!(cfg.profile("nope"), Err(ConfigError::UnknownProfile { .. })));
    }

    #[test]
    fn password_chain_order() {
        let mut p = profile();
        p.password_env = Some("MY_PW".into());
        p.password = Some("plain".into());

        let env_all = |var: &str| match var {
            "MY_PW" => Some("from-profile-env".to_string()),
            PASSWORD_ENV => Some("from-global-env".to_string()),
            _ => None,
        };
        let keyring = |_: &str| Some("from-keyring".to_string());
        let none = |_: &str| None;

        let pw = resolve_password_with(&p, "home", env_all, keyring).unwrap();
        assert_eq!(pw.expose_secret(), "from-profile-env");

        let global_only = |var: &str| (var == PASSWORD_ENV).then(|| "from-global-env".to_string());
        let pw = resolve_password_with(&p, "home", global_only, keyring).unwrap();
        assert_eq!(pw.expose_secret(), "from-global-env");

        let pw = resolve_password_with(&p, "home", none, keyring).unwrap();
        assert_eq!(pw.expose_secret(), "from-keyring");

        let pw = resolve_password_with(&p, "home", none, none).unwrap();
        assert_eq!(pw.expose_secret(), "plain");

        p.password = None;
        assert!(matches!(
            resolve_password_with(&p, "home", none, none),
            Err(ConfigError::NoCredentials { .. })
        ));
    }

    #[test]
    fn profile_overrides_defaults() {
        let mut p = profile();
        p.language = Some("es".into());
        p.timeout = Some(20);
        p.auth_url = Some("https://auth.example.com/oauth".into());

        let cfg = profile_to_controller_config(
            &p,
            "home",
            &Defaults::default(),
            SecretString::from("pw".to_string()),
        )
        .unwrap();

        assert_eq!(cfg.language, "es");
        assert_eq!(cfg.timeout, Duration::from_secs(20));
        assert_eq!(cfg.connect_timeout, Duration::from_secs(30));
        assert_eq!(cfg.stream_wait, Duration::from_secs(10));
        assert_eq!(cfg.auth_url.as_str(), "https://auth.example.com/oauth");
    }

    #[test]
    fn profile_requires_account_and_region() {
        let mut p = profile();
        p.region = String::new();
        let err = profile_to_controller_config(&p, "home", &Defaults::default(), SecretString::from("pw".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "region"));
    }
}
