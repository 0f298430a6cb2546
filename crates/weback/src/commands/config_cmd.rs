//! Config subcommand handlers.

use dialoguer::{Confirm, Input, Select};
use weback_config::{Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking the password.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "language = \"{}\"", cfg.defaults.language);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "connect_timeout = {}", cfg.defaults.connect_timeout);
    let _ = writeln!(out, "stream_wait = {}", cfg.defaults.stream_wait);

    for (name, p) in &cfg.profiles {
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "account = \"{}\"", p.account);
        let _ = writeln!(out, "region = \"{}\"", p.region);
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"****\"");
        }
        if let Some(ref env) = p.password_env {
            let _ = writeln!(out, "password_env = \"{env}\"");
        }
        if let Some(ref url) = p.auth_url {
            let _ = writeln!(out, "auth_url = \"{url}\"");
        }
        if let Some(ref language) = p.language {
            let _ = writeln!(out, "language = \"{language}\"");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(timeout) = p.connect_timeout {
            let _ = writeln!(out, "connect_timeout = {timeout}");
        }
        if let Some(wait) = p.stream_wait {
            let _ = writeln!(out, "stream_wait = {wait}");
        }
    }

    out
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_password() -> Result<String, CliError> {
    let password = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
    if password.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "password cannot be empty".into(),
        });
    }
    Ok(password)
}

/// Offer the keyring; returns `Some(password)` if the user chose plaintext.
fn prompt_password_storage(profile_name: &str, password: String) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the password?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        config::store_password(profile_name, &password)?;
        eprintln!("   ✓ password stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(password))
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(global),

        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            output::print_output(&format_config_redacted(&cfg), global.quiet);
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let cfg = config::load_config_or_default();
            let name = config::active_profile_name(global, &cfg);
            let password = prompt_password()?;
            config::store_password(&name, &password)?;
            if !global.quiet {
                eprintln!("Password for profile '{name}' stored in system keyring");
            }
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }
    }
}

/// Interactive wizard: one profile per run.
fn init(global: &GlobalOpts) -> Result<(), CliError> {
    eprintln!("WeBack CLI: configuration wizard");
    eprintln!("   Config path: {}\n", config::config_path().display());

    let mut cfg = config::load_config_or_default();

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default(global.profile.clone().unwrap_or_else(|| "default".into()))
        .interact_text()
        .map_err(prompt_err)?;

    if cfg.profiles.contains_key(&profile_name)
        && !Confirm::new()
            .with_prompt(format!("Profile '{profile_name}' exists. Overwrite?"))
            .default(false)
            .interact()
            .map_err(prompt_err)?
    {
        eprintln!("Aborted; nothing written");
        return Ok(());
    }

    let mut account = Input::<String>::new().with_prompt("Account (e-mail or phone number)");
    if let Some(ref a) = global.account {
        account = account.default(a.clone());
    }
    let account = account.interact_text().map_err(prompt_err)?;

    let mut region = Input::<String>::new().with_prompt("Country calling code (e.g. 34)");
    if let Some(ref r) = global.region {
        region = region.default(r.clone());
    }
    let region = region
        .interact_text()
        .map_err(prompt_err)?
        .trim_start_matches('+')
        .to_owned();

    let password = prompt_password()?;
    let password = prompt_password_storage(&profile_name, password)?;

    let profile = Profile {
        account,
        region,
        password,
        ..Profile::default()
    };

    cfg.profiles.insert(profile_name.clone(), profile);
    if cfg.profiles.len() == 1 {
        cfg.default_profile = Some(profile_name.clone());
    }

    let path = config::save_config(&cfg)?;
    eprintln!("\n   ✓ profile '{profile_name}' saved to {}", path.display());
    eprintln!("   Try: weback devices list");
    Ok(())
}
