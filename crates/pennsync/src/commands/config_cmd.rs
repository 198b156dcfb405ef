//! Config subcommand handlers.

use std::path::PathBuf;

use dialoguer::{Input, Select};
use serde::Serialize;
use tabled::Tabled;

use pennsync_config::{self as cfg_lib, Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util::prompt_err;

const REDACTED: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// Copy of `cfg` with plaintext secrets masked.
fn redacted(cfg: &Config) -> Config {
    let mut out = cfg.clone();
    for profile in out.profiles.values_mut() {
        if profile.api_secret.is_some() {
            profile.api_secret = Some(REDACTED.into());
        }
    }
    out
}

fn keyring_err(e: impl std::fmt::Display) -> CliError {
    CliError::Keyring {
        reason: e.to_string(),
    }
}

/// Offer to store the secret in the system keyring or return it for the
/// config file. Returns `Some(secret)` only for the plaintext choice.
fn prompt_secret_storage(profile_name: &str, secret: String) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the API secret?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        cfg_lib::store_api_secret(profile_name, &secret).map_err(keyring_err)?;
        eprintln!("   ✓ API secret stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(secret))
    }
}

fn prompt_nonempty_secret() -> Result<String, CliError> {
    let secret = rpassword::prompt_password("API secret: ").map_err(prompt_err)?;
    if secret.trim().is_empty() {
        return Err(CliError::Validation {
            field: "api_secret".into(),
            reason: "API secret cannot be empty".into(),
        });
    }
    Ok(secret)
}

#[derive(Clone, Serialize, Tabled)]
struct ProfileRow {
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "API host")]
    api_host: String,
    #[tabled(rename = "Base dir")]
    base_dir: String,
    #[tabled(rename = "Default")]
    default: String,
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(),

        ConfigCommand::Show => {
            let cfg = cfg_lib::load_config()?;
            let shown = redacted(&cfg);
            let out = output::render_single(
                global.output,
                &shown,
                |c| toml::to_string_pretty(c).unwrap_or_default(),
                |_| config::config_path().display().to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let active = config::active_profile_name(global, &cfg);
            let rows: Vec<ProfileRow> = cfg
                .profiles
                .iter()
                .map(|(name, p)| ProfileRow {
                    name: name.clone(),
                    api_host: p.api_host.clone(),
                    base_dir: p
                        .base_dir
                        .as_ref()
                        .unwrap_or(&cfg.defaults.base_dir)
                        .display()
                        .to_string(),
                    default: if *name == active { "*".into() } else { String::new() },
                })
                .collect();
            let out =
                output::render_list(global.output, &rows, ProfileRow::clone, |r| r.name.clone());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name,
                });
            }
            cfg.default_profile = Some(name.clone());
            cfg_lib::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("✓ Default profile set to '{name}'");
            }
            Ok(())
        }

        ConfigCommand::SetSecret => {
            let cfg = config::load_config_or_default();
            let name = config::active_profile_name(global, &cfg);
            let secret = prompt_nonempty_secret()?;
            cfg_lib::store_api_secret(&name, &secret).map_err(keyring_err)?;
            if !global.quiet {
                eprintln!("✓ API secret for profile '{name}' stored in system keyring");
            }
            Ok(())
        }
    }
}

/// Interactive wizard: writes (or replaces) one profile and makes it the default.
fn init() -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("pennsync configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let defaults = Profile::default();

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let api_host: String = Input::new()
        .with_prompt("API host")
        .default(defaults.api_host.clone())
        .interact_text()
        .map_err(prompt_err)?;

    let api_key: String = Input::new()
        .with_prompt("API key")
        .interact_text()
        .map_err(prompt_err)?;
    if api_key.trim().is_empty() {
        return Err(CliError::Validation {
            field: "api_key".into(),
            reason: "API key cannot be empty".into(),
        });
    }

    let secret = prompt_nonempty_secret()?;
    let api_secret = prompt_secret_storage(&profile_name, secret)?;

    let base_dir: String = Input::new()
        .with_prompt("Local data directory")
        .default(pennsync_core::SyncConfig::DEFAULT_BASE_DIR.into())
        .interact_text()
        .map_err(prompt_err)?;

    let tool: String = Input::new()
        .with_prompt("Pennsieve agent executable")
        .default(pennsync_core::SyncConfig::DEFAULT_TOOL.into())
        .interact_text()
        .map_err(prompt_err)?;

    let profile = Profile {
        api_host,
        api_key: Some(api_key.trim().to_owned()),
        api_secret,
        base_dir: Some(PathBuf::from(base_dir)),
        tool: Some(tool),
        ..defaults
    };

    let mut cfg = config::load_config_or_default();
    cfg.profiles.insert(profile_name.clone(), profile);
    cfg.default_profile = Some(profile_name.clone());
    let path = cfg_lib::save_config(&cfg)?;

    eprintln!("\n✓ Configuration written to {}", path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Test it: pennsync datasets list");
    Ok(())
}
