//! CLI-side configuration: `GlobalOpts`-aware wrappers around
//! `pennsync_config`.

use secrecy::SecretString;

use pennsync_config::{Config, LocalSettings, Overrides, Profile};
use pennsync_core::SyncConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use pennsync_config::{config_path, load_config_or_default};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Flags (and their env fallbacks) as config overrides.
pub fn overrides(global: &GlobalOpts) -> Overrides {
    Overrides {
        api_host: global.api_host.clone(),
        api_key: global.api_key.clone(),
        api_secret: global.api_secret.clone().map(SecretString::from),
        base_dir: global.base_dir.clone(),
        tool: global.tool.clone(),
        timeout: global.timeout,
    }
}

/// Look up the active profile. An explicitly requested profile must exist;
/// the implicit default may be absent, in which case flags and env vars
/// carry everything.
fn active_profile(
    global: &GlobalOpts,
    cfg: &Config,
) -> Result<(String, Option<Profile>), CliError> {
    let name = active_profile_name(global, cfg);
    match cfg.profiles.get(&name) {
        Some(profile) => Ok((name, Some(profile.clone()))),
        None if global.profile.is_some() => Err(CliError::ProfileNotFound {
            available: available_profiles(cfg),
            name,
        }),
        None => Ok((name, None)),
    }
}

pub fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Build a `SyncConfig` from the config file, profile, and CLI overrides.
pub fn build_sync_config(global: &GlobalOpts) -> Result<SyncConfig, CliError> {
    let cfg = load_config_or_default();
    let (name, profile) = active_profile(global, &cfg)?;
    let profile = profile.unwrap_or_default();
    Ok(pennsync_config::resolve_sync_config(
        &profile,
        &name,
        &cfg.defaults,
        &overrides(global),
    )?)
}

/// Local base dir and agent executable, without touching credentials.
pub fn local_settings(global: &GlobalOpts) -> Result<LocalSettings, CliError> {
    let cfg = load_config_or_default();
    let (_, profile) = active_profile(global, &cfg)?;
    Ok(pennsync_config::resolve_local_settings(
        profile.as_ref(),
        &cfg.defaults,
        &overrides(global),
    ))
}
