//! Shared configuration for pennsync.
//!
//! TOML profiles, credential resolution (flag + env + keyring + plaintext),
//! and translation to `pennsync_core::SyncConfig`. The CLI adds
//! `GlobalOpts`-aware wrappers on top.

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
use url::Url;

use pennsync_api::{Credentials, DEFAULT_API_HOST};
use pennsync_core::{SyncConfig, TlsVerification};

/// Keyring service name; entries are keyed `<profile>/api-secret`.
pub const KEYRING_SERVICE: &str = "pennsync";

/// Environment variables read during credential resolution.
pub const API_KEY_ENV: &str = "PENNSIEVE_API_KEY";
pub const API_SECRET_ENV: &str = "PENNSIEVE_API_SECRET";

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "PENNSYNC_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no API key configured for profile '{profile}'")]
    NoApiKey { profile: String },

    #[error("no API secret configured for profile '{profile}'")]
    NoApiSecret { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

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
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named platform profiles.
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

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    #[serde(default = "default_tool")]
    pub tool: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
            base_dir: default_base_dir(),
            tool: default_tool(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_base_dir() -> PathBuf {
    PathBuf::from(SyncConfig::DEFAULT_BASE_DIR)
}
fn default_tool() -> String {
    SyncConfig::DEFAULT_TOOL.into()
}

/// A named platform profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Platform API base URL.
    #[serde(default = "default_api_host")]
    pub api_host: String,

    /// API key (not secret on its own).
    pub api_key: Option<String>,

    /// API secret (plaintext; prefer keyring or env var).
    pub api_secret: Option<String>,

    /// Environment variable name containing the API secret.
    pub api_secret_env: Option<String>,

    /// Identity provider endpoint override.
    pub identity_endpoint: Option<String>,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override the default data directory.
    pub base_dir: Option<PathBuf>,

    /// Override the agent executable.
    pub tool: Option<String>,

    /// Override the request timeout (seconds).
    pub timeout: Option<u64>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            api_host: default_api_host(),
            api_key: None,
            api_secret: None,
            api_secret_env: None,
            identity_endpoint: None,
            ca_cert: None,
            base_dir: None,
            tool: None,
            timeout: None,
        }
    }
}

fn default_api_host() -> String {
    DEFAULT_API_HOST.into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `PENNSYNC_CONFIG`, then XDG / platform
/// conventions.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("org", "pennsync", "pennsync").map_or_else(
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
    p.push("pennsync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path` + `PENNSYNC_*` env vars (`__` separates levels,
/// e.g. `PENNSYNC_DEFAULTS__TIMEOUT=60`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PENNSYNC_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
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

// ── Keyring ─────────────────────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{profile_name}/api-secret"),
    )?)
}

/// Store the API secret for a profile in the system keyring.
pub fn store_api_secret(profile_name: &str, secret: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(secret)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Values given on the command line (or their clap env fallbacks), which
/// win over everything in the profile.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_host: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<SecretString>,
    pub base_dir: Option<PathBuf>,
    pub tool: Option<String>,
    pub timeout: Option<u64>,
}

/// Resolve the API key: override, `PENNSIEVE_API_KEY`, then profile.
pub fn resolve_api_key(
    profile: &Profile,
    profile_name: &str,
    overrides: &Overrides,
) -> Result<String, ConfigError> {
    resolve_api_key_with(profile, profile_name, overrides, |name| {
        std::env::var(name).ok()
    })
}

fn resolve_api_key_with(
    profile: &Profile,
    profile_name: &str,
    overrides: &Overrides,
    env: impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    overrides
        .api_key
        .clone()
        .or_else(|| env(API_KEY_ENV))
        .or_else(|| profile.api_key.clone())
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| ConfigError::NoApiKey {
            profile: profile_name.into(),
        })
}

/// Resolve the API secret from the credential chain.
pub fn resolve_api_secret(
    profile: &Profile,
    profile_name: &str,
    overrides: &Overrides,
) -> Result<SecretString, ConfigError> {
    resolve_api_secret_with(profile, profile_name, overrides, |name| {
        std::env::var(name).ok()
    })
}

fn resolve_api_secret_with(
    profile: &Profile,
    profile_name: &str,
    overrides: &Overrides,
    env: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. CLI flag
    if let Some(ref secret) = overrides.api_secret {
        return Ok(secret.clone());
    }

    // 2. PENNSIEVE_API_SECRET
    if let Some(val) = env(API_SECRET_ENV) {
        return Ok(SecretString::from(val));
    }

    // 3. Profile's api_secret_env → env var lookup
    if let Some(val) = profile.api_secret_env.as_deref().and_then(&env) {
        return Ok(SecretString::from(val));
    }

    // 4. System keyring
    if let Ok(secret) = keyring_entry(profile_name).and_then(|e| Ok(e.get_password()?)) {
        return Ok(SecretString::from(secret));
    }

    // 5. Plaintext in config
    if let Some(ref secret) = profile.api_secret {
        return Ok(SecretString::from(secret.clone()));
    }

    Err(ConfigError::NoApiSecret {
        profile: profile_name.into(),
    })
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    raw.parse().map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })
}

/// Where datasets live locally and which agent binary to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSettings {
    pub base_dir: PathBuf,
    pub tool: String,
}

/// Resolve the local side only (flag > profile > defaults). Needs no
/// credentials, so `diff` can run without a platform login.
pub fn resolve_local_settings(
    profile: Option<&Profile>,
    defaults: &Defaults,
    overrides: &Overrides,
) -> LocalSettings {
    let base_dir = overrides
        .base_dir
        .clone()
        .or_else(|| profile.and_then(|p| p.base_dir.clone()))
        .unwrap_or_else(|| defaults.base_dir.clone());
    let tool = overrides
        .tool
        .clone()
        .or_else(|| profile.and_then(|p| p.tool.clone()))
        .unwrap_or_else(|| defaults.tool.clone());
    LocalSettings { base_dir, tool }
}

/// Build a `SyncConfig` from a profile plus overrides.
///
/// This is the single boundary where config types cross into core types.
pub fn resolve_sync_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
    overrides: &Overrides,
) -> Result<SyncConfig, ConfigError> {
    // 1. API host (flag > profile)
    let host_str = overrides.api_host.as_deref().unwrap_or(&profile.api_host);
    let api_host = parse_url("api_host", host_str)?;

    // 2. Credentials
    let api_key = resolve_api_key(profile, profile_name, overrides)?;
    let api_secret = resolve_api_secret(profile, profile_name, overrides)?;

    // 3. Identity endpoint
    let identity_endpoint = profile
        .identity_endpoint
        .as_deref()
        .map(|raw| parse_url("identity_endpoint", raw))
        .transpose()?;

    // 4. TLS verification
    let tls = profile
        .ca_cert
        .clone()
        .map_or(TlsVerification::SystemDefaults, TlsVerification::CustomCa);

    // 5. Local layout, tool and timeout (flag > profile > defaults)
    let LocalSettings { base_dir, tool } =
        resolve_local_settings(Some(profile), defaults, overrides);
    let timeout = Duration::from_secs(
        overrides
            .timeout
            .or(profile.timeout)
            .unwrap_or(defaults.timeout),
    );

    Ok(SyncConfig {
        credentials: Credentials::new(api_host, api_key, api_secret),
        identity_endpoint,
        tls,
        timeout,
        base_dir,
        tool,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = load_config_from(&dir.path().join("absent.toml")).expect("defaults");
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults.tool, "pennsieve");
        assert_eq!(cfg.defaults.base_dir, PathBuf::from("data"));
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/config.toml");
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "lab".into(),
            Profile {
                api_key: Some("key-1".into()),
                base_dir: Some(PathBuf::from("/srv/curation")),
                ..Profile::default()
            },
        );
        cfg.default_profile = Some("lab".into());

        save_config_to(&cfg, &path).expect("save");
        let loaded = load_config_from(&path).expect("load");

        assert_eq!(loaded.default_profile.as_deref(), Some("lab"));
        let lab = &loaded.profiles["lab"];
        assert_eq!(lab.api_host, DEFAULT_API_HOST);
        assert_eq!(lab.api_key.as_deref(), Some("key-1"));
    }

    #[test]
    fn api_key_precedence() {
        let profile = Profile {
            api_key: Some("from-profile".into()),
            ..Profile::default()
        };
        let env = |name: &str| (name == API_KEY_ENV).then(|| "from-env".to_owned());

        let flag = Overrides {
            api_key: Some("from-flag".into()),
            ..Overrides::default()
        };
        assert_eq!(
            resolve_api_key_with(&profile, "p", &flag, env).expect("key"),
            "from-flag"
        );
        assert_eq!(
            resolve_api_key_with(&profile, "p", &Overrides::default(), env).expect("key"),
            "from-env"
        );
        assert_eq!(
            resolve_api_key_with(&profile, "p", &Overrides::default(), no_env).expect("key"),
            "from-profile"
        );
        assert!(matches!(
            resolve_api_key_with(&Profile::default(), "p", &Overrides::default(), no_env),
            Err(ConfigError::NoApiKey { .. })
        ));
    }

    #[test]
    fn api_secret_from_named_env_var() {
        let profile = Profile {
            api_secret_env: Some("LAB_SECRET".into()),
            api_secret: Some("plaintext".into()),
            ..Profile::default()
        };
        let env = |name: &str| (name == "LAB_SECRET").then(|| "from-named-env".to_owned());
        let secret =
            resolve_api_secret_with(&profile, "pennsync-test-env", &Overrides::default(), env)
                .expect("secret");
        assert_eq!(secret.expose_secret(), "from-named-env");
    }

    #[test]
    fn api_secret_flag_wins() {
        let overrides = Overrides {
            api_secret: Some(SecretString::from("flag".to_string())),
            ..Overrides::default()
        };
        let env = |_: &str| Some("env".to_owned());
        let secret = resolve_api_secret_with(&Profile::default(), "p", &overrides, env)
            .expect("secret");
        assert_eq!(secret.expose_secret(), "flag");
    }

    #[test]
    fn sync_config_layers_overrides_profile_and_defaults() {
        let profile = Profile {
            api_host: "https://api.example.org".into(),
            api_key: Some("key".into()),
            api_secret: Some("secret".into()),
            tool: Some("/opt/pennsieve/bin/pennsieve".into()),
            timeout: Some(90),
            ..Profile::default()
        };
        let overrides = Overrides {
            base_dir: Some(PathBuf::from("/scratch")),
            api_secret: Some(SecretString::from("secret".to_string())),
            ..Overrides::default()
        };

        let sync = resolve_sync_config(&profile, "lab", &Defaults::default(), &overrides)
            .expect("config");

        assert_eq!(sync.credentials.api_host.as_str(), "https://api.example.org/");
        assert_eq!(sync.base_dir, PathBuf::from("/scratch"));
        assert_eq!(sync.tool, "/opt/pennsieve/bin/pennsieve");
        assert_eq!(sync.timeout, Duration::from_secs(90));
        assert_eq!(sync.tls, TlsVerification::SystemDefaults);
        assert!(sync.identity_endpoint.is_none());
    }

    #[test]
    fn local_settings_fall_back_to_defaults() {
        let overrides = Overrides {
            tool: Some("agent".into()),
            ..Overrides::default()
        };
        let local = resolve_local_settings(None, &Defaults::default(), &overrides);
        assert_eq!(
            local,
            LocalSettings {
                base_dir: PathBuf::from("data"),
                tool: "agent".into(),
            }
        );
    }

    #[test]
    fn invalid_host_is_validation_error() {
        let profile = Profile {
            api_host: "not a url".into(),
            ..Profile::default()
        };
        let result =
            resolve_sync_config(&profile, "p", &Defaults::default(), &Overrides::default());
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }
}
