// ── Runtime sync configuration ──
//
// Describes *how* to reach the platform and where datasets live locally.
// Carries credential data but never touches config files: the CLI resolves
// profiles and hands a `SyncConfig` in.

use std::path::PathBuf;
use std::time::Duration;

use pennsync_api::{Credentials, TlsMode, TransportConfig};
use url::Url;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store.
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
}

impl From<&TlsVerification> for TlsMode {
    fn from(tls: &TlsVerification) -> Self {
        match tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        }
    }
}

/// Everything a sync run needs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// API host plus key/secret pair.
    pub credentials: Credentials,
    /// Identity provider endpoint override (defaults to the regional Cognito endpoint).
    pub identity_endpoint: Option<Url>,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// Root under which mapped datasets live in `output/<name>`.
    pub base_dir: PathBuf,
    /// External tool executable.
    pub tool: String,
}

impl SyncConfig {
    pub const DEFAULT_TOOL: &'static str = "pennsieve";
    pub const DEFAULT_BASE_DIR: &'static str = "data";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Config with default base dir, tool, TLS and timeout.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            identity_endpoint: None,
            tls: TlsVerification::default(),
            timeout: Self::DEFAULT_TIMEOUT,
            base_dir: PathBuf::from(Self::DEFAULT_BASE_DIR),
            tool: Self::DEFAULT_TOOL.into(),
        }
    }

    /// HTTP transport settings derived from this config.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: TlsMode::from(&self.tls),
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    #[test]
    fn defaults() {
        let creds = Credentials::new(
            Url::parse("https://api.pennsieve.net").expect("url"),
            "key",
            SecretString::from("secret".to_string()),
        );
        let config = SyncConfig::new(creds);
        assert_eq!(config.tool, "pennsieve");
        assert_eq!(config.base_dir, PathBuf::from("data"));
        assert_eq!(config.transport().timeout, Duration::from_secs(30));
        assert!(matches!(config.transport().tls, TlsMode::System));
    }
}
