// ── Core error types ──
//
// User-facing errors from pennsync-core. Consumers never see raw HTTP
// statuses or JSON failures from the client crate: the
// `From<pennsync_api::Error>` impl folds them into domain variants.

use std::path::PathBuf;

use thiserror::Error;

use crate::manifest::ManifestError;
use crate::tool::ToolError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("Cannot reach the identity service: {reason}")]
    AuthTransport { reason: String },

    #[error("Unexpected authentication response: {message}")]
    AuthProtocol { message: String },

    #[error("Credentials rejected: {message}")]
    AuthRejected { message: String },

    // ── Connection ───────────────────────────────────────────────────
    #[error("Cannot connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out: {reason}")]
    Timeout { reason: String },

    // ── Data ─────────────────────────────────────────────────────────
    #[error("Dataset directory {} does not exist (map the dataset first)", .path.display())]
    DatasetNotMapped { path: PathBuf },

    #[error("No .pennsieve/manifest.json found at or above {}", .path.display())]
    LocalManifestNotFound { path: PathBuf },

    #[error("Diff output has no change column (headers: {headers:?})")]
    MissingColumn { headers: Vec<String> },

    // ── External tool ────────────────────────────────────────────────
    #[error("Diff failed: {0}")]
    DiffInvocation(#[source] ToolError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    // ── API (wrapped, not exposed raw) ───────────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        status: Option<u16>,
    },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Local IO ─────────────────────────────────────────────────────
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the external tool binary could not be started.
    pub fn is_tool_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Tool(ToolError::Unavailable { .. })
                | Self::DiffInvocation(ToolError::Unavailable { .. })
                | Self::Manifest(ManifestError::Create(ToolError::Unavailable { .. }))
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<pennsync_api::Error> for CoreError {
    fn from(err: pennsync_api::Error) -> Self {
        match err {
            pennsync_api::Error::AuthTransport(e) => CoreError::AuthTransport {
                reason: e.to_string(),
            },
            pennsync_api::Error::AuthProtocol { message } => CoreError::AuthProtocol { message },
            pennsync_api::Error::AuthRejected { kind, message } => CoreError::AuthRejected {
                message: format!("{kind}: {message}"),
            },
            pennsync_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout {
                        reason: e.to_string(),
                    }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(|u| u.origin().ascii_serialization())
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            pennsync_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            pennsync_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            pennsync_api::Error::Http { status, url, body } => CoreError::Api {
                message: if body.is_empty() {
                    format!("HTTP {status} from {url}")
                } else {
                    format!("HTTP {status} from {url}: {body}")
                },
                status: Some(status),
            },
            pennsync_api::Error::Deserialization { message, body: _ } => CoreError::Api {
                message: format!("Malformed response: {message}"),
                status: None,
            },
            pennsync_api::Error::Io(source) => CoreError::Io {
                path: PathBuf::new(),
                source,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_credentials_keep_provider_kind() {
        let err: CoreError = pennsync_api::Error::AuthRejected {
            kind: "NotAuthorizedException".into(),
            message: "Incorrect username or password.".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Credentials rejected: NotAuthorizedException: Incorrect username or password."
        );
    }

    #[test]
    fn http_errors_keep_status() {
        let err: CoreError = pennsync_api::Error::Http {
            status: 404,
            url: "https://api.example/datasets/".into(),
            body: String::new(),
        }
        .into();
        assert!(matches!(err, CoreError::Api { status: Some(404), .. }));
    }

    #[test]
    fn unavailable_tool_is_detected_through_wrappers() {
        let err = CoreError::DiffInvocation(ToolError::Unavailable {
            program: "pennsieve".into(),
        });
        assert!(err.is_tool_unavailable());
    }
}
