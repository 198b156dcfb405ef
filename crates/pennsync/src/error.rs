//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use pennsync_config::ConfigError;
use pennsync_core::CoreError;

/// Process exit codes.
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
    #[error("Could not connect to {url}")]
    #[diagnostic(
        code(pennsync::connection_failed),
        help("Check your network connection and the API host ({url}).\n{reason}")
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out")]
    #[diagnostic(
        code(pennsync::timeout),
        help("Increase the timeout with --timeout.\n{reason}")
    )]
    Timeout { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(pennsync::auth_failed),
        help(
            "Verify the API key and secret of the active profile.\n\
             Store a new secret with: pennsync config set-secret"
        )
    )]
    AuthFailed { message: String },

    #[error("No {credential} configured for profile '{profile}'")]
    #[diagnostic(
        code(pennsync::no_credentials),
        help(
            "Configure credentials with: pennsync config init\n\
             Or set PENNSIEVE_API_KEY and PENNSIEVE_API_SECRET."
        )
    )]
    NoCredentials { profile: String, credential: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("Dataset is not mapped at {path}")]
    #[diagnostic(
        code(pennsync::not_mapped),
        help("Map it first with: pennsync map -n <dataset>")
    )]
    NotMapped { path: String },

    #[error("No .pennsieve/manifest.json found at or above {path}")]
    #[diagnostic(
        code(pennsync::no_local_manifest),
        help("Pull only works inside a dataset mapped with: pennsync map")
    )]
    NoLocalManifest { path: String },

    // ── External tool ────────────────────────────────────────────────
    #[error("Cannot run the Pennsieve agent '{program}'")]
    #[diagnostic(
        code(pennsync::tool_unavailable),
        help(
            "Install the Pennsieve agent and make sure it is running,\n\
             or point --tool at the executable."
        )
    )]
    ToolUnavailable { program: String },

    #[error("{message}")]
    #[diagnostic(code(pennsync::tool_failed))]
    ToolFailed { message: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    #[diagnostic(code(pennsync::api_error))]
    ApiError {
        message: String,
        status: Option<u16>,
    },

    // ── Batch ────────────────────────────────────────────────────────
    #[error("{operation} failed for {failed} of {total} item(s)")]
    #[diagnostic(
        code(pennsync::batch_failed),
        help("See the report above; rerun with -v for details.")
    )]
    BatchFailed {
        operation: String,
        failed: usize,
        total: usize,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(pennsync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(pennsync::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: pennsync config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(pennsync::config))]
    Config(Box<figment::Error>),

    #[error("Keyring error: {reason}")]
    #[diagnostic(code(pennsync::keyring))]
    Keyring { reason: String },

    // ── IO ───────────────────────────────────────────────────────────
    #[error("IO error on {path}")]
    #[diagnostic(code(pennsync::io))]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotMapped { .. } | Self::NoLocalManifest { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        if err.is_tool_unavailable() {
            return match err {
                CoreError::Tool(pennsync_core::ToolError::Unavailable { program })
                | CoreError::DiffInvocation(pennsync_core::ToolError::Unavailable { program })
                | CoreError::Manifest(pennsync_core::ManifestError::Create(
                    pennsync_core::ToolError::Unavailable { program },
                )) => CliError::ToolUnavailable { program },
                other => CliError::ToolFailed {
                    message: other.to_string(),
                },
            };
        }

        match err {
            CoreError::AuthTransport { reason } => CliError::ConnectionFailed {
                url: "the identity service".into(),
                reason,
            },

            CoreError::AuthProtocol { message } | CoreError::AuthRejected { message } => {
                CliError::AuthFailed { message }
            }

            CoreError::ConnectionFailed { url, reason } => {
                CliError::ConnectionFailed { url, reason }
            }

            CoreError::Timeout { reason } => CliError::Timeout { reason },

            CoreError::DatasetNotMapped { path } => CliError::NotMapped {
                path: path.display().to_string(),
            },

            CoreError::LocalManifestNotFound { path } => CliError::NoLocalManifest {
                path: path.display().to_string(),
            },

            err @ (CoreError::MissingColumn { .. }
            | CoreError::DiffInvocation(_)
            | CoreError::Tool(_)
            | CoreError::Manifest(_)) => CliError::ToolFailed {
                message: err.to_string(),
            },

            CoreError::Api { message, status } => CliError::ApiError { message, status },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Io { path, source } => CliError::File {
                path: path.display().to_string(),
                source,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoApiKey { profile } => CliError::NoCredentials {
                profile,
                credential: "API key".into(),
            },
            ConfigError::NoApiSecret { profile } => CliError::NoCredentials {
                profile,
                credential: "API secret".into(),
            },
            ConfigError::Serialization(e) => CliError::Validation {
                field: "config".into(),
                reason: e.to_string(),
            },
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Keyring(e) => CliError::Keyring {
                reason: e.to_string(),
            },
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn auth_failures_exit_with_auth_code() {
        let err = CliError::from(CoreError::AuthRejected {
            message: "Incorrect username or password.".into(),
        });
        assert_eq!(err.exit_code(), exit_code::AUTH);

        let err = CliError::from(ConfigError::NoApiSecret {
            profile: "default".into(),
        });
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }

    #[test]
    fn missing_agent_is_reported_by_program() {
        let err = CliError::from(CoreError::DiffInvocation(
            pennsync_core::ToolError::Unavailable {
                program: "pennsieve".into(),
            },
        ));
        assert!(matches!(err, CliError::ToolUnavailable { ref program } if program == "pennsieve"));
        assert_eq!(err.exit_code(), exit_code::GENERAL);
    }

    #[test]
    fn unmapped_dataset_is_not_found() {
        let err = CliError::from(CoreError::DatasetNotMapped {
            path: PathBuf::from("data/output/EPS0000001"),
        });
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
        assert!(err.to_string().contains("data/output/EPS0000001"));
    }

    #[test]
    fn api_error_shows_status() {
        let err = CliError::from(CoreError::Api {
            message: "server error".into(),
            status: Some(502),
        });
        assert_eq!(err.to_string(), "API error (502): server error");
    }
}
