use thiserror::Error;

/// Top-level error type for the `pennsync-api` crate.
///
/// Splits authentication failures by cause (transport, protocol, rejection)
/// so callers can tell a network outage from bad credentials. Everything
/// after authentication surfaces as [`Error::Http`], [`Error::Transport`] or
/// [`Error::Deserialization`]. `pennsync-core` maps these into its own
/// domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The identity configuration or token exchange could not be reached,
    /// or answered with a non-rejection HTTP error.
    #[error("Authentication transport error: {0}")]
    AuthTransport(#[source] reqwest::Error),

    /// An authentication response was not JSON or lacked expected fields.
    #[error("Authentication protocol error: {message}")]
    AuthProtocol { message: String },

    /// The identity provider refused the API key/secret pair.
    #[error("Credentials rejected by identity provider ({kind}): {message}")]
    AuthRejected { kind: String, message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS configuration or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── API ─────────────────────────────────────────────────────────
    /// Non-success HTTP status from the platform API.
    #[error("HTTP {status} from {url}: {body}")]
    Http { status: u16, url: String, body: String },

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Local IO ────────────────────────────────────────────────────
    /// Writing a downloaded file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(e) | Self::AuthTransport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns `true` for HTTP 401/403 -- the only statuses that
    /// trigger a session refresh and a single retry.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }
}
