// pennsync-api: Async Rust client for the Pennsieve platform API

pub mod auth;
pub mod client;
pub mod datasets;
pub mod error;
pub mod packages;
pub mod session;
pub mod transport;

pub use auth::{Authenticator, Credentials, DEFAULT_API_HOST, IdentityConfig};
pub use client::PennsieveClient;
pub use datasets::{DatasetContent, DatasetEnvelope};
pub use error::Error;
pub use packages::{DownloadManifest, DownloadTarget, PACKAGE_PREFIX};
pub use session::Session;
pub use transport::{TlsMode, TransportConfig};
