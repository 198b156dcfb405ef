// Credential authentication
//
// Exchanges a long-lived API key/secret pair for a short-lived bearer
// token. The platform publishes its identity-pool configuration at
// `/authentication/cognito-config`; the key/secret then go through a
// USER_PASSWORD_AUTH InitiateAuth call against that pool. InitiateAuth is
// an unsigned JSON-1.1 call, so no service credentials are involved.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;

/// Production API host.
pub const DEFAULT_API_HOST: &str = "https://api.pennsieve.net";

const INITIATE_AUTH_TARGET: &str = "AWSCognitoIdentityProviderService.InitiateAuth";
const AMZ_JSON: &str = "application/x-amz-json-1.1";

/// Long-lived API credentials. Immutable for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_host: Url,
    pub api_key: String,
    pub api_secret: SecretString,
}

impl Credentials {
    pub fn new(api_host: Url, api_key: impl Into<String>, api_secret: SecretString) -> Self {
        Self {
            api_host,
            api_key: api_key.into(),
            api_secret,
        }
    }
}

/// Identity-pool settings published by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityConfig {
    pub token_pool: TokenPool,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPool {
    pub app_client_id: String,
}

#[derive(Deserialize)]
struct InitiateAuthResponse {
    #[serde(rename = "AuthenticationResult")]
    authentication_result: Option<AuthenticationResult>,
    #[serde(rename = "ChallengeName")]
    challenge_name: Option<String>,
}

#[derive(Deserialize)]
struct AuthenticationResult {
    #[serde(rename = "AccessToken")]
    access_token: String,
}

/// Error body returned by the identity provider on 4xx.
#[derive(Deserialize)]
struct IdentityError {
    #[serde(rename = "__type", default)]
    kind: Option<String>,
    #[serde(default, alias = "Message")]
    message: Option<String>,
}

/// Exchanges API credentials for bearer tokens. Never retries -- retrying
/// is the session's job.
#[derive(Debug, Clone)]
pub struct Authenticator {
    http: reqwest::Client,
    api_host: Url,
    /// Overrides the regional identity endpoint derived from the pool config.
    identity_endpoint: Option<Url>,
}

impl Authenticator {
    /// Create an authenticator around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, api_host: Url) -> Self {
        Self {
            http,
            api_host,
            identity_endpoint: None,
        }
    }

    /// Send the token exchange to `endpoint` instead of the regional
    /// `cognito-idp` host.
    pub fn with_identity_endpoint(mut self, endpoint: Url) -> Self {
        self.identity_endpoint = Some(endpoint);
        self
    }

    /// Fetch the identity-pool configuration document.
    pub async fn identity_config(&self) -> Result<IdentityConfig, Error> {
        let base = self.api_host.as_str().trim_end_matches('/');
        let url = Url::parse(&format!("{base}/authentication/cognito-config"))?;

        debug!("fetching identity configuration from {}", url);

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(Error::AuthTransport)?;

        let body = resp.text().await.map_err(Error::AuthTransport)?;

        serde_json::from_str(&body).map_err(|e| Error::AuthProtocol {
            message: format!("invalid identity configuration: {e}"),
        })
    }

    /// Exchange `api_key`/`api_secret` for a bearer token.
    pub async fn authenticate(
        &self,
        api_key: &str,
        api_secret: &SecretString,
    ) -> Result<SecretString, Error> {
        let config = self.identity_config().await?;
        let endpoint = self.identity_endpoint_for(&config.region)?;

        debug!(region = %config.region, "exchanging API key for session token at {}", endpoint);

        let body = json!({
            "AuthFlow": "USER_PASSWORD_AUTH",
            "AuthParameters": {
                "USERNAME": api_key,
                "PASSWORD": api_secret.expose_secret(),
            },
            "ClientId": config.token_pool.app_client_id,
        });

        let resp = self
            .http
            .post(endpoint)
            .header(reqwest::header::CONTENT_TYPE, AMZ_JSON)
            .header("X-Amz-Target", INITIATE_AUTH_TARGET)
            .body(body.to_string())
            .send()
            .await
            .map_err(Error::AuthTransport)?;

        let status = resp.status();
        if status.is_client_error() {
            let text = resp.text().await.unwrap_or_default();
            let parsed: Option<IdentityError> = serde_json::from_str(&text).ok();
            let (kind, message) = parsed.map_or_else(
                || (format!("HTTP {status}"), text.clone()),
                |e| {
                    (
                        e.kind.unwrap_or_else(|| format!("HTTP {status}")),
                        e.message.unwrap_or_default(),
                    )
                },
            );
            warn!(%kind, "identity provider rejected credentials");
            return Err(Error::AuthRejected { kind, message });
        }

        let resp = resp.error_for_status().map_err(Error::AuthTransport)?;
        let text = resp.text().await.map_err(Error::AuthTransport)?;

        let parsed: InitiateAuthResponse =
            serde_json::from_str(&text).map_err(|e| Error::AuthProtocol {
                message: format!("invalid token exchange response: {e}"),
            })?;

        match parsed.authentication_result {
            Some(result) => {
                debug!("session token issued");
                Ok(SecretString::from(result.access_token))
            }
            None => Err(Error::AuthProtocol {
                message: parsed.challenge_name.map_or_else(
                    || "token exchange response has no AuthenticationResult".into(),
                    |c| format!("unexpected authentication challenge '{c}'"),
                ),
            }),
        }
    }

    fn identity_endpoint_for(&self, region: &str) -> Result<Url, Error> {
        if let Some(ref endpoint) = self.identity_endpoint {
            return Ok(endpoint.clone());
        }
        if region.is_empty() {
            return Err(Error::AuthProtocol {
                message: "identity configuration has an empty region".into(),
            });
        }
        Ok(Url::parse(&format!(
            "https://cognito-idp.{region}.amazonaws.com/"
        ))?)
    }
}
