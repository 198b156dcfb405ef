// Platform API HTTP client
//
// Wraps `reqwest::Client` with host-relative URL construction, token
// injection via the `api_key` query parameter, and status/JSON handling.
// Endpoint groups (datasets, packages) live in separate files as inherent
// methods so this module stays focused on transport mechanics.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::auth::{Authenticator, Credentials};
use crate::error::Error;
use crate::session::Session;
use crate::transport::TransportConfig;

const BODY_PREVIEW: usize = 200;

/// Authenticated client for the platform REST API.
///
/// Every endpoint goes through [`Session::call`], so a stale token is
/// refreshed once and the request retried once.
#[derive(Debug, Clone)]
pub struct PennsieveClient {
    http: reqwest::Client,
    api_host: Url,
    session: Arc<Session>,
}

impl PennsieveClient {
    /// Build the client, its authenticator and its session from credentials.
    pub fn new(
        credentials: Credentials,
        transport: &TransportConfig,
        identity_endpoint: Option<Url>,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        let mut authenticator = Authenticator::with_client(http.clone(), credentials.api_host.clone());
        if let Some(endpoint) = identity_endpoint {
            authenticator = authenticator.with_identity_endpoint(endpoint);
        }
        let api_host = credentials.api_host.clone();
        let session = Arc::new(Session::new(authenticator, credentials));
        Ok(Self {
            http,
            api_host,
            session,
        })
    }

    /// The shared session.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// The underlying HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{api_host}/{path}` with the session token appended as
    /// `api_key` after the given query pairs.
    pub(crate) fn api_url(
        &self,
        path: &str,
        query: &[(&str, &str)],
        token: &SecretString,
    ) -> Result<Url, Error> {
        let base = self.api_host.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/{}", path.trim_start_matches('/')))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
            pairs.append_pair("api_key", token.expose_secret());
        }
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and decode the JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", redact(&url));

        let resp = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "*/*")
            .send()
            .await?;

        parse_json(resp).await
    }

    /// Send a POST request with a JSON body and decode the JSON response.
    pub(crate) async fn post_json<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        debug!("POST {}", redact(&url));

        let resp = self
            .http
            .post(url)
            .header(reqwest::header::ACCEPT, "*/*")
            .json(body)
            .send()
            .await?;

        parse_json(resp).await
    }
}

/// Map non-success statuses to [`Error::Http`] and decode the body.
pub(crate) async fn parse_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let resp = check_status(resp).await?;
    let body = resp.text().await?;

    serde_json::from_str(&body).map_err(|e| {
        let preview = &body[..floor_char_boundary(&body, BODY_PREVIEW)];
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body: body.clone(),
        }
    })
}

/// Pass through success responses; turn everything else into [`Error::Http`].
pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let url = redact(resp.url());
    let body = resp.text().await.unwrap_or_default();
    let body = body[..floor_char_boundary(&body, BODY_PREVIEW)].to_owned();
    Err(Error::Http {
        status: status.as_u16(),
        url,
        body,
    })
}

/// URL without its query string, so tokens and presigned signatures
/// never reach logs or error messages.
pub(crate) fn redact(url: &Url) -> String {
    let mut clean = url.clone();
    clean.set_query(None);
    clean.to_string()
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(host: &str) -> PennsieveClient {
        let credentials = Credentials::new(
            Url::parse(host).expect("valid url"),
            "key",
            SecretString::from("secret".to_string()),
        );
        PennsieveClient::new(credentials, &TransportConfig::default(), None).expect("client")
    }

    #[test]
    fn api_url_appends_token_last() {
        let c = client("https://api.example.net/");
        let token = SecretString::from("tok".to_string());
        let url = c
            .api_url("/datasets/", &[("includeBannerUrl", "false")], &token)
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://api.example.net/datasets/?includeBannerUrl=false&api_key=tok"
        );
    }

    #[test]
    fn redact_drops_query() {
        let url = Url::parse("https://api.example.net/packages/download-manifest?api_key=tok")
            .expect("valid url");
        assert_eq!(redact(&url), "https://api.example.net/packages/download-manifest");
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let s = "aé";
        assert_eq!(floor_char_boundary(s, 2), 1);
        assert_eq!(floor_char_boundary(s, 10), s.len());
    }
}
