// Session management
//
// Owns the single current bearer token, obtains it lazily, and wraps
// authenticated operations with the retry-once-on-401/403 policy.

use std::future::Future;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::{Authenticator, Credentials};
use crate::error::Error;

/// The cached token and when it was issued. Replaced wholesale on refresh.
#[derive(Debug, Clone)]
struct SessionToken {
    token: SecretString,
    issued_at: DateTime<Utc>,
}

impl SessionToken {
    fn age_secs(&self) -> i64 {
        (Utc::now() - self.issued_at).num_seconds()
    }
}

/// Process-wide session: zero or one current token.
///
/// The token slot is guarded by an async mutex that stays locked across the
/// authentication call, so at most one exchange is in flight. There is no
/// background rotation; a caller that sees 401/403 asks for a refresh.
#[derive(Debug)]
pub struct Session {
    authenticator: Authenticator,
    credentials: Credentials,
    current: Mutex<Option<SessionToken>>,
}

impl Session {
    pub fn new(authenticator: Authenticator, credentials: Credentials) -> Self {
        Self {
            authenticator,
            credentials,
            current: Mutex::new(None),
        }
    }

    /// Current token, authenticating first if none is cached.
    pub async fn token(&self) -> Result<SecretString, Error> {
        let mut slot = self.current.lock().await;
        if let Some(ref cached) = *slot {
            return Ok(cached.token.clone());
        }
        debug!("no session token cached, authenticating");
        self.authenticate_into(&mut slot).await
    }

    /// Unconditionally authenticate and replace the cached token.
    pub async fn refresh(&self) -> Result<SecretString, Error> {
        let mut slot = self.current.lock().await;
        info!(
            token_age_secs = (*slot).as_ref().map(SessionToken::age_secs),
            "refreshing session token"
        );
        self.authenticate_into(&mut slot).await
    }

    /// Refresh only if `observed` is still the current token.
    ///
    /// A caller whose request failed with `observed` gets a fresh token;
    /// if another caller already replaced it in the meantime, that newer
    /// token is returned without a second exchange.
    pub async fn refresh_stale(&self, observed: &SecretString) -> Result<SecretString, Error> {
        let mut slot = self.current.lock().await;
        if let Some(ref cached) = *slot {
            if cached.token.expose_secret() != observed.expose_secret() {
                debug!("session token already refreshed by another caller");
                return Ok(cached.token.clone());
            }
            info!(token_age_secs = cached.age_secs(), "refreshing rejected session token");
        }
        self.authenticate_into(&mut slot).await
    }

    /// Run an authenticated operation with the retry-with-refresh policy.
    ///
    /// `op` receives the current token. If it fails with HTTP 401 or 403,
    /// the token is refreshed once and `op` runs exactly once more. Any
    /// other failure, and any failure of the retry, is returned unchanged.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T, Error>
    where
        F: Fn(SecretString) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let token = self.token().await?;
        match op(token.clone()).await {
            Err(err) if err.is_auth_failure() => {
                warn!(status = ?err.status(), "request rejected, refreshing session and retrying once");
                let fresh = self.refresh_stale(&token).await?;
                op(fresh).await
            }
            other => other,
        }
    }

    async fn authenticate_into(
        &self,
        slot: &mut Option<SessionToken>,
    ) -> Result<SecretString, Error> {
        let token = self
            .authenticator
            .authenticate(&self.credentials.api_key, &self.credentials.api_secret)
            .await?;
        *slot = Some(SessionToken {
            token: token.clone(),
            issued_at: Utc::now(),
        });
        Ok(token)
    }
}
