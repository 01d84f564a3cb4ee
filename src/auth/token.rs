use std::time::{Duration, SystemTime};

use anyhow::Result;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::ClientError;
use crate::http::{Headers, HttpRequest, Method, Transport};
use crate::runtime::Runtime;

/// How long before the advertised expiry a token is discarded.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Longest token lifetime honoured, keeping refresh instants representable.
const MAX_LIFETIME: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// The client id/secret pair exchanged for an access token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl Credentials {
    pub fn new(client_id: Option<String>, client_secret: Option<String>) -> Self {
        Self {
            client_id,
            client_secret,
        }
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .finish()
    }
}

/// The cached bearer token. `refresh_at` is set whenever `token` is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenState {
    pub token: Option<String>,
    pub refresh_at: Option<SystemTime>,
}

impl TokenState {
    pub fn is_expired(&self, now: SystemTime) -> bool {
        matches!(self.refresh_at, Some(refresh_at) if now > refresh_at)
    }

    fn clear(&mut self) {
        self.token = None;
        self.refresh_at = None;
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
}

// `scope` and `token_type` must be present but may hold any value.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: f64,
    scope: Value,
    token_type: Value,
}

/// Holds one access token and obtains a new one when the cache is empty.
///
/// The state lock is held across the exchange, so concurrent callers that
/// find the cache empty wait for a single exchange instead of each
/// starting their own.
#[derive(Debug)]
pub struct TokenManager {
    credentials: Credentials,
    token_url: String,
    state: Mutex<TokenState>,
}

impl TokenManager {
    pub fn new(credentials: Credentials, token_url: impl Into<String>) -> Self {
        Self {
            credentials,
            token_url: token_url.into(),
            state: Mutex::new(TokenState::default()),
        }
    }

    /// Returns the cached token, exchanging credentials for a new one when
    /// none is held.
    ///
    /// Expiry is not checked here; see [`TokenManager::clear_if_expired`].
    #[tracing::instrument(skip(self, transport, runtime))]
    pub async fn get_token<T, R>(&self, transport: &T, runtime: &R) -> Result<String>
    where
        T: Transport + ?Sized,
        R: Runtime + ?Sized,
    {
        let mut state = self.state.lock().await;
        if let Some(token) = &state.token {
            return Ok(token.clone());
        }

        let grant = self.exchange(transport).await?;
        let lifetime = token_lifetime(grant.expires_in);
        let refresh_at = runtime.now() + lifetime;

        debug!(
            "Obtained {} token (scope {}), refreshing in {}s",
            grant.token_type,
            grant.scope,
            lifetime.as_secs()
        );

        state.token = Some(grant.access_token.clone());
        state.refresh_at = Some(refresh_at);
        Ok(grant.access_token)
    }

    /// `Authorization: Bearer <token>`, exchanging for a token if needed.
    pub async fn get_headers<T, R>(&self, transport: &T, runtime: &R) -> Result<Headers>
    where
        T: Transport + ?Sized,
        R: Runtime + ?Sized,
    {
        let token = self.get_token(transport, runtime).await?;
        Ok(vec![(
            "Authorization".to_string(),
            format!("Bearer {}", token),
        )])
    }

    /// Drops the cached token when `now` is past its refresh instant.
    /// Returns whether anything was cleared.
    pub async fn clear_if_expired(&self, now: SystemTime) -> bool {
        let mut state = self.state.lock().await;
        if state.is_expired(now) {
            state.clear();
            true
        } else {
            false
        }
    }

    /// Snapshot of the cached token.
    pub async fn state(&self) -> TokenState {
        self.state.lock().await.clone()
    }

    async fn exchange<T: Transport + ?Sized>(&self, transport: &T) -> Result<TokenResponse> {
        let (Some(client_id), Some(client_secret)) = (
            self.credentials.client_id.as_deref(),
            self.credentials.client_secret.as_deref(),
        ) else {
            return Err(
                ClientError::TokenExchange("client id and secret are required".to_string()).into(),
            );
        };

        let body = serde_json::to_vec(&TokenRequest {
            grant_type: "client_credentials",
            client_id,
            client_secret,
        })?;

        debug!("Requesting access token from {}...", self.token_url);

        let response = transport
            .send(HttpRequest {
                method: Method::Post,
                url: self.token_url.clone(),
                headers: vec![("Content-Type".to_string(), "application/json".to_string())],
                body: Some(body),
            })
            .await?;

        if response.status != 200 {
            return Err(ClientError::TokenExchange(format!(
                "token endpoint returned status {}: {}",
                response.status, response.body
            ))
            .into());
        }

        serde_json::from_str::<TokenResponse>(&response.body).map_err(|e| {
            ClientError::TokenExchange(format!("unexpected token response: {}", e)).into()
        })
    }
}

/// Time until a token with the given `expires_in` must be refreshed.
///
/// Negative or NaN lifetimes count as zero and oversized ones are capped.
fn token_lifetime(expires_in: f64) -> Duration {
    let lifetime = Duration::try_from_secs_f64(expires_in).unwrap_or(if expires_in > 0.0 {
        MAX_LIFETIME
    } else {
        Duration::ZERO
    });
    lifetime.min(MAX_LIFETIME).saturating_sub(REFRESH_MARGIN)
}
