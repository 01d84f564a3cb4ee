//! Client configuration, read once from the environment.

use std::time::Duration;

use log::debug;

use crate::auth::Credentials;
use crate::runtime::Runtime;

pub const DEFAULT_HOST: &str = "api.pyroprompts.com";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_REQUEST_MAX_ATTEMPTS: usize = 2;
pub const DEFAULT_REQUEST_WAIT_INTERVAL: Duration = Duration::from_secs(1);

pub const HOST_ENV: &str = "PYROPROMPTS_HOST";
pub const HTTPS_ENV: &str = "PYROPROMPTS_HTTPS";
pub const CLIENT_ID_ENV: &str = "PYROPROMPTS_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "PYROPROMPTS_CLIENT_SECRET";

/// Connection and retry settings for a [`crate::PyroPromptsClient`].
#[derive(Clone, PartialEq)]
pub struct ClientConfig {
    pub host: String,
    pub https: bool,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub request_timeout: Duration,
    pub request_max_attempts: usize,
    pub request_wait_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            https: true,
            client_id: None,
            client_secret: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            request_max_attempts: DEFAULT_REQUEST_MAX_ATTEMPTS,
            request_wait_interval: DEFAULT_REQUEST_WAIT_INTERVAL,
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("https", &self.https)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("request_timeout", &self.request_timeout)
            .field("request_max_attempts", &self.request_max_attempts)
            .field("request_wait_interval", &self.request_wait_interval)
            .finish()
    }
}

impl ClientConfig {
    /// Build a configuration from `PYROPROMPTS_*` environment variables,
    /// falling back to the defaults for anything unset.
    ///
    /// `PYROPROMPTS_HTTPS` selects plain http only when set to `0`.
    pub fn from_env<R: Runtime + ?Sized>(runtime: &R) -> Self {
        let defaults = Self::default();

        let host = runtime.env_var(HOST_ENV).unwrap_or(defaults.host);
        let https = runtime
            .env_var(HTTPS_ENV)
            .map(|value| value != "0")
            .unwrap_or(defaults.https);
        let client_id = runtime.env_var(CLIENT_ID_ENV).ok();
        let client_secret = runtime.env_var(CLIENT_SECRET_ENV).ok();

        debug!(
            "Loaded configuration from environment: host={}, https={}, client_id set={}",
            host,
            https,
            client_id.is_some()
        );

        Self {
            host,
            https,
            client_id,
            client_secret,
            ..defaults
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_https(mut self, https: bool) -> Self {
        self.https = https;
        self
    }

    pub fn with_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(client_secret.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_request_max_attempts(mut self, attempts: usize) -> Self {
        self.request_max_attempts = attempts;
        self
    }

    pub fn with_request_wait_interval(mut self, interval: Duration) -> Self {
        self.request_wait_interval = interval;
        self
    }

    pub fn scheme(&self) -> &'static str {
        if self.https { "https" } else { "http" }
    }

    /// Absolute URL for an API path such as `/api/workflow/trigger/`.
    pub fn full_url(&self, path: &str) -> String {
        format!("{}://{}{}", self.scheme(), self.host, path)
    }

    pub fn token_url(&self) -> String {
        self.full_url("/oa2/token/")
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.client_id.clone(), self.client_secret.clone())
    }
}
