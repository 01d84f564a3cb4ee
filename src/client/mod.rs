//! Authenticated request dispatch.

mod endpoints;

use std::sync::Arc;

use anyhow::Result;
use log::{Level, debug, warn};
use serde_json::{Value, json};

use crate::auth::TokenManager;
use crate::config::ClientConfig;
use crate::error::{ClientError, ConnectTimeout};
use crate::events::{EventSink, Fields, StdoutSink};
use crate::http::{
    BodyEncoder, Headers, HttpRequest, HttpResponse, JsonEncoder, Method, ReqwestTransport,
    Transport,
};
use crate::runtime::{RealRuntime, Runtime};

pub use endpoints::encode_query;

/// Client for the PyroPrompts API.
///
/// Holds one access token, obtained through the client-credentials grant
/// and refreshed shortly before it expires.
pub struct PyroPromptsClient<T: Transport = ReqwestTransport, R: Runtime = RealRuntime> {
    config: ClientConfig,
    transport: T,
    runtime: R,
    tokens: TokenManager,
    sink: Arc<dyn EventSink>,
    encoder: Arc<dyn BodyEncoder>,
}

impl PyroPromptsClient {
    /// Client talking to the real API over reqwest.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::from_config(&config)?;
        Ok(Self::with_parts(config, transport, RealRuntime))
    }

    /// Client configured entirely from `PYROPROMPTS_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env(&RealRuntime))
    }
}

impl<T: Transport, R: Runtime> PyroPromptsClient<T, R> {
    pub fn with_parts(config: ClientConfig, transport: T, runtime: R) -> Self {
        let tokens = TokenManager::new(config.credentials(), config.token_url());

        Self {
            config,
            transport,
            runtime,
            tokens,
            sink: Arc::new(StdoutSink),
            encoder: Arc::new(JsonEncoder),
        }
    }

    /// Replace the default stdout event sink.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the default `serde_json` body encoder used for POST requests.
    pub fn with_body_encoder(mut self, encoder: Arc<dyn BodyEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn token_manager(&self) -> &TokenManager {
        &self.tokens
    }

    /// Returns the cached access token, exchanging credentials if none is held.
    pub async fn get_token(&self) -> Result<String> {
        self.tokens.get_token(&self.transport, &self.runtime).await
    }

    /// Bearer authorization header for the current token.
    ///
    /// Expiry is only enforced at the start of [`Self::make_request`], so
    /// calling this directly on a long-lived client can return a token past
    /// its refresh instant.
    pub async fn get_headers(&self) -> Result<Headers> {
        self.tokens.get_headers(&self.transport, &self.runtime).await
    }

    pub fn get_full_url(&self, path: &str) -> String {
        self.config.full_url(path)
    }

    /// GET `path` with the configured attempt budget.
    pub async fn get(&self, path: &str) -> Result<Value> {
        self.make_request(path, "get", None, None, self.config.request_max_attempts)
            .await
    }

    /// POST `body` as JSON to `path` with the configured attempt budget.
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.make_request(
            path,
            "post",
            Some(body),
            None,
            self.config.request_max_attempts,
        )
        .await
    }

    /// Issues one API request and returns the decoded JSON payload.
    ///
    /// `method` is `get` or `post`. When `headers` is `None` the bearer
    /// header is used, exchanging credentials first if needed. Only
    /// connect timeouts are retried, up to `max_attempts` attempts in total
    /// with the configured wait between them. A non-2xx status fails with
    /// [`ClientError::Status`] and other transport errors propagate as is.
    #[tracing::instrument(skip(self, body, headers))]
    pub async fn make_request(
        &self,
        path: &str,
        method: &str,
        body: Option<&Value>,
        headers: Option<Headers>,
        max_attempts: usize,
    ) -> Result<Value> {
        let method: Method = method.parse()?;
        let data = body.cloned().unwrap_or(Value::Null);

        if self.tokens.clear_if_expired(self.runtime.now()).await {
            debug!("Cached token expired, requesting a new one");
        }

        let headers = match headers {
            Some(headers) => headers,
            None => self.get_headers().await?,
        };

        let request = self.build_request(method, path, &data, headers)?;

        let mut remaining_attempts = max_attempts;
        while remaining_attempts > 0 {
            remaining_attempts -= 1;

            match self.transport.send(request.clone()).await {
                Ok(response) => {
                    return self.handle_response(response, method, path, &data, remaining_attempts);
                }
                Err(e) if e.downcast_ref::<ConnectTimeout>().is_some() => {
                    let fields = event_fields(remaining_attempts, method, path, &data);
                    self.sink.log(Level::Error, "request.timeout", &fields);

                    if remaining_attempts == 0 {
                        return Err(ClientError::Timeout {
                            attempts: max_attempts,
                        }
                        .into());
                    }

                    warn!(
                        "{}: {} attempt(s) left, retrying in {}ms...",
                        e,
                        remaining_attempts,
                        self.config.request_wait_interval.as_millis()
                    );
                    self.runtime.sleep(self.config.request_wait_interval).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(ClientError::Timeout {
            attempts: max_attempts,
        }
        .into())
    }

    fn build_request(
        &self,
        method: Method,
        path: &str,
        data: &Value,
        headers: Headers,
    ) -> Result<HttpRequest> {
        let (headers, body) = match method {
            Method::Get => (headers, None),
            Method::Post => {
                let body = self.encoder.encode(data)?;
                (merge_headers(json_headers(), headers), Some(body))
            }
        };

        Ok(HttpRequest {
            method,
            url: self.get_full_url(path),
            headers,
            body,
        })
    }

    fn handle_response(
        &self,
        response: HttpResponse,
        method: Method,
        path: &str,
        data: &Value,
        remaining_attempts: usize,
    ) -> Result<Value> {
        let mut fields = event_fields(remaining_attempts, method, path, data);
        fields.insert("status_code".to_string(), json!(response.status));

        if !response.is_success() {
            fields.insert("response".to_string(), json!(response.body));
            self.sink
                .log(Level::Error, "make_load_request.error_status_code", &fields);
            return Err(ClientError::Status {
                status: response.status,
                body: response.body,
            }
            .into());
        }

        let payload: Value = response.json()?;
        fields.insert("response".to_string(), payload.clone());
        self.sink.log(Level::Info, "request.success", &fields);
        Ok(payload)
    }
}

fn event_fields(remaining_attempts: usize, method: Method, path: &str, data: &Value) -> Fields {
    let mut fields = Fields::new();
    fields.insert("remaining_attempts".to_string(), json!(remaining_attempts));
    fields.insert("method".to_string(), json!(method.as_str()));
    fields.insert("url".to_string(), json!(path));
    fields.insert("data".to_string(), data.clone());
    fields
}

fn json_headers() -> Headers {
    vec![("Content-Type".to_string(), "application/json".to_string())]
}

/// Appends `overrides` to `base`, replacing same-named headers.
fn merge_headers(mut base: Headers, overrides: Headers) -> Headers {
    for (name, value) in overrides {
        base.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        base.push((name, value));
    }
    base
}
