//! Single-shot HTTP exchanges.
//!
//! A [`Transport`] sends one request and reports what happened. It never
//! retries: a connection that cannot be established in time comes back as
//! [`ConnectTimeout`] so the dispatcher can decide, and every other
//! transport failure is passed through untouched.

use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::error::{ClientError, ConnectTimeout};

/// Ordered header name/value pairs.
pub type Headers = Vec<(String, String)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
        }
    }
}

impl FromStr for Method {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Method::Get),
            "post" => Ok(Method::Post),
            _ => Err(ClientError::UnsupportedMethod(s.to_string())),
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).context("Failed to parse JSON response")
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform exactly one HTTP exchange.
    ///
    /// Non-2xx statuses are returned as responses, not errors.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// [`Transport`] backed by a `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client where connecting and each read of the response are
    /// separately bounded by the configured request timeout.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("pyroprompts/", env!("PYROPROMPTS_VERSION")))
            .connect_timeout(config.request_timeout)
            .read_timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self::new(client))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!("{} {}...", request.method.as_str().to_uppercase(), request.url);

        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(classify_send_error)?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        debug!("{} {} -> {}", request.method.as_str().to_uppercase(), request.url, status);

        Ok(HttpResponse { status, body })
    }
}

/// Maps a connect-phase timeout to [`ConnectTimeout`] and leaves every other
/// reqwest error as is.
fn classify_send_error(error: reqwest::Error) -> anyhow::Error {
    if error.is_connect() && error.is_timeout() {
        let url = error
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        anyhow::Error::from(ConnectTimeout { url })
    } else {
        anyhow::Error::from(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    /// Resolves every name to a local address, but only after `delay`.
    struct SlowResolver {
        delay: Duration,
    }

    impl reqwest::dns::Resolve for SlowResolver {
        fn resolve(&self, _name: reqwest::dns::Name) -> reqwest::dns::Resolving {
            let delay = self.delay;
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                let addrs: reqwest::dns::Addrs =
                    Box::new(std::iter::once(SocketAddr::from(([127, 0, 0, 1], 9))));
                Ok(addrs)
            })
        }
    }

    fn request(method: Method, url: String) -> HttpRequest {
        HttpRequest {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("POST".parse::<Method>().unwrap(), Method::Post);

        let err = "delete".parse::<Method>().unwrap_err();
        assert!(matches!(err, ClientError::UnsupportedMethod(ref m) if m == "delete"));
    }

    #[test]
    fn test_response_is_success() {
        let response = |status| HttpResponse {
            status,
            body: String::new(),
        };
        assert!(response(200).is_success());
        assert!(response(204).is_success());
        assert!(!response(199).is_success());
        assert!(!response(300).is_success());
        assert!(!response(404).is_success());
    }

    #[test]
    fn test_response_json_malformed() {
        let response = HttpResponse {
            status: 200,
            body: "<html>oops</html>".to_string(),
        };
        let err = response.json::<serde_json::Value>().unwrap_err();
        assert!(err.downcast_ref::<serde_json::Error>().is_some());
    }

    #[tokio::test]
    async fn test_send_get_with_headers() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("GET", "/api/crud/store_items/")
            .match_header("authorization", "Bearer abc")
            .with_status(200)
            .with_body(r#"{"results": []}"#)
            .create_async()
            .await;

        let transport = ReqwestTransport::new(Client::new());
        let mut req = request(Method::Get, format!("{}/api/crud/store_items/", server.url()));
        req.headers
            .push(("Authorization".to_string(), "Bearer abc".to_string()));

        let response = transport.send(req).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, r#"{"results": []}"#);
    }

    #[tokio::test]
    async fn test_send_post_body() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("POST", "/api/workflow/trigger/")
            .match_header("content-type", "application/json")
            .match_body(Matcher::JsonString(r#"{"workflow": 7}"#.to_string()))
            .with_status(201)
            .with_body("{}")
            .create_async()
            .await;

        let transport = ReqwestTransport::new(Client::new());
        let mut req = request(Method::Post, format!("{}/api/workflow/trigger/", server.url()));
        req.headers
            .push(("Content-Type".to_string(), "application/json".to_string()));
        req.body = Some(br#"{"workflow":7}"#.to_vec());

        let response = transport.send(req).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, 201);
    }

    #[tokio::test]
    async fn test_send_error_status_is_a_response() {
        let mut server = mockito::Server::new_async().await;

        let _m = server
            .mock("GET", "/missing")
            .with_status(404)
            .with_body("not found")
            .create_async()
            .await;

        let transport = ReqwestTransport::new(Client::new());
        let response = transport
            .send(request(Method::Get, format!("{}/missing", server.url())))
            .await
            .unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.body, "not found");
    }

    #[tokio::test]
    async fn test_send_connection_refused_is_not_a_connect_timeout() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = ReqwestTransport::new(Client::new());
        let err = transport
            .send(request(Method::Get, format!("http://{}/", addr)))
            .await
            .unwrap_err();

        assert!(err.downcast_ref::<ConnectTimeout>().is_none());
        assert!(err.downcast_ref::<reqwest::Error>().is_some());
    }

    #[tokio::test]
    async fn test_send_slow_connect_is_a_connect_timeout() {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(300))
            .dns_resolver(Arc::new(SlowResolver {
                delay: Duration::from_secs(5),
            }))
            .build()
            .unwrap();

        let transport = ReqwestTransport::new(client);
        let start = Instant::now();
        let err = transport
            .send(request(Method::Get, "http://slow.invalid/".to_string()))
            .await
            .unwrap_err();

        assert!(start.elapsed() < Duration::from_secs(3));
        let timeout = err.downcast_ref::<ConnectTimeout>().unwrap();
        assert!(timeout.url.contains("slow.invalid"));
    }

    #[tokio::test]
    async fn test_send_stalled_response_hits_read_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Accept the connection and never answer.
        let server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let config = ClientConfig::default().with_request_timeout(Duration::from_millis(200));
        let transport = ReqwestTransport::from_config(&config).unwrap();

        let start = Instant::now();
        let err = transport
            .send(request(Method::Get, format!("http://{}/", addr)))
            .await
            .unwrap_err();

        assert!(start.elapsed() < Duration::from_secs(3));
        assert!(err.downcast_ref::<ConnectTimeout>().is_none());
        assert!(err.downcast_ref::<reqwest::Error>().is_some());

        server.abort();
    }

    #[test]
    fn test_from_config_builds() {
        let transport = ReqwestTransport::from_config(&ClientConfig::default());
        assert!(transport.is_ok());
    }
}
