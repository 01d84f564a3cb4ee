//! Error classification for API calls.

/// Failures the client raises itself, as opposed to transport or decode
/// errors passed through from lower layers.
#[derive(Debug)]
pub enum ClientError {
    /// Every attempt failed to connect within the configured timeout
    Timeout { attempts: usize },
    /// The API answered with a status outside 2xx
    Status { status: u16, body: String },
    /// Method other than `get` or `post`
    UnsupportedMethod(String),
    /// The client-credentials exchange was rejected or returned an unusable body
    TokenExchange(String),
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout { .. })
    }

    /// HTTP status carried by a [`ClientError::Status`] error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Timeout { attempts } => {
                write!(f, "Request timed out after {} attempt(s)", attempts)
            }
            ClientError::Status { status, body } if body.is_empty() => {
                write!(f, "bad return status code: {}", status)
            }
            ClientError::Status { status, body } => {
                write!(f, "bad return status code: {} - {}", status, body)
            }
            ClientError::UnsupportedMethod(method) => {
                write!(f, "bad method: {}", method)
            }
            ClientError::TokenExchange(msg) => {
                write!(
                    f,
                    "Token exchange failed: {}. Check PYROPROMPTS_CLIENT_ID and PYROPROMPTS_CLIENT_SECRET.",
                    msg
                )
            }
        }
    }
}

impl std::error::Error for ClientError {}

/// A connection could not be established within the request timeout.
///
/// Transports return this (inside `anyhow::Error`) to mark the one failure
/// the dispatcher retries.
#[derive(Debug)]
pub struct ConnectTimeout {
    pub url: String,
}

impl std::fmt::Display for ConnectTimeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Timed out connecting to {}", self.url)
    }
}

impl std::error::Error for ConnectTimeout {}
