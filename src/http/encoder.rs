//! Pluggable serialization of JSON request bodies.

use anyhow::{Context, Result};
use serde_json::Value;

/// Turns a request body into the bytes sent on the wire.
pub trait BodyEncoder: Send + Sync {
    fn encode(&self, body: &Value) -> Result<Vec<u8>>;
}

/// Plain `serde_json` encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl BodyEncoder for JsonEncoder {
    fn encode(&self, body: &Value) -> Result<Vec<u8>> {
        serde_json::to_vec(body).context("Failed to serialize request body")
    }
}

impl<F> BodyEncoder for F
where
    F: Fn(&Value) -> Result<Vec<u8>> + Send + Sync,
{
    fn encode(&self, body: &Value) -> Result<Vec<u8>> {
        self(body)
    }
}
