//! Client for the PyroPrompts API.
//!
//! [`PyroPromptsClient`] authenticates with an OAuth2 client-credentials
//! grant, keeps the resulting access token until shortly before it expires,
//! and exposes the workflow, store item and project snippet endpoints.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod runtime;

pub use client::PyroPromptsClient;
pub use config::ClientConfig;
pub use error::ClientError;
