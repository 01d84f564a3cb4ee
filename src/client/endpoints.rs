//! Endpoint catalog: thin wrappers over the dispatcher.

use anyhow::Result;
use serde_json::Value;
use url::form_urlencoded;

use crate::http::Transport;
use crate::runtime::Runtime;

use super::PyroPromptsClient;

pub const WORKFLOW_TRIGGER_PATH: &str = "/api/workflow/trigger/";
pub const WORKFLOW_EXECUTIONS_PATH: &str = "/api/crud/workflow_executions/";
pub const STORE_ITEMS_PATH: &str = "/api/crud/store_items/";
pub const PROJECT_SNIPPETS_PATH: &str = "/api/crud/project_snippets/";

/// Form-encodes filter pairs into a query string (without the leading `?`).
pub fn encode_query(filters: &[(&str, &str)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(filters)
        .finish()
}

fn with_query(path: &str, filters: &[(&str, &str)]) -> String {
    format!("{}?{}", path, encode_query(filters))
}

impl<T: Transport, R: Runtime> PyroPromptsClient<T, R> {
    /// Start a workflow run. `body` is sent as the trigger payload.
    #[tracing::instrument(skip(self, body))]
    pub async fn workflow_trigger(&self, body: &Value) -> Result<Value> {
        self.post(WORKFLOW_TRIGGER_PATH, body).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_workflow_executions(&self, filters: &[(&str, &str)]) -> Result<Value> {
        self.get(&with_query(WORKFLOW_EXECUTIONS_PATH, filters)).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_store_items(&self, filters: &[(&str, &str)]) -> Result<Value> {
        self.get(&with_query(STORE_ITEMS_PATH, filters)).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_project_snippets(&self, filters: &[(&str, &str)]) -> Result<Value> {
        self.get(&with_query(PROJECT_SNIPPETS_PATH, filters)).await
    }
}
