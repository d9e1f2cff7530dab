//! HTTP client for the model server
//!
//! The server exposes two JSON endpoints:
//! - `POST {base}/generate_intents` with `{table_name, columns, data_types}`,
//!   answering `{table_intent, column_intents}`
//! - `POST {base}/generate_query` with `{prompt}`, answering `{sql_query}`
//!
//! Any non-2xx status is returned as [`ModelError::Status`] with the body text.

use crate::error::ModelError;
use crate::service::{IntentGenerator, IntentRequest, IntentResponse, QueryRequest, QueryResponse, SqlGenerator};
use nl2sql_core::ModelConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// HTTP client shared by every model collaborator; no timeout when `None`
pub(crate) fn build_client(timeout: Option<Duration>) -> Result<reqwest::Client, ModelError> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| ModelError::Config(format!("failed to build HTTP client: {}", e)))
}

/// Client for a model server hosting both intent and SQL generation
#[derive(Debug, Clone)]
pub struct HttpModelClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpModelClient {
    /// Create a client without a request timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self, ModelError> {
        Self::with_timeout(base_url, None)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, ModelError> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            return Err(ModelError::Config("model server URL is empty".to_string()));
        }

        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from the `[model]` config section
    pub fn from_config(config: &ModelConfig) -> Result<Self, ModelError> {
        let url = config
            .server_url
            .as_deref()
            .ok_or_else(|| ModelError::Config("no model server URL configured".to_string()))?;
        Self::with_timeout(url, config.timeout_secs.map(Duration::from_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ModelError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path);
        debug!(url = %url, "POST");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| ModelError::Network(format!("{} request failed: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| ModelError::InvalidResponse(format!("{} returned unexpected JSON: {}", path, e)))
    }
}

#[async_trait::async_trait]
impl IntentGenerator for HttpModelClient {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn generate_intents(
        &self,
        table_name: &str,
        columns: &[String],
        data_types: &[String],
    ) -> Result<IntentResponse, ModelError> {
        let request = IntentRequest {
            table_name: table_name.to_string(),
            columns: columns.to_vec(),
            data_types: data_types.to_vec(),
        };
        self.post_json("generate_intents", &request).await
    }
}

#[async_trait::async_trait]
impl SqlGenerator for HttpModelClient {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn generate_sql(&self, prompt: &str) -> Result<String, ModelError> {
        let request = QueryRequest {
            prompt: prompt.to_string(),
        };
        let response: QueryResponse = self.post_json("generate_query", &request).await?;
        Ok(response.sql_query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = HttpModelClient::new("http://localhost:8000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.endpoint("generate_query"), "http://localhost:8000/generate_query");
    }

    #[test]
    fn empty_url_is_rejected() {
        assert!(matches!(HttpModelClient::new("  "), Err(ModelError::Config(_))));
    }

    #[test]
    fn from_config_requires_url() {
        let config = ModelConfig::default();
        assert!(matches!(HttpModelClient::from_config(&config), Err(ModelError::Config(_))));

        let config = ModelConfig {
            server_url: Some("http://model:8000".to_string()),
            timeout_secs: Some(30),
            ..ModelConfig::default()
        };
        assert_eq!(HttpModelClient::from_config(&config).unwrap().base_url(), "http://model:8000");
    }
}
