//! Mock model backends for testing
//!
//! These return canned answers without any network access and record what
//! they were asked, so tests can check call counts and prompts.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nl2sql_model::{IntentResponse, MockIntentGenerator, MockSqlGenerator};
//!
//! let intents = MockIntentGenerator::builder()
//!     .with_intents("inventory", IntentResponse::new("Tracks stock levels"))
//!     .with_failure("audit_log", ModelError::Status { status: 500, body: "boom".into() })
//!     .build();
//!
//! let sql = MockSqlGenerator::new("SELECT COUNT(*) FROM inventory");
//! ```

use crate::error::ModelError;
use crate::intent::TextCompleter;
use crate::service::{IntentGenerator, IntentResponse, SqlGenerator};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Mock intent generator keyed by table name
///
/// Tables without a configured response get an intent derived from their
/// name: `"Stores {table} records"`, and `"{column} of {table}"` per column.
#[derive(Clone)]
pub struct MockIntentGenerator {
    responses: Arc<HashMap<String, IntentResponse>>,
    errors: Arc<HashMap<String, ModelError>>,
    calls: Arc<RwLock<Vec<String>>>,
    latency_ms: u64,
}

impl MockIntentGenerator {
    pub fn new() -> Self {
        MockIntentGeneratorBuilder::new().build()
    }

    pub fn builder() -> MockIntentGeneratorBuilder {
        MockIntentGeneratorBuilder::new()
    }

    /// Table names requested so far, in call order
    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    fn derived(table_name: &str, columns: &[String]) -> IntentResponse {
        columns.iter().fold(
            IntentResponse::new(format!("Stores {} records", table_name)),
            |response, column| response.with_column(column, format!("{} of {}", column, table_name)),
        )
    }
}

impl Default for MockIntentGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IntentGenerator for MockIntentGenerator {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate_intents(
        &self,
        table_name: &str,
        columns: &[String],
        _data_types: &[String],
    ) -> Result<IntentResponse, ModelError> {
        simulate_latency(self.latency_ms).await;
        self.calls.write().await.push(table_name.to_string());

        if let Some(error) = self.errors.get(table_name) {
            return Err(error.clone());
        }

        Ok(self
            .responses
            .get(table_name)
            .cloned()
            .unwrap_or_else(|| Self::derived(table_name, columns)))
    }
}

/// Builder for [`MockIntentGenerator`]
pub struct MockIntentGeneratorBuilder {
    responses: HashMap<String, IntentResponse>,
    errors: HashMap<String, ModelError>,
    latency_ms: u64,
}

impl MockIntentGeneratorBuilder {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            errors: HashMap::new(),
            latency_ms: 0,
        }
    }

    /// Answer requests for `table_name` with `response`
    pub fn with_intents(mut self, table_name: &str, response: IntentResponse) -> Self {
        self.responses.insert(table_name.to_string(), response);
        self
    }

    /// Fail requests for `table_name`
    pub fn with_failure(mut self, table_name: &str, error: ModelError) -> Self {
        self.errors.insert(table_name.to_string(), error);
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn build(self) -> MockIntentGenerator {
        MockIntentGenerator {
            responses: Arc::new(self.responses),
            errors: Arc::new(self.errors),
            calls: Arc::new(RwLock::new(Vec::new())),
            latency_ms: self.latency_ms,
        }
    }
}

impl Default for MockIntentGeneratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Mock SQL generator returning a fixed answer
#[derive(Clone)]
pub struct MockSqlGenerator {
    response: Result<String, ModelError>,
    prompts: Arc<RwLock<Vec<String>>>,
}

impl MockSqlGenerator {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            response: Ok(sql.into()),
            prompts: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// A generator whose every call fails with `error`
    pub fn failing(error: ModelError) -> Self {
        Self {
            response: Err(error),
            prompts: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Prompts received so far
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.read().await.clone()
    }
}

#[async_trait::async_trait]
impl SqlGenerator for MockSqlGenerator {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate_sql(&self, prompt: &str) -> Result<String, ModelError> {
        self.prompts.write().await.push(prompt.to_string());
        self.response.clone()
    }
}

/// Mock text completer returning a fixed completion
#[derive(Clone)]
pub struct MockCompleter {
    completion: Result<String, ModelError>,
    prompts: Arc<RwLock<Vec<String>>>,
}

impl MockCompleter {
    pub fn new(completion: impl Into<String>) -> Self {
        Self {
            completion: Ok(completion.into()),
            prompts: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn failing(error: ModelError) -> Self {
        Self {
            completion: Err(error),
            prompts: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.read().await.clone()
    }
}

#[async_trait::async_trait]
impl TextCompleter for MockCompleter {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        self.prompts.write().await.push(prompt.to_string());
        self.completion.clone()
    }
}

async fn simulate_latency(latency_ms: u64) {
    if latency_ms > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(latency_ms)).await;
    }
}
