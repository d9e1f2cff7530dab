//! Intent generation from a plain text-completion model
//!
//! [`CompletionIntentGenerator`] builds a two-example few-shot prompt that ends
//! in `Table Purpose:`, sends it to a [`TextCompleter`], and parses the
//! completion back into an [`IntentResponse`].

use crate::error::ModelError;
use crate::http::build_client;
use crate::service::{IntentGenerator, IntentResponse};
use nl2sql_core::ModelConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Completions are cut at the first occurrence of each marker, in order
pub const STOP_MARKERS: [&str; 4] = ["```", "2. Write a", "CREATE TABLE", "# Solution"];

const COLUMN_HEADER: &str = "Column Descriptions:";

const FEW_SHOT_PREAMBLE: &str = "\
You're a helpful assistant. You are given the name of a SQL table and a list of columns with their types.
Your task is to describe the likely purpose of this table in one sentence, and then describe what each listed column likely represents.

Only describe the columns listed. Do not add or describe any columns that are not explicitly given.

Example 1:
Table: inventory
Columns:
- item_id (INTEGER)
- item_name (TEXT)
- quantity (INTEGER)
- restock_date (DATE)

Table Purpose:
Tracks the stock levels and restocking schedules of items in a warehouse.

Column Descriptions:
- item_id: Unique identifier for each inventory item.
- item_name: Name or label of the item.
- quantity: Number of units currently in stock.
- restock_date: Date when the item is expected to be restocked.

---

Example 2:
Table: employee_attendance
Columns:
- employee_id (INTEGER)
- date (DATE)
- status (TEXT)

Table Purpose:
Logs the daily attendance status of company employees.

Column Descriptions:
- employee_id: Unique identifier for the employee.
- date: The calendar date of the attendance record.
- status: Attendance status for the day (e.g., Present, Absent, Sick).

---";

/// Render the few-shot prompt for one table
pub fn build_intent_prompt(table_name: &str, columns: &[String], data_types: &[String]) -> String {
    let column_lines: Vec<String> = columns
        .iter()
        .zip(data_types)
        .map(|(column, data_type)| format!("- {} ({})", column, data_type))
        .collect();

    format!(
        "{}\n\nTable: {}\nColumns:\n{}\n\nTable Purpose:\n",
        FEW_SHOT_PREAMBLE,
        table_name,
        column_lines.join("\n")
    )
}

/// Parse a completion into a table intent and column intents
///
/// Text before `Column Descriptions:` is the table intent. After it, only
/// `- column: intent` lines naming one of `columns` are kept. Without the
/// header the whole completion is the table intent.
pub fn parse_intent_completion(completion: &str, columns: &[String]) -> IntentResponse {
    let mut generated = completion.trim();
    for marker in STOP_MARKERS {
        if let Some(index) = generated.find(marker) {
            generated = generated[..index].trim();
        }
    }

    let Some((table_part, column_block)) = generated.split_once(COLUMN_HEADER) else {
        return IntentResponse::new(generated);
    };

    let expected: Vec<String> = columns.iter().map(|c| c.to_lowercase()).collect();
    let mut response = IntentResponse::new(table_part.trim());

    for line in column_block.trim().lines() {
        let Some(rest) = line.trim_start().strip_prefix('-') else {
            continue;
        };
        let Some((column, intent)) = rest.split_once(':') else {
            continue;
        };
        let column = column.trim().to_lowercase();
        if expected.contains(&column) {
            response.insert_column(&column, intent.trim());
        }
    }

    response
}

/// A model that continues a text prompt
#[async_trait::async_trait]
pub trait TextCompleter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;
}

/// Completion client for an OpenAI-compatible `/chat/completions` API
pub struct ChatCompleter {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl ChatCompleter {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Result<Self, ModelError> {
        Self::with_timeout(base_url, model, api_key, None)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ModelError> {
        Ok(Self {
            client: build_client(timeout)?,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            max_tokens: 300,
        })
    }

    /// Create from the `[model]` section, reading the key from `api_key_env`
    pub fn from_config(config: &ModelConfig) -> Result<Self, ModelError> {
        if config.completion_base_url.trim().is_empty() {
            return Err(ModelError::Config("model.completion_base_url is empty".to_string()));
        }
        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());
        Self::with_timeout(
            &config.completion_base_url,
            &config.completion_model,
            api_key,
            config.timeout_secs.map(Duration::from_secs),
        )
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait::async_trait]
impl TextCompleter for ChatCompleter {
    fn name(&self) -> &'static str {
        "chat"
    }

    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.0,
            "max_tokens": self.max_tokens
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ModelError::Network(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let response_json: serde_json::Value = response.json().await?;
        response_json
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .map(str::to_string)
            .ok_or_else(|| ModelError::InvalidResponse("No completion content in response".to_string()))
    }
}

/// Intent generator driven by a text completer and the few-shot prompt
#[derive(Clone)]
pub struct CompletionIntentGenerator {
    completer: Arc<dyn TextCompleter>,
}

impl CompletionIntentGenerator {
    pub fn new(completer: Arc<dyn TextCompleter>) -> Self {
        Self { completer }
    }
}

#[async_trait::async_trait]
impl IntentGenerator for CompletionIntentGenerator {
    fn name(&self) -> &'static str {
        "completion"
    }

    async fn generate_intents(
        &self,
        table_name: &str,
        columns: &[String],
        data_types: &[String],
    ) -> Result<IntentResponse, ModelError> {
        let prompt = build_intent_prompt(table_name, columns, data_types);
        let completion = self.completer.complete(&prompt).await?;
        debug!(table = table_name, completer = self.completer.name(), "parsing intent completion");
        Ok(parse_intent_completion(&completion, columns))
    }
}
