//! Intent and SQL generation seams

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request body of the intent service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentRequest {
    pub table_name: String,
    pub columns: Vec<String>,
    pub data_types: Vec<String>,
}

/// Table purpose plus one description per column
///
/// Column keys are stored lowercase so lookups ignore the DDL's casing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntentResponse {
    pub table_intent: String,
    column_intents: BTreeMap<String, String>,
}

impl IntentResponse {
    pub fn new(table_intent: impl Into<String>) -> Self {
        Self {
            table_intent: table_intent.into(),
            column_intents: BTreeMap::new(),
        }
    }

    /// Add a column description; later entries for the same column win
    pub fn with_column(mut self, column: &str, intent: impl Into<String>) -> Self {
        self.insert_column(column, intent);
        self
    }

    pub fn insert_column(&mut self, column: &str, intent: impl Into<String>) {
        self.column_intents.insert(column.to_lowercase(), intent.into());
    }

    /// Description of a column, case-insensitive
    pub fn column_intent(&self, column: &str) -> Option<&str> {
        self.column_intents.get(&column.to_lowercase()).map(String::as_str)
    }

    pub fn column_intents(&self) -> &BTreeMap<String, String> {
        &self.column_intents
    }
}

// The service may send nulls for either field
#[derive(Deserialize)]
struct IntentPayload {
    #[serde(default)]
    table_intent: Option<String>,
    #[serde(default)]
    column_intents: Option<BTreeMap<String, Option<String>>>,
}

impl<'de> Deserialize<'de> for IntentResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let payload = IntentPayload::deserialize(deserializer)?;
        let mut response = IntentResponse::new(payload.table_intent.unwrap_or_default());
        for (column, intent) in payload.column_intents.unwrap_or_default() {
            response.insert_column(&column, intent.unwrap_or_default());
        }
        Ok(response)
    }
}

/// Request body of the SQL service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub prompt: String,
}

/// Response body of the SQL service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub sql_query: String,
}

/// Produces natural-language intents for a table and its columns
#[async_trait::async_trait]
pub trait IntentGenerator: Send + Sync {
    /// Backend name for logs (e.g. "http", "completion")
    fn name(&self) -> &'static str;

    /// Describe one table
    ///
    /// Called once per table. `columns` and `data_types` are parallel.
    async fn generate_intents(
        &self,
        table_name: &str,
        columns: &[String],
        data_types: &[String],
    ) -> Result<IntentResponse, ModelError>;
}

/// Turns an assembled prompt into SQL text
#[async_trait::async_trait]
pub trait SqlGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate_sql(&self, prompt: &str) -> Result<String, ModelError>;
}
