//! Question answering: retrieve, assemble, generate, execute
//!
//! Retrieval and prompt assembly errors propagate, as do SQL-service errors.
//! Errors from running the generated SQL do not: they come back as
//! [`QueryOutcome::Failed`] with a printable message.

use crate::context::{build_semantic_context, SemanticContext};
use crate::error::EngineError;
use crate::prompt::build_prompt;
use crate::retriever::{RankedTable, SemanticRetriever};
use nl2sql_model::{clean_sql_response, Embedder, SqlGenerator};
use nl2sql_store::{DatabaseFile, MetadataStore, QueryRows};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Default number of tables placed in a prompt
pub const DEFAULT_TOP_K: usize = 4;

/// A prompt ready for the SQL service
#[derive(Debug, Clone)]
pub struct PreparedPrompt {
    pub question: String,
    pub ranked: Vec<RankedTable>,
    pub context: SemanticContext,
    pub prompt: String,
}

/// Result of running generated SQL
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Rows(QueryRows),

    /// Execution failed; the message is meant for the user
    Failed(String),
}

/// A generated query and what running it produced
#[derive(Debug, Clone)]
pub struct Answer {
    pub prepared: PreparedPrompt,
    pub sql: String,
    pub outcome: QueryOutcome,
}

#[derive(Debug, Clone)]
pub enum AskOutcome {
    /// No stored table has a usable intent; the SQL service was not called
    NoRelevantTables,

    Answered(Answer),
}

/// Answers questions against uploaded databases
pub struct Assistant {
    store: Arc<MetadataStore>,
    retriever: SemanticRetriever,
    generator: Arc<dyn SqlGenerator>,
    uploads_dir: PathBuf,
    top_k: usize,
}

impl Assistant {
    pub fn new(
        store: Arc<MetadataStore>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn SqlGenerator>,
        uploads_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            retriever: SemanticRetriever::new(embedder),
            generator,
            uploads_dir: uploads_dir.into(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Rank tables and render the prompt without calling the SQL service
    ///
    /// `db_id` limits ranking to one database. `None` when nothing ranks.
    pub async fn prepare(&self, question: &str, db_id: Option<&str>) -> Result<Option<PreparedPrompt>, EngineError> {
        let ranked = self.retriever.rank(&self.store, question, self.top_k, db_id).await?;
        let keys: Vec<(String, String)> = ranked.iter().map(RankedTable::key).collect();

        let Some(context) = build_semantic_context(&self.store, &keys)? else {
            return Ok(None);
        };

        let prompt = build_prompt(question, &context.db_id, &context.tables, true);
        Ok(Some(PreparedPrompt {
            question: question.to_string(),
            ranked,
            context,
            prompt,
        }))
    }

    /// Answer a question end to end
    pub async fn ask(&self, question: &str, db_id: Option<&str>) -> Result<AskOutcome, EngineError> {
        let Some(prepared) = self.prepare(question, db_id).await? else {
            info!("no relevant tables for question");
            return Ok(AskOutcome::NoRelevantTables);
        };

        let raw = self.generator.generate_sql(&prepared.prompt).await?;
        let sql = clean_sql_response(&raw);
        info!(db_id = %prepared.context.db_id, generator = self.generator.name(), "generated SQL");

        let outcome = self.execute(&prepared.context.db_id, &sql);
        Ok(AskOutcome::Answered(Answer { prepared, sql, outcome }))
    }

    /// Run SQL against `uploads_dir/<db_id>`, catching every failure
    pub fn execute(&self, db_id: &str, sql: &str) -> QueryOutcome {
        let path = self.uploads_dir.join(db_id);
        match DatabaseFile::open(&path).and_then(|db| db.query(sql)) {
            Ok(rows) => QueryOutcome::Rows(rows),
            Err(e) => {
                warn!(db_id, error = %e, "generated SQL failed");
                QueryOutcome::Failed(format!("Error executing SQL: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl2sql_core::ColumnMetadata;
    use nl2sql_model::{HashingEmbedder, MockSqlGenerator, ModelError};

    fn store() -> Arc<MetadataStore> {
        let store = MetadataStore::open_in_memory().unwrap();
        store.initialize().unwrap();
        Arc::new(store)
    }

    fn embedder() -> Arc<dyn Embedder> {
        Arc::new(HashingEmbedder::new(512).unwrap())
    }

    #[tokio::test]
    async fn empty_store_short_circuits() {
        let generator = MockSqlGenerator::new("SELECT 1");
        let assistant = Assistant::new(store(), embedder(), Arc::new(generator.clone()), "uploaded_dbs");

        let outcome = assistant.ask("how many orders?", None).await.unwrap();
        assert!(matches!(outcome, AskOutcome::NoRelevantTables));
        assert!(generator.prompts().await.is_empty());
    }

    #[tokio::test]
    async fn missing_database_file_is_caught() {
        let store = store();
        store
            .insert(&[ColumnMetadata::new("gone.db", "orders", "id", "INTEGER").with_intents("Customer orders", "")])
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let assistant = Assistant::new(store, embedder(), Arc::new(MockSqlGenerator::new("SELECT 1")), dir.path());

        let AskOutcome::Answered(answer) = assistant.ask("list orders", None).await.unwrap() else {
            panic!("expected an answer");
        };
        match answer.outcome {
            QueryOutcome::Failed(message) => {
                assert!(message.starts_with("Error executing SQL: "));
                assert!(message.contains("gone.db"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn sql_service_errors_propagate() {
        let store = store();
        store
            .insert(&[ColumnMetadata::new("a.db", "orders", "id", "INTEGER").with_intents("Customer orders", "")])
            .unwrap();
        let generator = MockSqlGenerator::failing(ModelError::Status { status: 502, body: "bad gateway".to_string() });
        let assistant = Assistant::new(store, embedder(), Arc::new(generator), "uploaded_dbs");

        let result = assistant.ask("list orders", None).await;
        assert!(matches!(result, Err(EngineError::Model(ModelError::Status { status: 502, .. }))));
    }

    #[tokio::test]
    async fn zero_top_k_is_an_error() {
        let assistant = Assistant::new(store(), embedder(), Arc::new(MockSqlGenerator::new("")), "uploaded_dbs")
            .with_top_k(0);
        assert!(matches!(assistant.prepare("q", None).await, Err(EngineError::InvalidTopK)));
    }
}
