//! Semantic retrieval: rank stored tables against a question
//!
//! Every distinct `(db_id, table_name, table_intent)` in the metadata store is
//! scored by cosine similarity between the question embedding and the
//! intent embedding. Entries whose intent is empty, missing, or only
//! whitespace cannot be scored and are skipped.
//!
//! Ordering is by score descending, then `db_id`, then `table_name`, so equal
//! scores always come back in the same order. A table stored with several
//! different intents appears once, with its best score.

use crate::error::EngineError;
use nl2sql_model::{cosine_similarity, Embedder, ModelError};
use nl2sql_store::{MetadataStore, TableIntent};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// A stored table with its similarity to the question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedTable {
    pub db_id: String,
    pub table_name: String,
    pub score: f32,
}

impl RankedTable {
    /// Drop the score
    pub fn key(&self) -> (String, String) {
        (self.db_id.clone(), self.table_name.clone())
    }
}

/// Ranks tables by embedding similarity between question and table intent
#[derive(Clone)]
pub struct SemanticRetriever {
    embedder: Arc<dyn Embedder>,
}

impl SemanticRetriever {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Top `top_k` `(db_id, table_name)` pairs across every stored database
    pub async fn top_tables(
        &self,
        store: &MetadataStore,
        question: &str,
        top_k: usize,
    ) -> Result<Vec<(String, String)>, EngineError> {
        let ranked = self.rank(store, question, top_k, None).await?;
        Ok(ranked.iter().map(RankedTable::key).collect())
    }

    /// Top `top_k` tables of one database
    pub async fn top_tables_in(
        &self,
        store: &MetadataStore,
        db_id: &str,
        question: &str,
        top_k: usize,
    ) -> Result<Vec<(String, String)>, EngineError> {
        let ranked = self.rank(store, question, top_k, Some(db_id)).await?;
        Ok(ranked.iter().map(RankedTable::key).collect())
    }

    /// Scored ranking, optionally limited to one database
    pub async fn rank(
        &self,
        store: &MetadataStore,
        question: &str,
        top_k: usize,
        db_id: Option<&str>,
    ) -> Result<Vec<RankedTable>, EngineError> {
        if top_k == 0 {
            return Err(EngineError::InvalidTopK);
        }

        let corpus: Vec<TableIntent> = store
            .table_intents()?
            .into_iter()
            .filter(|entry| db_id.map_or(true, |db| entry.db_id == db))
            .filter(|entry| {
                let scorable = !entry.table_intent.trim().is_empty();
                if !scorable {
                    debug!(db_id = %entry.db_id, table = %entry.table_name, "no table intent, not ranked");
                }
                scorable
            })
            .collect();

        if corpus.is_empty() {
            info!("no tables with intents to rank");
            return Ok(Vec::new());
        }

        let question_embedding = self.embedder.embed(question).await?;
        let intents: Vec<String> = corpus.iter().map(|entry| entry.table_intent.clone()).collect();
        let intent_embeddings = self.embedder.embed_batch(&intents).await?;
        if intent_embeddings.len() != corpus.len() {
            return Err(ModelError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                corpus.len(),
                intent_embeddings.len()
            ))
            .into());
        }

        let mut best: HashMap<(String, String), f32> = HashMap::new();
        for (entry, embedding) in corpus.into_iter().zip(intent_embeddings) {
            let score = cosine_similarity(&question_embedding, &embedding);
            best.entry((entry.db_id, entry.table_name))
                .and_modify(|current| {
                    if score > *current {
                        *current = score;
                    }
                })
                .or_insert(score);
        }

        let mut ranked: Vec<RankedTable> = best
            .into_iter()
            .map(|((db_id, table_name), score)| RankedTable { db_id, table_name, score })
            .collect();
        ranked.sort_by(compare_ranked);
        ranked.truncate(top_k);

        info!(
            candidates = ranked.len(),
            top = ?ranked.first().map(|r| (&r.db_id, &r.table_name, r.score)),
            "ranked tables"
        );
        Ok(ranked)
    }
}

fn compare_ranked(a: &RankedTable, b: &RankedTable) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.db_id.cmp(&b.db_id))
        .then_with(|| a.table_name.cmp(&b.table_name))
}
