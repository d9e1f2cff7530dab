//! nl2sql engine - the metadata and retrieval pipeline
//!
//! - [`IntentEnricher`]: parsed tables + model intents into metadata rows
//! - [`Ingestor`]: DDL file + database file into the metadata store
//! - [`SemanticRetriever`]: rank stored tables against a question
//! - [`build_semantic_context`] and [`build_prompt`]: the prompt for the SQL model
//! - [`Assistant`]: question in, SQL and rows out

pub mod error;
pub mod enrich;
pub mod ingest;
pub mod retriever;
pub mod context;
pub mod prompt;
pub mod pipeline;

pub use error::EngineError;
pub use enrich::{EnrichmentReport, IntentEnricher};
pub use ingest::{IngestReport, Ingestor, TableSummary};
pub use retriever::{RankedTable, SemanticRetriever};
pub use context::{build_semantic_context, SemanticContext};
pub use prompt::{build_prompt, build_training_example, SQL_MARKER};
pub use pipeline::{Answer, AskOutcome, Assistant, PreparedPrompt, QueryOutcome, DEFAULT_TOP_K};
