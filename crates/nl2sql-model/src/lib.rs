//! Model collaborators for the NL-to-SQL pipeline
//!
//! Everything that talks to a language model or an embedding model sits behind
//! an async trait so the engine can be tested with mocks:
//! - [`IntentGenerator`]: table and column intents for one table
//! - [`SqlGenerator`]: SQL text for an assembled prompt
//! - [`Embedder`]: dense vectors for semantic retrieval
//! - [`TextCompleter`]: raw text completion, used by [`CompletionIntentGenerator`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use nl2sql_model::{HttpModelClient, IntentGenerator, SqlGenerator};
//!
//! let client = HttpModelClient::new("http://localhost:8000")?;
//! let intents = client.generate_intents("inventory", &columns, &types).await?;
//! let sql = client.generate_sql(&prompt).await?;
//! ```

pub mod error;
pub mod service;
pub mod http;
pub mod embedding;
pub mod intent;
pub mod sql;
pub mod mock;

pub use error::ModelError;
pub use service::{IntentGenerator, IntentRequest, IntentResponse, QueryRequest, QueryResponse, SqlGenerator};
pub use http::HttpModelClient;
pub use embedding::{
    cosine_similarity, embedder_from_config, Embedder, Embedding, HashingEmbedder, HttpEmbedder,
};
pub use intent::{
    build_intent_prompt, parse_intent_completion, ChatCompleter, CompletionIntentGenerator, TextCompleter,
    STOP_MARKERS,
};
pub use sql::clean_sql_response;
pub use mock::{MockCompleter, MockIntentGenerator, MockIntentGeneratorBuilder, MockSqlGenerator};
