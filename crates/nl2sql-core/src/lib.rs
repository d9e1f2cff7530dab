//! nl2sql core
//!
//! Shared domain model for the schema metadata pipeline.
//! Never rename diagnostic codes - they are part of the public API.

pub mod diagnostic;
pub mod schema;
pub mod config;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity, Location};
pub use schema::{ColumnMetadata, TableSkeleton, SchemaDescriptor, ColumnInfo, ColumnSpec};
pub use config::{
    Config, ConfigError, DialectConfig, StoreConfig, ModelConfig, EmbeddingConfig,
    EmbeddingProvider, IntentSource, RetrievalConfig, MODEL_SERVER_URL_ENV,
};
