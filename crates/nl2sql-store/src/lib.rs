//! SQLite-backed storage
//!
//! Two resources live here:
//! - [`MetadataStore`]: the persistent registry of per-column metadata and
//!   intents, one row per (database, table, column)
//! - [`DatabaseFile`]: an uploaded database file that generated SQL is run
//!   against
//!
//! ## Example
//!
//! ```rust,ignore
//! use nl2sql_store::MetadataStore;
//!
//! let store = MetadataStore::open("metadata_store.db")?;
//! store.initialize()?;
//! store.insert(&records)?;
//! let intent = store.table_intent("hr.db", "employee_attendance")?;
//! ```

pub mod error;
pub mod metadata;
pub mod database;

pub use error::StoreError;
pub use metadata::{MetadataStore, TableIntent, METADATA_TABLE};
pub use database::{import_database_file, stage_database_file, upload_id, DatabaseFile, QueryRows, StagedUpload};
