//! Ingestion of a DDL file and its database file
//!
//! The database file name becomes the `db_id`. The DDL is parsed and every
//! table is enriched before anything is written. The upload is then staged
//! next to its final location, the metadata rows are stored, and only then is
//! the staged copy renamed over `uploads_dir/<db_id>`. A failure at any step
//! leaves the previous upload and its rows as they were.
//!
//! Unless appending, earlier rows of the same `db_id` are swapped for the new
//! ones in one transaction.

use crate::enrich::IntentEnricher;
use crate::error::EngineError;
use nl2sql_core::{ColumnMetadata, Diagnostic, DiagnosticCode, Location, Severity};
use nl2sql_ddl::DdlParser;
use nl2sql_model::IntentGenerator;
use nl2sql_store::{stage_database_file, upload_id, MetadataStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// One table of an ingestion summary
#[derive(Debug, Clone, PartialEq)]
pub struct TableSummary<'a> {
    pub table_name: &'a str,
    pub table_intent: &'a str,
    pub columns: Vec<&'a ColumnMetadata>,
}

/// What one ingestion did
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub db_id: String,
    pub ddl_path: PathBuf,
    /// Upload location, `uploads_dir/<db_id>`
    pub database_path: PathBuf,

    /// Rows written, in insertion order
    pub records: Vec<ColumnMetadata>,

    /// Rows removed before writing
    pub replaced_rows: usize,

    /// Parser and enrichment diagnostics
    pub diagnostics: Vec<Diagnostic>,
}

impl IngestReport {
    /// Whether the DDL produced no tables
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records grouped by table, tables in first-seen order
    pub fn tables(&self) -> Vec<TableSummary<'_>> {
        let mut tables: Vec<TableSummary<'_>> = Vec::new();
        for record in &self.records {
            match tables.iter_mut().find(|t| t.table_name == record.table_name) {
                Some(table) => table.columns.push(record),
                None => tables.push(TableSummary {
                    table_name: &record.table_name,
                    table_intent: &record.table_intent,
                    columns: vec![record],
                }),
            }
        }
        tables
    }
}

/// Runs ingestion for (DDL file, database file) pairs
pub struct Ingestor {
    parser: DdlParser,
    enricher: IntentEnricher,
    uploads_dir: PathBuf,
    append: bool,
}

impl Ingestor {
    pub fn new(parser: DdlParser, generator: Arc<dyn IntentGenerator>, uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            parser,
            enricher: IntentEnricher::new(generator),
            uploads_dir: uploads_dir.into(),
            append: false,
        }
    }

    /// Keep earlier rows of the same database instead of replacing them
    pub fn with_append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    /// Ingest one pair
    ///
    /// A DDL file without tables is not an error: nothing is uploaded or
    /// stored and the report carries a `DDL_NO_TABLES` warning.
    pub async fn ingest(
        &self,
        store: &MetadataStore,
        ddl_path: &Path,
        database_path: &Path,
    ) -> Result<IngestReport, EngineError> {
        let db_id = upload_id(database_path)?;
        let parsed = self.parser.parse_file(ddl_path)?;

        let mut report = IngestReport {
            db_id: db_id.clone(),
            ddl_path: ddl_path.to_path_buf(),
            database_path: self.uploads_dir.join(&db_id),
            records: Vec::new(),
            replaced_rows: 0,
            diagnostics: parsed.diagnostics,
        };

        if parsed.tables.is_empty() {
            warn!(ddl = %ddl_path.display(), "no tables found");
            report.diagnostics.push(
                Diagnostic::new(
                    DiagnosticCode::DdlNoTables,
                    Severity::Warn,
                    format!("No tables found in {}", ddl_path.display()),
                )
                .with_location(Location::new(ddl_path.display().to_string())),
            );
            return Ok(report);
        }

        let enriched = self.enricher.enrich(&db_id, &parsed.tables).await?;
        report.diagnostics.extend(enriched.diagnostics);

        let staged = stage_database_file(database_path, &self.uploads_dir)?;
        if self.append {
            store.insert(&enriched.records)?;
        } else {
            report.replaced_rows = store.replace_database(&db_id, &enriched.records)?;
        }
        report.database_path = staged.commit()?;
        report.records = enriched.records;

        info!(
            db_id = %db_id,
            tables = parsed.tables.len(),
            rows = report.records.len(),
            replaced = report.replaced_rows,
            "ingested database"
        );
        Ok(report)
    }
}
