//! Intent enrichment: parsed tables plus model intents become metadata rows

use crate::error::EngineError;
use nl2sql_core::{ColumnMetadata, Diagnostic, DiagnosticCode, Severity, TableSkeleton};
use nl2sql_model::IntentGenerator;
use nl2sql_store::MetadataStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Rows produced for one database plus anything worth reporting
#[derive(Debug, Clone, Default)]
pub struct EnrichmentReport {
    /// One row per column, tables in input order
    pub records: Vec<ColumnMetadata>,

    /// Tables that were skipped
    pub diagnostics: Vec<Diagnostic>,
}

impl EnrichmentReport {
    /// Distinct table names in record order
    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for record in &self.records {
            if names.last() != Some(&record.table_name.as_str()) {
                names.push(&record.table_name);
            }
        }
        names
    }
}

/// Asks an intent generator about each table and merges the answers
pub struct IntentEnricher {
    generator: Arc<dyn IntentGenerator>,
}

impl IntentEnricher {
    pub fn new(generator: Arc<dyn IntentGenerator>) -> Self {
        Self { generator }
    }

    /// Build metadata rows for `skeletons`
    ///
    /// The generator is called exactly once per non-empty table. Column
    /// intents are looked up by lowercased name and default to empty. The
    /// first generator error aborts the whole batch.
    pub async fn enrich(&self, db_id: &str, skeletons: &[TableSkeleton]) -> Result<EnrichmentReport, EngineError> {
        let mut report = EnrichmentReport::default();

        for skeleton in skeletons {
            if skeleton.is_empty() {
                warn!(db_id, table = skeleton.table_name(), "table has no columns, skipping");
                report.diagnostics.push(Diagnostic::new(
                    DiagnosticCode::EnrichEmptyTable,
                    Severity::Warn,
                    format!("Table '{}' has no columns and was skipped", skeleton.table_name()),
                ));
                continue;
            }

            debug!(db_id, table = skeleton.table_name(), generator = self.generator.name(), "generating intents");
            let intents = self
                .generator
                .generate_intents(skeleton.table_name(), skeleton.column_names(), skeleton.data_types())
                .await?;

            for (column, data_type) in skeleton.columns() {
                let column_intent = intents.column_intent(column).unwrap_or_default();
                report.records.push(
                    ColumnMetadata::new(db_id, skeleton.table_name(), column, data_type)
                        .with_intents(&intents.table_intent, column_intent),
                );
            }
        }

        Ok(report)
    }

    /// Enrich and append every row to `store` in one insert
    ///
    /// Nothing is written when enrichment fails.
    pub async fn enrich_into(
        &self,
        store: &MetadataStore,
        db_id: &str,
        skeletons: &[TableSkeleton],
    ) -> Result<EnrichmentReport, EngineError> {
        let report = self.enrich(db_id, skeletons).await?;
        let written = store.insert(&report.records)?;
        info!(db_id, rows = written, "stored enriched metadata");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl2sql_model::{IntentResponse, MockIntentGenerator, ModelError};

    fn attendance() -> TableSkeleton {
        TableSkeleton::new("employee_attendance")
            .with_column("Employee_ID", "INTEGER")
            .with_column("date", "DATE")
            .with_column("status", "TEXT")
    }

    #[tokio::test]
    async fn rows_follow_column_order() {
        let generator = MockIntentGenerator::builder()
            .with_intents(
                "employee_attendance",
                IntentResponse::new("Logs daily attendance")
                    .with_column("employee_id", "Employee key")
                    .with_column("status", "Present or absent"),
            )
            .build();
        let enricher = IntentEnricher::new(Arc::new(generator.clone()));

        let report = enricher.enrich("hr.db", &[attendance()]).await.unwrap();

        let columns: Vec<_> = report.records.iter().map(|r| r.column_name.as_str()).collect();
        assert_eq!(columns, vec!["Employee_ID", "date", "status"]);
        assert_eq!(report.records[0].column_intent, "Employee key");
        assert_eq!(report.records[1].column_intent, "");
        assert!(report.records.iter().all(|r| r.table_intent == "Logs daily attendance" && r.db_id == "hr.db"));
        assert_eq!(generator.call_count().await, 1);
    }

    #[tokio::test]
    async fn empty_tables_are_skipped_with_warning() {
        let generator = MockIntentGenerator::new();
        let enricher = IntentEnricher::new(Arc::new(generator.clone()));

        let report = enricher
            .enrich("hr.db", &[TableSkeleton::new("placeholder"), attendance()])
            .await
            .unwrap();

        assert_eq!(report.table_names(), vec!["employee_attendance"]);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].code, DiagnosticCode::EnrichEmptyTable);
        assert_eq!(generator.calls().await, vec!["employee_attendance"]);
    }

    #[tokio::test]
    async fn failure_aborts_and_writes_nothing() {
        let generator = MockIntentGenerator::builder()
            .with_failure("inventory", ModelError::Status { status: 500, body: "down".to_string() })
            .build();
        let enricher = IntentEnricher::new(Arc::new(generator.clone()));
        let store = MetadataStore::open_in_memory().unwrap();
        store.initialize().unwrap();

        let skeletons = vec![
            attendance(),
            TableSkeleton::new("inventory").with_column("item_id", "INTEGER"),
            TableSkeleton::new("suppliers").with_column("supplier_id", "INTEGER"),
        ];
        let result = enricher.enrich_into(&store, "shop.db", &skeletons).await;

        assert!(matches!(result, Err(EngineError::Model(ModelError::Status { status: 500, .. }))));
        assert_eq!(store.row_count().unwrap(), 0);
        assert_eq!(generator.calls().await, vec!["employee_attendance", "inventory"]);
    }

    #[tokio::test]
    async fn enrich_into_appends() {
        let enricher = IntentEnricher::new(Arc::new(MockIntentGenerator::new()));
        let store = MetadataStore::open_in_memory().unwrap();
        store.initialize().unwrap();

        enricher.enrich_into(&store, "hr.db", &[attendance()]).await.unwrap();
        enricher.enrich_into(&store, "hr.db", &[attendance()]).await.unwrap();

        assert_eq!(store.row_count().unwrap(), 6);
    }
}
