//! Per-question schema context built from ranked tables

use crate::error::EngineError;
use nl2sql_core::SchemaDescriptor;
use nl2sql_store::MetadataStore;
use serde::Serialize;
use tracing::debug;

/// The database a question is answered against and its relevant tables
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemanticContext {
    pub db_id: String,
    pub tables: Vec<SchemaDescriptor>,
}

impl SemanticContext {
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.table_name.as_str()).collect()
    }
}

/// Describe the ranked tables of the top-ranked database
///
/// `ranked` is `(db_id, table_name)` in rank order. The database of the first
/// entry is chosen; ranked tables of other databases are dropped. Returns
/// `None` for an empty ranking.
pub fn build_semantic_context(
    store: &MetadataStore,
    ranked: &[(String, String)],
) -> Result<Option<SemanticContext>, EngineError> {
    let Some((db_id, _)) = ranked.first() else {
        return Ok(None);
    };

    let table_names: Vec<&str> = ranked
        .iter()
        .filter(|(db, _)| db == db_id)
        .map(|(_, table)| table.as_str())
        .collect();
    if table_names.len() < ranked.len() {
        debug!(db_id = %db_id, dropped = ranked.len() - table_names.len(), "dropped tables from other databases");
    }

    let mut columns = store.columns_for(db_id, &table_names)?;
    let mut tables = Vec::with_capacity(table_names.len());
    for table in table_names {
        let table_intent = store.table_intent(db_id, table)?;
        let table_columns = columns.remove(table).unwrap_or_default();
        tables.push(SchemaDescriptor::from_columns(table, table_intent, &table_columns));
    }

    Ok(Some(SemanticContext {
        db_id: db_id.clone(),
        tables,
    }))
}
