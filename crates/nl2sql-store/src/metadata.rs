//! Metadata store - per-column metadata and intents in SQLite
//!
//! Rows are appended, never updated. Re-ingesting the same database appends
//! duplicates unless the caller clears it first with [`MetadataStore::delete_database`].
//! Inserts run one statement per row outside a transaction, so a failure
//! part-way leaves the earlier rows in place.

use crate::error::StoreError;
use nl2sql_core::{ColumnInfo, ColumnMetadata};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Name of the metadata table
pub const METADATA_TABLE: &str = "metadata";

const CREATE_METADATA_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS metadata (
        db_id TEXT,
        table_name TEXT,
        column_name TEXT,
        data_type TEXT,
        table_intent TEXT,
        column_intent TEXT
    )
"#;

const CREATE_TABLE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_metadata_db_table ON metadata(db_id, table_name)";

const INSERT_ROW: &str = r#"
    INSERT INTO metadata (db_id, table_name, column_name, data_type, table_intent, column_intent)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
"#;

/// A distinct (database, table, intent) entry of the retrieval corpus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableIntent {
    pub db_id: String,
    pub table_name: String,
    pub table_intent: String,
}

/// Persistent registry of column metadata
pub struct MetadataStore {
    /// Backing file, `None` for in-memory stores
    path: Option<PathBuf>,

    db: Mutex<Connection>,
}

impl MetadataStore {
    /// Open (or create) the store file
    ///
    /// The metadata table is not created here; call [`initialize`](Self::initialize)
    /// from the process that owns the store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Connection::open(&path)?;
        debug!(path = %path.display(), "opened metadata store");

        Ok(Self {
            path: Some(path),
            db: Mutex::new(db),
        })
    }

    /// Open a private in-memory store
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            path: None,
            db: Mutex::new(Connection::open_in_memory()?),
        })
    }

    /// Backing file path
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Create the metadata table if it does not exist yet
    pub fn initialize(&self) -> Result<(), StoreError> {
        let db = self.conn();
        db.execute(CREATE_METADATA_TABLE, [])?;
        db.execute(CREATE_TABLE_INDEX, [])?;
        Ok(())
    }

    /// Whether the metadata table exists
    pub fn is_initialized(&self) -> Result<bool, StoreError> {
        let found: Option<String> = self
            .conn()
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![METADATA_TABLE],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Drop every stored row and recreate the empty table
    pub fn reset(&self) -> Result<(), StoreError> {
        self.conn().execute("DROP TABLE IF EXISTS metadata", [])?;
        info!("metadata store reset");
        self.initialize()
    }

    /// Append records in order
    ///
    /// Returns the number of rows written.
    pub fn insert(&self, records: &[ColumnMetadata]) -> Result<usize, StoreError> {
        let db = self.conn();
        let mut stmt = db.prepare_cached(INSERT_ROW)?;

        for record in records {
            stmt.execute(params![
                record.db_id,
                record.table_name,
                record.column_name,
                record.data_type,
                record.table_intent,
                record.column_intent,
            ])?;
        }

        info!(rows = records.len(), "inserted metadata");
        Ok(records.len())
    }

    /// Swap every row of one database for `records` in a single transaction
    ///
    /// Either all earlier rows are gone and all of `records` are stored, or
    /// nothing changed. Returns the number of rows removed.
    pub fn replace_database(&self, db_id: &str, records: &[ColumnMetadata]) -> Result<usize, StoreError> {
        let mut db = self.conn();
        let tx = db.transaction()?;

        let removed = tx.execute("DELETE FROM metadata WHERE db_id = ?1", params![db_id])?;
        {
            let mut stmt = tx.prepare_cached(INSERT_ROW)?;
            for record in records {
                stmt.execute(params![
                    record.db_id,
                    record.table_name,
                    record.column_name,
                    record.data_type,
                    record.table_intent,
                    record.column_intent,
                ])?;
            }
        }
        tx.commit()?;

        info!(db_id, removed, inserted = records.len(), "replaced database metadata");
        Ok(removed)
    }

    /// Remove every row of one database
    pub fn delete_database(&self, db_id: &str) -> Result<usize, StoreError> {
        let removed = self
            .conn()
            .execute("DELETE FROM metadata WHERE db_id = ?1", params![db_id])?;
        info!(db_id, removed, "deleted database metadata");
        Ok(removed)
    }

    /// Distinct database ids
    pub fn list_databases(&self) -> Result<BTreeSet<String>, StoreError> {
        let db = self.conn();
        let mut stmt = db.prepare("SELECT DISTINCT db_id FROM metadata WHERE db_id IS NOT NULL")?;
        let dbs = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(dbs)
    }

    /// Table names of one database in first-insertion order
    pub fn list_tables(&self, db_id: &str) -> Result<Vec<String>, StoreError> {
        let db = self.conn();
        let mut stmt = db.prepare(
            r#"
            SELECT table_name FROM metadata
            WHERE db_id = ?1
            GROUP BY table_name
            ORDER BY MIN(rowid)
            "#,
        )?;
        let tables = stmt
            .query_map(params![db_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tables)
    }

    /// Stored columns for each requested table
    ///
    /// Every requested table gets an entry; unknown tables map to an empty list.
    pub fn columns_for<S: AsRef<str>>(
        &self,
        db_id: &str,
        table_names: &[S],
    ) -> Result<HashMap<String, Vec<ColumnInfo>>, StoreError> {
        let db = self.conn();
        let mut stmt = db.prepare_cached(
            r#"
            SELECT column_name, data_type, column_intent
            FROM metadata
            WHERE db_id = ?1 AND table_name = ?2
            ORDER BY rowid
            "#,
        )?;

        let mut table_map = HashMap::new();
        for table in table_names {
            let table = table.as_ref();
            let columns = stmt
                .query_map(params![db_id, table], |row| {
                    Ok(ColumnInfo {
                        column_name: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                        data_type: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        column_intent: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            table_map.insert(table.to_string(), columns);
        }

        Ok(table_map)
    }

    /// Most recently stored intent of a table, or empty
    pub fn table_intent(&self, db_id: &str, table_name: &str) -> Result<String, StoreError> {
        let intent: Option<Option<String>> = self
            .conn()
            .query_row(
                r#"
                SELECT table_intent FROM metadata
                WHERE db_id = ?1 AND table_name = ?2
                ORDER BY rowid DESC
                LIMIT 1
                "#,
                params![db_id, table_name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(intent.flatten().unwrap_or_default())
    }

    /// Distinct (db_id, table_name, table_intent) triples in first-insertion order
    ///
    /// Missing intents come back as empty strings.
    pub fn table_intents(&self) -> Result<Vec<TableIntent>, StoreError> {
        let db = self.conn();
        let mut stmt = db.prepare(
            r#"
            SELECT db_id, table_name, COALESCE(table_intent, '') AS intent
            FROM metadata
            GROUP BY db_id, table_name, intent
            ORDER BY MIN(rowid)
            "#,
        )?;
        let triples = stmt
            .query_map([], |row| {
                Ok(TableIntent {
                    db_id: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    table_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    table_intent: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(triples)
    }

    /// Every row of one database in insertion order
    pub fn records(&self, db_id: &str) -> Result<Vec<ColumnMetadata>, StoreError> {
        let db = self.conn();
        let mut stmt = db.prepare(
            r#"
            SELECT db_id, table_name, column_name, data_type, table_intent, column_intent
            FROM metadata
            WHERE db_id = ?1
            ORDER BY rowid
            "#,
        )?;
        let records = stmt
            .query_map(params![db_id], |row| {
                Ok(ColumnMetadata {
                    db_id: row.get(0)?,
                    table_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    column_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    data_type: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    table_intent: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    column_intent: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Total number of stored rows
    pub fn row_count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM metadata", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave the connection half-written
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
