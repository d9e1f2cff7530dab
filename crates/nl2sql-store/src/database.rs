//! Uploaded database files that generated SQL runs against

use crate::error::StoreError;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Column names and rows returned by a query
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl QueryRows {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// A SQLite database file opened by path
pub struct DatabaseFile {
    path: PathBuf,
    conn: Connection,
}

impl DatabaseFile {
    /// Open an existing database file
    ///
    /// Unlike `Connection::open`, a missing file is an error instead of
    /// silently creating an empty database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(StoreError::DatabaseNotFound(path.display().to_string()));
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        Ok(Self { path, conn })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run one SQL statement and collect every row
    pub fn query(&self, sql: &str) -> Result<QueryRows, StoreError> {
        debug!(path = %self.path.display(), sql, "executing SQL");
        self.run(sql).map_err(|e| StoreError::Execution {
            path: self.path.display().to_string(),
            sql: sql.to_string(),
            message: e.to_string(),
        })
    }

    fn run(&self, sql: &str) -> Result<QueryRows, rusqlite::Error> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut rows = Vec::new();
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            let mut values = Vec::with_capacity(width);
            for idx in 0..width {
                values.push(to_json(row.get_ref(idx)?));
            }
            rows.push(values);
        }

        Ok(QueryRows { columns, rows })
    }
}

/// Database id of an upload: its file name
///
/// Fails when `source` is not an existing file.
pub fn upload_id(source: &Path) -> Result<String, StoreError> {
    let db_id = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| StoreError::DatabaseNotFound(source.display().to_string()))?;

    if !source.is_file() {
        return Err(StoreError::DatabaseNotFound(source.display().to_string()));
    }
    Ok(db_id)
}

/// A copy of an upload sitting next to its final location
///
/// The previous upload with the same id stays in place until
/// [`commit`](Self::commit). Dropping without committing removes the copy.
#[derive(Debug)]
pub struct StagedUpload {
    db_id: String,
    staged: NamedTempFile,
    target: PathBuf,
}

impl StagedUpload {
    pub fn db_id(&self) -> &str {
        &self.db_id
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the copy over `uploads_dir/<db_id>`
    pub fn commit(self) -> Result<PathBuf, StoreError> {
        let Self { db_id, staged, target } = self;
        staged.persist(&target).map_err(|e| StoreError::Io(e.error))?;

        info!(db_id = %db_id, target = %target.display(), "imported database file");
        Ok(target)
    }
}

/// Copy a database file into a temporary file inside the uploads directory
pub fn stage_database_file(source: &Path, uploads_dir: &Path) -> Result<StagedUpload, StoreError> {
    let db_id = upload_id(source)?;
    std::fs::create_dir_all(uploads_dir)?;

    let mut staged = tempfile::Builder::new().prefix(".upload-").tempfile_in(uploads_dir)?;
    let mut reader = File::open(source)?;
    io::copy(&mut reader, staged.as_file_mut())?;
    staged.as_file().sync_all()?;

    debug!(db_id = %db_id, staged = %staged.path().display(), "staged database file");
    Ok(StagedUpload {
        target: uploads_dir.join(&db_id),
        db_id,
        staged,
    })
}

/// Copy a database file into the uploads directory
///
/// Returns the database id (the file name) and the copied path. An existing
/// upload with the same name is replaced.
pub fn import_database_file(source: &Path, uploads_dir: &Path) -> Result<(String, PathBuf), StoreError> {
    let staged = stage_database_file(source, uploads_dir)?;
    let db_id = staged.db_id().to_string();
    let target = staged.commit()?;
    Ok((db_id, target))
}

fn to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(bytes) => serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => serde_json::Value::String(format!("<blob {} bytes>", bytes.len())),
    }
}
