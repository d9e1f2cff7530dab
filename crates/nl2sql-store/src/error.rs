//! Storage errors

/// Errors raised by the metadata store and database files
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database file not found: {0}")]
    DatabaseNotFound(String),

    #[error("Error executing SQL on {path}:\n{sql}\n{message}")]
    Execution {
        path: String,
        sql: String,
        message: String,
    },
}
