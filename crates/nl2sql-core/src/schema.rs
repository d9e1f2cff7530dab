//! Schema metadata types shared by the parser, store, and engine

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One persisted metadata row per (database, table, column)
///
/// Intents default to the empty string when the model produced nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnMetadata {
    /// Database identifier (the uploaded file name)
    pub db_id: String,

    /// Table name as declared in the DDL
    pub table_name: String,

    /// Column name as declared in the DDL
    pub column_name: String,

    /// Declared data type token
    pub data_type: String,

    /// Natural-language purpose of the table
    #[serde(default)]
    pub table_intent: String,

    /// Natural-language purpose of the column
    #[serde(default)]
    pub column_intent: String,
}

impl ColumnMetadata {
    /// Create a record with empty intents
    pub fn new(
        db_id: impl Into<String>,
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        Self {
            db_id: db_id.into(),
            table_name: table_name.into(),
            column_name: column_name.into(),
            data_type: data_type.into(),
            table_intent: String::new(),
            column_intent: String::new(),
        }
    }

    /// Set both intents
    pub fn with_intents(mut self, table_intent: impl Into<String>, column_intent: impl Into<String>) -> Self {
        self.table_intent = table_intent.into();
        self.column_intent = column_intent.into();
        self
    }
}

/// A table as read from a CREATE TABLE statement, before enrichment
///
/// Column names and data types are kept in two parallel vectors that
/// always have the same length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSkeleton {
    table_name: String,
    column_names: Vec<String>,
    data_types: Vec<String>,
}

impl TableSkeleton {
    /// Create a skeleton with no columns
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            column_names: Vec::new(),
            data_types: Vec::new(),
        }
    }

    /// Build a skeleton from parallel name/type vectors
    ///
    /// Returns `None` when the vectors differ in length.
    pub fn from_parts(
        table_name: impl Into<String>,
        column_names: Vec<String>,
        data_types: Vec<String>,
    ) -> Option<Self> {
        if column_names.len() != data_types.len() {
            return None;
        }

        Some(Self {
            table_name: table_name.into(),
            column_names,
            data_types,
        })
    }

    /// Append a column in declaration order
    pub fn push_column(&mut self, name: impl Into<String>, data_type: impl Into<String>) {
        self.column_names.push(name.into());
        self.data_types.push(data_type.into());
    }

    /// Builder form of `push_column`
    pub fn with_column(mut self, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        self.push_column(name, data_type);
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn data_types(&self) -> &[String] {
        &self.data_types
    }

    /// Iterate (name, type) pairs in declaration order
    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.column_names
            .iter()
            .zip(self.data_types.iter())
            .map(|(name, ty)| (name.as_str(), ty.as_str()))
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.column_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.column_names.is_empty()
    }
}

/// A stored column as returned by a metadata lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub column_name: String,
    pub data_type: String,
    pub column_intent: String,
}

impl ColumnInfo {
    pub fn new(
        column_name: impl Into<String>,
        data_type: impl Into<String>,
        column_intent: impl Into<String>,
    ) -> Self {
        Self {
            column_name: column_name.into(),
            data_type: data_type.into(),
            column_intent: column_intent.into(),
        }
    }
}

/// Column name and declared type, rendered as `name (type)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: String,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }

    /// The `name (type)` label
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.data_type)
    }
}

impl std::fmt::Display for ColumnSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.data_type)
    }
}

/// Per-query view of one table handed to the prompt assembler
///
/// Column intent keys are stored lowercased so lookups ignore the
/// casing used in the original DDL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaDescriptor {
    /// Table name
    pub table_name: String,

    /// Table intent (empty when unknown)
    pub table_intent: String,

    /// Columns in stored order
    pub columns: Vec<ColumnSpec>,

    column_intents: BTreeMap<String, String>,
}

impl SchemaDescriptor {
    /// Create a descriptor with no columns
    pub fn new(table_name: impl Into<String>, table_intent: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            table_intent: table_intent.into(),
            columns: Vec::new(),
            column_intents: BTreeMap::new(),
        }
    }

    /// Build a descriptor from stored column rows
    pub fn from_columns(
        table_name: impl Into<String>,
        table_intent: impl Into<String>,
        columns: &[ColumnInfo],
    ) -> Self {
        columns.iter().fold(Self::new(table_name, table_intent), |descriptor, col| {
            descriptor.with_column(&col.column_name, &col.data_type, &col.column_intent)
        })
    }

    /// Add a column and its intent
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        data_type: impl Into<String>,
        intent: impl Into<String>,
    ) -> Self {
        let name = name.into();
        self.column_intents.insert(name.to_lowercase(), intent.into());
        self.columns.push(ColumnSpec::new(name, data_type));
        self
    }

    /// Case-insensitive column intent lookup
    pub fn column_intent(&self, column_name: &str) -> Option<&str> {
        self.column_intents
            .get(&column_name.to_lowercase())
            .map(String::as_str)
    }

    /// Lowercased column name to intent
    pub fn column_intents(&self) -> &BTreeMap<String, String> {
        &self.column_intents
    }

    /// The `name (type)` labels in column order
    pub fn column_labels(&self) -> Vec<String> {
        self.columns.iter().map(ColumnSpec::label).collect()
    }
}
