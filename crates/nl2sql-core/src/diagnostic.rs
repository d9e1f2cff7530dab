//! Diagnostics for skipped input
//!
//! Nothing here is fatal: parsing and enrichment keep going and attach a
//! diagnostic instead. Codes are serialized as SCREAMING_SNAKE_CASE strings
//! and must keep their names once released.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    /// Tokenizer rejected the DDL text; no tables were read from it
    DdlTokenizeError,

    /// Statement other than CREATE TABLE, or one without a name or column list
    DdlStatementSkipped,

    /// Constraint or malformed clause inside a column list
    DdlClauseSkipped,

    /// Whole DDL file yielded no tables
    DdlNoTables,

    /// Table with zero columns, never sent for intent generation
    EnrichEmptyTable,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DdlTokenizeError => "DDL_TOKENIZE_ERROR",
            Self::DdlStatementSkipped => "DDL_STATEMENT_SKIPPED",
            Self::DdlClauseSkipped => "DDL_CLAUSE_SKIPPED",
            Self::DdlNoTables => "DDL_NO_TABLES",
            Self::EnrichEmptyTable => "ENRICH_EMPTY_TABLE",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Info for routine skips, Warn when a whole table or file was lost
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Warn => "warn",
        })
    }
}

/// DDL file and, when known, the 1-based line a statement starts on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: Option<usize>,
}

impl Location {
    pub fn new(file: impl Into<String>) -> Self {
        Self { file: file.into(), line: None }
    }

    pub fn with_line(file: impl Into<String>, line: usize) -> Self {
        Self { file: file.into(), line: Some(line) }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file)?;
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    pub location: Option<Location>,

    /// Skipped text, truncated by the producer
    pub fragment: Option<String>,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            location: None,
            fragment: None,
        }
    }

    pub fn info(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Info, message)
    }

    pub fn with_location(self, location: Location) -> Self {
        Self { location: Some(location), ..self }
    }

    pub fn with_fragment(self, fragment: impl Into<String>) -> Self {
        Self { fragment: Some(fragment.into()), ..self }
    }
}
