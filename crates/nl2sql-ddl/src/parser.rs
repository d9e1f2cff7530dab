//! CREATE TABLE extraction using the datafusion-sqlparser-rs tokenizer
//!
//! DDL files uploaded alongside a database are often dialect-specific or
//! only partly valid, so instead of parsing them into a full AST this module
//! walks the token stream: it splits statements on top-level semicolons,
//! keeps `CREATE ... TABLE name (...)` statements and reads the first two
//! tokens of every column clause as the column name and its type.
//!
//! Nothing in here fails. Statements and clauses that do not fit are
//! skipped and reported as informational diagnostics.

use nl2sql_core::{Diagnostic, DiagnosticCode, DialectConfig, Location, Severity, TableSkeleton};
use sqlparser::dialect::{Dialect, GenericDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::tokenizer::{Token, Tokenizer};
use std::path::Path;

/// Keywords allowed between CREATE and TABLE
const TABLE_MODIFIERS: &[&str] = &[
    "OR", "REPLACE", "TEMP", "TEMPORARY", "GLOBAL", "LOCAL", "UNLOGGED", "VIRTUAL", "TRANSIENT",
    "EXTERNAL",
];

/// Longest fragment attached to a diagnostic
const MAX_FRAGMENT_LEN: usize = 80;

/// Extract table skeletons from DDL text with the generic dialect
///
/// Non-CREATE statements are ignored and malformed fragments are skipped;
/// the result is empty when nothing qualifies.
pub fn extract_schema_metadata(ddl: &str) -> Vec<TableSkeleton> {
    DdlParser::new().parse(ddl)
}

/// DDL parser with configurable tokenizer dialect
pub struct DdlParser {
    dialect: Box<dyn Dialect>,
}

impl DdlParser {
    /// Create a new DDL parser with the default (generic) dialect
    pub fn new() -> Self {
        Self {
            dialect: Box::new(GenericDialect {}),
        }
    }

    /// Create a DDL parser for SQLite
    pub fn sqlite() -> Self {
        Self {
            dialect: Box::new(SQLiteDialect {}),
        }
    }

    /// Create a DDL parser for PostgreSQL
    pub fn postgres() -> Self {
        Self {
            dialect: Box::new(PostgreSqlDialect {}),
        }
    }

    /// Create a DDL parser for MySQL
    pub fn mysql() -> Self {
        Self {
            dialect: Box::new(MySqlDialect {}),
        }
    }

    /// Create a parser from a dialect config
    pub fn from_dialect(dialect: &DialectConfig) -> Self {
        match dialect {
            DialectConfig::Generic => Self::new(),
            DialectConfig::Sqlite => Self::sqlite(),
            DialectConfig::Postgres => Self::postgres(),
            DialectConfig::Mysql => Self::mysql(),
        }
    }

    /// Extract one skeleton per usable CREATE TABLE statement
    pub fn parse(&self, ddl: &str) -> Vec<TableSkeleton> {
        self.parse_with_diagnostics(ddl, None).tables
    }

    /// Read and parse a DDL file
    pub fn parse_file(&self, path: &Path) -> std::io::Result<ParseOutput> {
        let ddl = std::fs::read_to_string(path)?;
        Ok(self.parse_with_diagnostics(&ddl, Some(path)))
    }

    /// Extract skeletons and report everything that was skipped
    pub fn parse_with_diagnostics(&self, ddl: &str, file_path: Option<&Path>) -> ParseOutput {
        let file = file_path.map(|p| p.display().to_string());
        let mut output = ParseOutput::default();

        let tokens = match Tokenizer::new(&*self.dialect, ddl).tokenize() {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(error = %e, "DDL could not be tokenized");
                let mut diag = Diagnostic::new(
                    DiagnosticCode::DdlTokenizeError,
                    Severity::Warn,
                    format!("Failed to tokenize DDL: {}", e),
                );
                if let Some(file) = &file {
                    diag = diag.with_location(Location::new(file.clone()));
                }
                output.diagnostics.push(diag);
                return output;
            }
        };

        let lines = token_lines(&tokens);

        for span in split_statements(&tokens) {
            let walker = StatementWalker {
                tokens: &tokens[span.clone()],
                lines: &lines[span],
                file: file.as_deref(),
            };

            if let Some(table) = walker.extract(&mut output.diagnostics) {
                output.tables.push(table);
            }
        }

        tracing::debug!(
            tables = output.tables.len(),
            skipped = output.diagnostics.len(),
            "parsed DDL"
        );

        output
    }
}

impl Default for DdlParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Tables found in a DDL text plus the diagnostics for skipped fragments
#[derive(Debug, Clone, Default)]
pub struct ParseOutput {
    /// Skeletons in statement order
    pub tables: Vec<TableSkeleton>,

    /// Skipped statements and clauses
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseOutput {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Names of the extracted tables
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.table_name()).collect()
    }
}

/// One statement's tokens with their starting line numbers
struct StatementWalker<'a> {
    tokens: &'a [Token],
    lines: &'a [usize],
    file: Option<&'a str>,
}

impl<'a> StatementWalker<'a> {
    fn extract(&self, diagnostics: &mut Vec<Diagnostic>) -> Option<TableSkeleton> {
        // Blank statement between two semicolons
        let first = self.next_significant(0)?;

        if !is_word(&self.tokens[first], "CREATE") {
            self.skip_statement(diagnostics, first, "Not a CREATE statement");
            return None;
        }

        let mut pos = first + 1;
        loop {
            let Some(idx) = self.next_significant(pos) else {
                self.skip_statement(diagnostics, first, "CREATE statement ends before TABLE");
                return None;
            };

            match word_upper(&self.tokens[idx]) {
                Some(word) if word == "TABLE" => {
                    pos = idx + 1;
                    break;
                }
                Some(word) if TABLE_MODIFIERS.contains(&word.as_str()) => pos = idx + 1,
                _ => {
                    self.skip_statement(diagnostics, first, "CREATE statement is not a table definition");
                    return None;
                }
            }
        }

        // IF NOT EXISTS
        if let Some(idx) = self.next_significant(pos) {
            if is_word(&self.tokens[idx], "IF") {
                pos = idx + 1;
                for keyword in ["NOT", "EXISTS"] {
                    match self.next_significant(pos) {
                        Some(next) if is_word(&self.tokens[next], keyword) => pos = next + 1,
                        _ => break,
                    }
                }
            }
        }

        let Some((table_name, after_name)) = self.qualified_name(pos) else {
            self.skip_statement(diagnostics, first, "CREATE TABLE without a table name");
            return None;
        };

        let open = match self.next_significant(after_name) {
            Some(idx) if self.tokens[idx] == Token::LParen => idx,
            _ => {
                self.skip_statement(diagnostics, first, &format!("Table '{}' has no column list", table_name));
                return None;
            }
        };

        let Some(close) = matching_paren(self.tokens, open) else {
            self.skip_statement(diagnostics, first, &format!("Column list of '{}' is not closed", table_name));
            return None;
        };

        let mut skeleton = TableSkeleton::new(table_name.clone());

        for (start, end) in split_top_level(self.tokens, open + 1, close) {
            let clause = ClauseWalker { tokens: &self.tokens[start..end] };

            match clause.column() {
                ClauseKind::Empty => {}
                ClauseKind::Column { name, data_type } => skeleton.push_column(name, data_type),
                ClauseKind::Constraint => {
                    self.skip_clause(diagnostics, start, end, &format!("Constraint clause in '{}'", table_name));
                }
                ClauseKind::Malformed => {
                    self.skip_clause(diagnostics, start, end, &format!("Column clause in '{}' has no data type", table_name));
                }
            }
        }

        if skeleton.is_empty() {
            self.skip_statement(diagnostics, first, &format!("Table '{}' has no columns", table_name));
            return None;
        }

        Some(skeleton)
    }

    /// Read `name` or `schema.name`, keeping the last part
    fn qualified_name(&self, pos: usize) -> Option<(String, usize)> {
        let idx = self.next_significant(pos)?;
        let Token::Word(word) = &self.tokens[idx] else {
            return None;
        };

        let mut name = word.value.clone();
        let mut end = idx + 1;

        while let Some(dot) = self.next_significant(end) {
            if self.tokens[dot] != Token::Period {
                break;
            }
            match self.next_significant(dot + 1).map(|i| (i, &self.tokens[i])) {
                Some((i, Token::Word(part))) => {
                    name = part.value.clone();
                    end = i + 1;
                }
                _ => break,
            }
        }

        Some((name, end))
    }

    fn next_significant(&self, from: usize) -> Option<usize> {
        next_significant(self.tokens, from)
    }

    fn skip_statement(&self, diagnostics: &mut Vec<Diagnostic>, first: usize, message: &str) {
        tracing::debug!(line = self.lines[first], "{}", message);
        diagnostics.push(self.diagnostic(
            DiagnosticCode::DdlStatementSkipped,
            message,
            first,
            render(self.tokens),
        ));
    }

    fn skip_clause(&self, diagnostics: &mut Vec<Diagnostic>, start: usize, end: usize, message: &str) {
        let line_idx = next_significant(self.tokens, start).filter(|i| *i < end).unwrap_or(start);
        tracing::debug!(line = self.lines[line_idx], "{}", message);
        diagnostics.push(self.diagnostic(
            DiagnosticCode::DdlClauseSkipped,
            message,
            line_idx,
            render(&self.tokens[start..end]),
        ));
    }

    fn diagnostic(&self, code: DiagnosticCode, message: &str, at: usize, fragment: String) -> Diagnostic {
        let mut diag = Diagnostic::info(code, message).with_fragment(truncate(&fragment));
        if let Some(file) = self.file {
            diag = diag.with_location(Location::with_line(file, self.lines[at]));
        }
        diag
    }
}

enum ClauseKind {
    Empty,
    Column { name: String, data_type: String },
    Constraint,
    Malformed,
}

/// A single comma-separated entry of a column list
struct ClauseWalker<'a> {
    tokens: &'a [Token],
}

impl<'a> ClauseWalker<'a> {
    fn column(&self) -> ClauseKind {
        let Some(first) = next_significant(self.tokens, 0) else {
            return ClauseKind::Empty;
        };

        if self.is_table_constraint(first) {
            return ClauseKind::Constraint;
        }

        let name = match &self.tokens[first] {
            Token::Word(word) => word.value.clone(),
            other => other.to_string(),
        };

        let Some(type_idx) = next_significant(self.tokens, first + 1) else {
            return ClauseKind::Malformed;
        };

        let mut data_type = self.tokens[type_idx].to_string();

        // Keep an argument list such as VARCHAR(255) or DECIMAL(10, 2)
        if let Some(open) = next_significant(self.tokens, type_idx + 1) {
            if self.tokens[open] == Token::LParen {
                if let Some(close) = matching_paren(self.tokens, open) {
                    data_type.push_str(&render_raw(&self.tokens[open..=close]));
                }
            }
        }

        ClauseKind::Column { name, data_type }
    }

    fn is_table_constraint(&self, first: usize) -> bool {
        let second = next_significant(self.tokens, first + 1).map(|i| &self.tokens[i]);

        match word_upper(&self.tokens[first]).as_deref() {
            Some("FOREIGN") | Some("PRIMARY") => second.map_or(false, |t| is_word(t, "KEY")),
            Some("UNIQUE") => second.map_or(false, |t| {
                *t == Token::LParen || is_word(t, "KEY") || is_word(t, "INDEX")
            }),
            Some("CHECK") => second.map_or(false, |t| *t == Token::LParen),
            Some("CONSTRAINT") => {
                let third = next_significant(self.tokens, first + 1)
                    .and_then(|i| next_significant(self.tokens, i + 1))
                    .map(|i| &self.tokens[i]);
                third
                    .and_then(word_upper)
                    .map_or(false, |w| matches!(w.as_str(), "PRIMARY" | "FOREIGN" | "UNIQUE" | "CHECK"))
            }
            _ => false,
        }
    }
}

/// Ranges of the tokens between top-level semicolons
fn split_statements(tokens: &[Token]) -> Vec<std::ops::Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;

    for (idx, token) in tokens.iter().enumerate() {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::SemiColon if depth == 0 => {
                spans.push(start..idx);
                start = idx + 1;
            }
            _ => {}
        }
    }

    if start < tokens.len() {
        spans.push(start..tokens.len());
    }

    spans
}

/// Split `tokens[start..end]` on commas outside nested parentheses
fn split_top_level(tokens: &[Token], start: usize, end: usize) -> Vec<(usize, usize)> {
    let mut parts = Vec::new();
    let mut part_start = start;
    let mut depth = 0usize;

    for idx in start..end {
        match &tokens[idx] {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::Comma if depth == 0 => {
                parts.push((part_start, idx));
                part_start = idx + 1;
            }
            _ => {}
        }
    }

    parts.push((part_start, end));
    parts
}

/// Index of the RParen closing the LParen at `open`
fn matching_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;

    for (idx, token) in tokens.iter().enumerate().skip(open) {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }

    None
}

fn next_significant(tokens: &[Token], from: usize) -> Option<usize> {
    tokens
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, t)| !matches!(t, Token::Whitespace(_) | Token::EOF))
        .map(|(idx, _)| idx)
}

/// Starting line (1-indexed) of every token
fn token_lines(tokens: &[Token]) -> Vec<usize> {
    let mut line = 1;
    tokens
        .iter()
        .map(|token| {
            let start = line;
            line += token.to_string().matches('\n').count();
            start
        })
        .collect()
}

fn word_upper(token: &Token) -> Option<String> {
    match token {
        Token::Word(word) if word.quote_style.is_none() => Some(word.value.to_uppercase()),
        _ => None,
    }
}

fn is_word(token: &Token, keyword: &str) -> bool {
    word_upper(token).map_or(false, |w| w == keyword)
}

fn render_raw(tokens: &[Token]) -> String {
    tokens.iter().map(|t| t.to_string()).collect()
}

fn render(tokens: &[Token]) -> String {
    render_raw(tokens).split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_FRAGMENT_LEN {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(MAX_FRAGMENT_LEN).collect();
        cut.push_str("...");
        cut
    }
}
