//! DDL parsing
//!
//! This crate handles:
//! - Tokenizing DDL text using datafusion-sqlparser-rs
//! - Splitting it into statements and picking out CREATE TABLE
//! - Extracting ordered (column, type) pairs per table

pub mod parser;

pub use parser::{DdlParser, ParseOutput, extract_schema_metadata};
