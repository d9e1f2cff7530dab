//! Prompt rendering for the SQL-generation model
//!
//! ```text
//! ### Database: {db_id}
//!
//! ### Table Schema: {table_name} - {table_intent}
//! - {column_name} ({data_type}): {column_intent}
//!
//! ### Question: {question}
//! ### SQL:
//! ```

use nl2sql_core::SchemaDescriptor;

/// Line that ends an inference prompt
pub const SQL_MARKER: &str = "### SQL:";

/// Render the prompt for `question`
///
/// Output depends only on the arguments. Column intents are looked up
/// case-insensitively and default to empty. `### SQL:` is the last line
/// when `include_sql_marker` is set.
pub fn build_prompt(
    question: &str,
    db_id: &str,
    schema: &[SchemaDescriptor],
    include_sql_marker: bool,
) -> String {
    let mut lines = Vec::new();
    lines.push(format!("### Database: {}", db_id));
    lines.push(String::new());

    for table in schema {
        lines.push(format!("### Table Schema: {} - {}", table.table_name, table.table_intent));
        for column in &table.columns {
            let intent = table.column_intent(&column.name).unwrap_or_default();
            lines.push(format!("- {} ({}): {}", column.name, column.data_type, intent));
        }
        lines.push(String::new());
    }

    lines.push(format!("### Question: {}", question));
    if include_sql_marker {
        lines.push(SQL_MARKER.to_string());
    }

    lines.join("\n")
}

/// Render a completion-labelled example: the prompt without the marker,
/// then the known SQL answer on its own line
pub fn build_training_example(question: &str, db_id: &str, schema: &[SchemaDescriptor], sql: &str) -> String {
    format!("{}\n{}", build_prompt(question, db_id, schema, false), sql.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn attendance() -> SchemaDescriptor {
        SchemaDescriptor::new("employee_attendance", "Logs the daily attendance status of company employees.")
            .with_column("Employee_ID", "INTEGER", "Unique identifier for the employee.")
            .with_column("date", "DATE", "The calendar date of the attendance record.")
            .with_column("status", "TEXT", "Attendance status for the day.")
    }

    #[test]
    fn exact_layout() {
        let prompt = build_prompt("How many employees were present?", "hr.db", &[attendance()], true);

        assert_eq!(
            prompt,
            "### Database: hr.db\n\
             \n\
             ### Table Schema: employee_attendance - Logs the daily attendance status of company employees.\n\
             - Employee_ID (INTEGER): Unique identifier for the employee.\n\
             - date (DATE): The calendar date of the attendance record.\n\
             - status (TEXT): Attendance status for the day.\n\
             \n\
             ### Question: How many employees were present?\n\
             ### SQL:"
        );
    }

    #[test]
    fn marker_is_optional() {
        let prompt = build_prompt("q", "hr.db", &[attendance()], false);
        assert!(prompt.ends_with("### Question: q"));
        assert!(!prompt.contains(SQL_MARKER));
    }

    #[test]
    fn empty_schema() {
        assert_eq!(
            build_prompt("q", "hr.db", &[], true),
            "### Database: hr.db\n\n### Question: q\n### SQL:"
        );
    }

    #[test]
    fn missing_column_intent_is_blank() {
        let mut table = SchemaDescriptor::new("inventory", "Stock levels");
        table.columns.push(nl2sql_core::ColumnSpec::new("Quantity", "INTEGER"));

        let prompt = build_prompt("q", "shop.db", &[table], true);
        assert!(prompt.contains("\n- Quantity (INTEGER): \n"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let schema = vec![attendance(), SchemaDescriptor::new("employees", "Company staff")];
        assert_eq!(
            build_prompt("q", "hr.db", &schema, true),
            build_prompt("q", "hr.db", &schema, true)
        );
    }

    #[test]
    fn training_example_appends_sql() {
        let example = build_training_example(
            "How many records?",
            "hr.db",
            &[],
            "  SELECT COUNT(*) FROM employee_attendance \n",
        );
        assert_eq!(
            example,
            "### Database: hr.db\n\n### Question: How many records?\nSELECT COUNT(*) FROM employee_attendance"
        );
    }
}
