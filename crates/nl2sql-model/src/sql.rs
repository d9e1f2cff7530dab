//! Cleanup of generated SQL text

/// Trim the model output and remove one surrounding Markdown code fence
pub fn clean_sql_response(raw: &str) -> String {
    let trimmed = raw.trim();
    let inner = if let Some(s) = trimmed.strip_prefix("```sql") {
        s
    } else if let Some(s) = trimmed.strip_prefix("```") {
        s
    } else {
        trimmed
    };
    inner.strip_suffix("```").unwrap_or(inner).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_sql_is_trimmed() {
        assert_eq!(clean_sql_response("  SELECT 1;\n"), "SELECT 1;");
    }

    #[test]
    fn fenced_sql_is_unwrapped() {
        assert_eq!(
            clean_sql_response("```sql\nSELECT COUNT(*) FROM employee_attendance\n```"),
            "SELECT COUNT(*) FROM employee_attendance"
        );
        assert_eq!(clean_sql_response("```\nSELECT 1\n```"), "SELECT 1");
    }

    #[test]
    fn only_one_fence_is_removed() {
        assert_eq!(clean_sql_response("``````"), "");
        assert_eq!(clean_sql_response("SELECT '```'"), "SELECT '```'");
    }
}
