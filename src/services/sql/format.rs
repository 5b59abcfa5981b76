//! SQL formatting for the editor's format action.

use sqlformat::{FormatOptions, QueryParams, format};

pub fn format_sql(sql: &str) -> String {
    format(sql, &QueryParams::None, &FormatOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_preserves_content() {
        let formatted = format_sql("select id,email from users where id=1");
        let lowered = formatted.to_lowercase();
        assert!(lowered.contains("select"));
        assert!(lowered.contains("users"));
        assert!(lowered.contains("email"));
    }

    #[test]
    fn test_format_is_stable() {
        let once = format_sql("SELECT a, b FROM t");
        let twice = format_sql(&once);
        assert_eq!(once, twice);
    }
}
