use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

/// Statement keywords that must never appear as standalone tokens. Substring
/// hits inside identifiers (UPDATED_AT, CREATED_DATE) are fine.
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "DELETE", "DROP", "INSERT", "UPDATE", "ALTER", "CREATE", "TRUNCATE",
];

fn forbidden_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let alternation = FORBIDDEN_KEYWORDS.join("|");
        Regex::new(&format!(r"\b(?:{})\b", alternation)).expect("forbidden keyword pattern")
    })
}

/// Decides whether a candidate statement may be executed. Safety only: a
/// syntactically valid but semantically wrong SELECT passes.
pub fn validate_sql(sql: &str) -> bool {
    let normalized = sql.trim().to_uppercase();

    if !(normalized.starts_with("SELECT") || normalized.starts_with("WITH")) {
        warn!("Non-SELECT/WITH statement rejected");
        return false;
    }

    if let Some(hit) = forbidden_pattern().find(&normalized) {
        warn!("Statement contains forbidden keyword '{}'", hit.as_str());
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_select_passes() {
        assert!(validate_sql("SELECT * FROM RPT_WOPS_TICKETS"));
    }

    #[test]
    fn cte_passes() {
        assert!(validate_sql(
            "WITH weekly AS (SELECT SOLVED_WEEK, COUNT(*) AS N FROM RPT_WOPS_TICKETS GROUP BY 1) \
             SELECT * FROM weekly"
        ));
    }

    #[test]
    fn leading_whitespace_and_case_are_normalized() {
        assert!(validate_sql("   select 1"));
    }

    #[test]
    fn forbidden_keyword_as_identifier_substring_passes() {
        assert!(validate_sql("SELECT UPDATED_AT FROM T"));
        assert!(validate_sql("SELECT CREATED_DATE, DROPPED_CALLS FROM RPT_WOPS_TICKETS"));
        assert!(validate_sql("SELECT LAST_INSERT_TS FROM T WHERE ALTERED_FLAG = 1"));
    }

    #[test]
    fn forbidden_keyword_as_token_is_rejected() {
        assert!(!validate_sql("UPDATE T SET A = 1"));
        assert!(!validate_sql("SELECT * FROM T; DELETE FROM T"));
    }

    #[test]
    fn compound_drop_statement_is_rejected() {
        assert!(!validate_sql("DROP TABLE RPT_WOPS_TICKETS; SELECT 1"));
    }

    #[test]
    fn non_select_prefix_is_rejected_regardless_of_content() {
        assert!(!validate_sql("SHOW TABLES"));
        assert!(!validate_sql("EXPLAIN SELECT 1"));
        assert!(!validate_sql(""));
    }
}
