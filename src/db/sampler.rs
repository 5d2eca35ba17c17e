use crate::db::gateway::TableMetadata;
use tracing::info;

/// Audit/timestamp column name fragments, in priority order. The first column
/// whose name contains one of these wins.
const AUDIT_COLUMN_PATTERNS: &[&str] = &[
    "CREATED_AT",
    "UPDATED_AT",
    "CREATED_DATE",
    "UPDATED_DATE",
    "TIMESTAMP",
    "DATE_CREATED",
    "DATE_UPDATED",
    "AUDIT_DATE",
    "CREATED_TIME",
    "UPDATED_TIME",
    "LAST_MODIFIED",
    "RECORD_DATE",
    "ETL_TIMESTAMP",
    "LOAD_DATE",
    "SOLVED_WEEK",
    "ADHERENCE_DATE",
];

/// Declared-type fragments that mark a column as temporal, used as a fallback
/// when no name pattern matches.
const TEMPORAL_TYPE_HINTS: &[&str] = &["DATE", "TIMESTAMP", "TIME"];

/// Picks the column a "latest rows" sample should be ordered by, or `None`
/// when the table has nothing recency-shaped.
pub fn pick_order_column(schema: &TableMetadata) -> Option<&str> {
    for pattern in AUDIT_COLUMN_PATTERNS {
        for column in &schema.columns {
            if column.name.to_uppercase().contains(pattern) {
                return Some(&column.name);
            }
        }
    }

    for column in &schema.columns {
        let declared = column.data_type.to_uppercase();
        if TEMPORAL_TYPE_HINTS.iter().any(|hint| declared.contains(hint)) {
            return Some(&column.name);
        }
    }

    None
}

/// Renders the sample statement, descending on the order column when present.
pub fn build_sample_query(table: &str, limit: usize, order_column: Option<&str>) -> String {
    match order_column {
        Some(column) => {
            info!("Ordering {} by {} DESC for latest data", table, column);
            format!(
                "SELECT * FROM \"{}\" ORDER BY \"{}\" DESC LIMIT {}",
                table, column, limit
            )
        }
        None => {
            info!("No audit column found for {}, using plain sample", table);
            format!("SELECT * FROM \"{}\" LIMIT {}", table, limit)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::gateway::ColumnMeta;

    fn schema_of(columns: &[(&str, &str)]) -> TableMetadata {
        TableMetadata {
            table: "T".to_string(),
            columns: columns
                .iter()
                .map(|(name, data_type)| ColumnMeta {
                    name: name.to_string(),
                    data_type: data_type.to_string(),
                    nullable: true,
                    default: None,
                })
                .collect(),
        }
    }

    #[test]
    fn solved_week_beats_other_columns() {
        let schema = schema_of(&[("AHT_MINUTES", "DOUBLE"), ("SOLVED_WEEK", "VARCHAR")]);
        assert_eq!(pick_order_column(&schema), Some("SOLVED_WEEK"));
    }

    #[test]
    fn earlier_pattern_wins_over_later_one() {
        let schema = schema_of(&[("SOLVED_WEEK", "VARCHAR"), ("CREATED_AT", "TIMESTAMP")]);
        assert_eq!(pick_order_column(&schema), Some("CREATED_AT"));
    }

    #[test]
    fn name_match_is_case_insensitive() {
        let schema = schema_of(&[("ticket_id", "BIGINT"), ("adherence_date", "DATE")]);
        assert_eq!(pick_order_column(&schema), Some("adherence_date"));
    }

    #[test]
    fn declared_type_fallback() {
        let schema = schema_of(&[("AGENT_NAME", "VARCHAR"), ("SHIFT_START", "TIMESTAMP")]);
        assert_eq!(pick_order_column(&schema), Some("SHIFT_START"));
    }

    #[test]
    fn no_candidate_returns_none() {
        let schema = schema_of(&[("AGENT_NAME", "VARCHAR"), ("NUM_TICKETS", "BIGINT")]);
        assert_eq!(pick_order_column(&schema), None);
    }

    #[test]
    fn ordered_query_shape() {
        assert_eq!(
            build_sample_query("RPT_WOPS_TICKETS", 10, Some("SOLVED_WEEK")),
            "SELECT * FROM \"RPT_WOPS_TICKETS\" ORDER BY \"SOLVED_WEEK\" DESC LIMIT 10"
        );
    }

    #[test]
    fn unordered_query_shape() {
        assert_eq!(
            build_sample_query("RPT_WOPS_TICKETS", 10, None),
            "SELECT * FROM \"RPT_WOPS_TICKETS\" LIMIT 10"
        );
    }
}
