use crate::db::gateway::{Cell, ResultSet};
use serde::Serialize;
use std::collections::BTreeMap;

/// Scrubs a raw result so it can be serialized as strict JSON: non-finite
/// floats and textual not-a-number sentinels become nulls. Row order and
/// shape are untouched.
pub fn clean(raw: ResultSet) -> ResultSet {
    let rows = raw
        .rows
        .into_iter()
        .map(|row| row.into_iter().map(clean_cell).collect())
        .collect();

    ResultSet::new(raw.columns, rows)
}

fn clean_cell(cell: Cell) -> Cell {
    match cell {
        Cell::Float(v) if !v.is_finite() => Cell::Null,
        Cell::Text(s) if s.trim().eq_ignore_ascii_case("nan") => Cell::Null,
        other => other,
    }
}

#[derive(Debug, Serialize)]
pub struct NumericStats {
    pub count: usize,
    pub mean: f64,
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
}

/// Compact description of a result set, embedded into the insight prompt.
#[derive(Debug, Serialize)]
pub struct DataSummary {
    pub row_count: usize,
    pub columns: Vec<String>,
    pub sample_data: Vec<serde_json::Map<String, serde_json::Value>>,
    pub null_counts: BTreeMap<String, usize>,
    pub numeric_statistics: BTreeMap<String, NumericStats>,
}

pub fn summarize(result: &ResultSet) -> DataSummary {
    let sample_data = result.records().into_iter().take(5).collect();

    let mut null_counts = BTreeMap::new();
    let mut numeric_statistics = BTreeMap::new();

    for (index, column) in result.columns.iter().enumerate() {
        let nulls = result
            .rows
            .iter()
            .filter(|row| row.get(index).map(Cell::is_null).unwrap_or(true))
            .count();
        null_counts.insert(column.clone(), nulls);

        if result.is_numeric_column(index) {
            let values: Vec<f64> = result
                .rows
                .iter()
                .filter_map(|row| row.get(index).and_then(Cell::as_f64))
                .collect();
            if let Some(stats) = describe(&values) {
                numeric_statistics.insert(column.clone(), stats);
            }
        }
    }

    DataSummary {
        row_count: result.row_count,
        columns: result.columns.clone(),
        sample_data,
        null_counts,
        numeric_statistics,
    }
}

fn describe(values: &[f64]) -> Option<NumericStats> {
    if values.is_empty() {
        return None;
    }

    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let std = if count > 1 {
        let variance =
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        Some(variance.sqrt())
    } else {
        None
    };

    Some(NumericStats {
        count,
        mean,
        std,
        min,
        max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_result() -> ResultSet {
        ResultSet::new(
            vec!["AGENT_NAME".to_string(), "AHT_MINUTES".to_string()],
            vec![
                vec![Cell::Text("A. Mensah".to_string()), Cell::Float(12.5)],
                vec![Cell::Text("nan".to_string()), Cell::Float(f64::INFINITY)],
                vec![Cell::Text("B. Osei".to_string()), Cell::Float(f64::NAN)],
                vec![Cell::Null, Cell::Float(7.5)],
            ],
        )
    }

    #[test]
    fn non_finite_floats_become_null() {
        let cleaned = clean(raw_result());
        assert_eq!(cleaned.rows[1][1], Cell::Null);
        assert_eq!(cleaned.rows[2][1], Cell::Null);
        assert_eq!(cleaned.rows[0][1], Cell::Float(12.5));
    }

    #[test]
    fn textual_nan_sentinel_becomes_null() {
        let cleaned = clean(raw_result());
        assert_eq!(cleaned.rows[1][0], Cell::Null);
        assert_eq!(cleaned.rows[0][0], Cell::Text("A. Mensah".to_string()));
    }

    #[test]
    fn cleaned_result_serializes_without_nan_or_infinity_tokens() {
        let cleaned = clean(raw_result());
        let json = serde_json::to_string(&cleaned.records()).unwrap();
        assert!(!json.contains("NaN"));
        assert!(!json.contains("Infinity"));
        assert!(!json.contains("inf"));

        // and it round-trips
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 4);
    }

    #[test]
    fn summary_statistics_cover_numeric_columns() {
        let cleaned = clean(raw_result());
        let summary = summarize(&cleaned);

        assert_eq!(summary.row_count, 4);
        assert_eq!(summary.columns.len(), 2);
        assert_eq!(summary.null_counts["AGENT_NAME"], 2);
        assert_eq!(summary.null_counts["AHT_MINUTES"], 2);

        let stats = &summary.numeric_statistics["AHT_MINUTES"];
        assert_eq!(stats.count, 2);
        assert!((stats.mean - 10.0).abs() < 1e-9);
        assert_eq!(stats.min, 7.5);
        assert_eq!(stats.max, 12.5);
    }

    #[test]
    fn sample_is_capped_at_five_rows() {
        let rows = (0..10)
            .map(|i| vec![Cell::Int(i)])
            .collect::<Vec<_>>();
        let rs = ResultSet::new(vec!["N".to_string()], rows);
        assert_eq!(summarize(&rs).sample_data.len(), 5);
    }
}
