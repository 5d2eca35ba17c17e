use crate::db::gateway::{Cell, ResultSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Question words that suggest a visual answer.
const CHART_KEYWORDS: &[&str] = &[
    "trend",
    "trends",
    "trending",
    "over time",
    "timeline",
    "compare",
    "comparison",
    "versus",
    "vs",
    "against",
    "top",
    "bottom",
    "highest",
    "lowest",
    "best",
    "worst",
    "distribution",
    "breakdown",
    "split",
    "by",
    "chart",
    "graph",
    "plot",
    "visualize",
    "show",
    "performance",
    "productivity",
    "efficiency",
    "weekly",
    "monthly",
    "daily",
    "quarterly",
    "growth",
    "decline",
    "increase",
    "decrease",
];

/// Column-name fragments marking a time axis for trend charts.
const TIME_NAME_FRAGMENTS: &[&str] = &["DATE", "TIME", "WEEK", "MONTH", "DAY"];

const MAX_CHARTS: usize = 3;
const MAX_CHART_ROWS: usize = 50;
const MAX_METRICS: usize = 2;
const MAX_CATEGORIES: usize = 10;
const MAX_SLICES: usize = 8;
const MAX_DISTRIBUTION_ROWS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Doughnut,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(rename = "type")]
    pub chart_type: ChartKind,
    pub title: String,
    pub data: ChartData,
}

/// Charts help only when there is something to group and something to
/// measure, and the question actually asks for a visual-style answer.
pub fn should_chart(user_text: &str, result: &ResultSet) -> bool {
    if result.row_count < 2 || result.columns.len() < 2 {
        return false;
    }

    let has_numeric = (0..result.columns.len()).any(|i| result.is_numeric_column(i));
    if !has_numeric {
        return false;
    }

    let question = user_text.to_lowercase();
    CHART_KEYWORDS.iter().any(|kw| question.contains(kw))
}

/// Derives up to three chart specs: trend lines, comparison bars, then a
/// distribution doughnut, in that order.
pub fn synthesize(result: &ResultSet, user_text: &str) -> Vec<ChartSpec> {
    if result.is_empty() {
        return Vec::new();
    }

    // Cap the working set for performance
    let capped = if result.row_count > MAX_CHART_ROWS {
        ResultSet::new(
            result.columns.clone(),
            result.rows.iter().take(MAX_CHART_ROWS).cloned().collect(),
        )
    } else {
        result.clone()
    };

    let numeric_cols: Vec<usize> = (0..capped.columns.len())
        .filter(|&i| capped.is_numeric_column(i))
        .collect();
    let categorical_cols: Vec<usize> = (0..capped.columns.len())
        .filter(|&i| capped.is_text_column(i))
        .collect();

    let mut charts = Vec::new();
    charts.extend(trend_charts(&capped, &numeric_cols));
    charts.extend(comparison_charts(&capped, &numeric_cols, &categorical_cols));
    charts.extend(distribution_chart(&capped, &categorical_cols));

    debug!(
        "Synthesized {} charts for question '{}'",
        charts.len().min(MAX_CHARTS),
        user_text
    );
    charts.truncate(MAX_CHARTS);
    charts
}

fn cell_label(cell: &Cell) -> String {
    match cell {
        Cell::Null => "null".to_string(),
        Cell::Bool(b) => b.to_string(),
        Cell::Int(v) => v.to_string(),
        Cell::Float(v) => v.to_string(),
        Cell::Text(s) => s.clone(),
    }
}

fn time_column(result: &ResultSet) -> Option<usize> {
    result.columns.iter().position(|name| {
        let upper = name.to_uppercase();
        TIME_NAME_FRAGMENTS.iter().any(|frag| upper.contains(frag))
    })
}

/// Groups rows by the label of one column and averages a metric column per
/// group. Labels come back sorted.
fn group_means(result: &ResultSet, group_col: usize, metric_col: usize) -> Vec<(String, f64)> {
    let mut buckets: BTreeMap<String, (f64, usize)> = BTreeMap::new();

    for row in &result.rows {
        let Some(value) = row.get(metric_col).and_then(Cell::as_f64) else {
            continue;
        };
        let label = row.get(group_col).map(cell_label).unwrap_or_default();
        let entry = buckets.entry(label).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }

    buckets
        .into_iter()
        .map(|(label, (sum, count))| (label, sum / count as f64))
        .collect()
}

fn trend_charts(result: &ResultSet, numeric_cols: &[usize]) -> Vec<ChartSpec> {
    let Some(date_col) = time_column(result) else {
        return Vec::new();
    };

    let mut charts = Vec::new();
    for &metric_col in numeric_cols.iter().take(MAX_METRICS) {
        let series = group_means(result, date_col, metric_col);
        if series.len() < 2 {
            continue;
        }

        let metric = &result.columns[metric_col];
        charts.push(ChartSpec {
            chart_type: ChartKind::Line,
            title: format!("{} Trend Over Time", metric),
            data: ChartData {
                labels: series.iter().map(|(label, _)| label.clone()).collect(),
                datasets: vec![Dataset {
                    label: metric.clone(),
                    data: series.iter().map(|(_, value)| *value).collect(),
                }],
            },
        });
    }

    charts
}

fn comparison_charts(
    result: &ResultSet,
    numeric_cols: &[usize],
    categorical_cols: &[usize],
) -> Vec<ChartSpec> {
    let Some(&cat_col) = categorical_cols.first() else {
        return Vec::new();
    };

    let mut charts = Vec::new();
    for &metric_col in numeric_cols.iter().take(MAX_METRICS) {
        let mut series = group_means(result, cat_col, metric_col);
        series.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        series.truncate(MAX_CATEGORIES);

        if series.len() < 2 {
            continue;
        }

        let metric = &result.columns[metric_col];
        charts.push(ChartSpec {
            chart_type: ChartKind::Bar,
            title: format!("{} by {}", metric, result.columns[cat_col]),
            data: ChartData {
                labels: series.iter().map(|(label, _)| label.clone()).collect(),
                datasets: vec![Dataset {
                    label: metric.clone(),
                    data: series.iter().map(|(_, value)| *value).collect(),
                }],
            },
        });
    }

    charts
}

fn distribution_chart(result: &ResultSet, categorical_cols: &[usize]) -> Vec<ChartSpec> {
    // Doughnuts only read well on small result sets
    if result.row_count > MAX_DISTRIBUTION_ROWS {
        return Vec::new();
    }
    let Some(&cat_col) = categorical_cols.first() else {
        return Vec::new();
    };

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for row in &result.rows {
        if let Some(cell) = row.get(cat_col) {
            if !cell.is_null() {
                *counts.entry(cell_label(cell)).or_insert(0) += 1;
            }
        }
    }

    let mut ordered: Vec<(String, usize)> = counts.into_iter().collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1));
    ordered.truncate(MAX_SLICES);

    if ordered.len() < 2 {
        return Vec::new();
    }

    vec![ChartSpec {
        chart_type: ChartKind::Doughnut,
        title: format!("Distribution by {}", result.columns[cat_col]),
        data: ChartData {
            labels: ordered.iter().map(|(label, _)| label.clone()).collect(),
            datasets: vec![Dataset {
                label: "Count".to_string(),
                data: ordered.iter().map(|(_, count)| *count as f64).collect(),
            }],
        },
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn region_counts() -> ResultSet {
        ResultSet::new(
            vec!["REGION".to_string(), "COUNT".to_string()],
            vec![
                vec![text("EMEA"), Cell::Int(40)],
                vec![text("APAC"), Cell::Int(25)],
                vec![text("AMER"), Cell::Int(60)],
                vec![text("EMEA"), Cell::Int(10)],
                vec![text("LATAM"), Cell::Int(5)],
            ],
        )
    }

    #[test]
    fn should_chart_needs_keyword_and_numeric_data() {
        let rs = region_counts();
        assert!(should_chart("show distribution by region", &rs));
        assert!(!should_chart("what is the answer", &rs));

        let text_only = ResultSet::new(
            vec!["A".to_string(), "B".to_string()],
            vec![
                vec![text("x"), text("y")],
                vec![text("p"), text("q")],
            ],
        );
        assert!(!should_chart("show distribution by region", &text_only));
    }

    #[test]
    fn should_chart_rejects_tiny_results() {
        let rs = ResultSet::new(
            vec!["REGION".to_string(), "COUNT".to_string()],
            vec![vec![text("EMEA"), Cell::Int(40)]],
        );
        assert!(!should_chart("show distribution by region", &rs));
    }

    #[test]
    fn distribution_question_yields_exactly_one_doughnut() {
        let rs = region_counts();
        let charts = synthesize(&rs, "show distribution by region");

        let doughnuts: Vec<&ChartSpec> = charts
            .iter()
            .filter(|c| c.chart_type == ChartKind::Doughnut)
            .collect();
        assert_eq!(doughnuts.len(), 1);
        assert!(doughnuts[0].data.labels.len() <= 5);
        assert_eq!(doughnuts[0].data.datasets[0].label, "Count");
        assert!(charts.len() <= 3);
    }

    #[test]
    fn comparison_bars_are_sorted_descending_and_capped() {
        let rows = (0..15)
            .map(|i| vec![text(&format!("cat{:02}", i)), Cell::Int(i)])
            .collect::<Vec<_>>();
        let rs = ResultSet::new(vec!["CATEGORY".to_string(), "SCORE".to_string()], rows);

        let charts = synthesize(&rs, "compare scores");
        let bar = charts
            .iter()
            .find(|c| c.chart_type == ChartKind::Bar)
            .expect("bar chart");

        assert_eq!(bar.data.labels.len(), 10);
        assert_eq!(bar.data.labels[0], "cat14");
        let values = &bar.data.datasets[0].data;
        assert!(values.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn trend_chart_groups_and_averages_by_week() {
        let rs = ResultSet::new(
            vec!["SOLVED_WEEK".to_string(), "AHT_MINUTES".to_string()],
            vec![
                vec![text("2026-W30"), Cell::Float(10.0)],
                vec![text("2026-W30"), Cell::Float(14.0)],
                vec![text("2026-W31"), Cell::Float(8.0)],
            ],
        );

        let charts = synthesize(&rs, "weekly aht trend");
        let line = charts
            .iter()
            .find(|c| c.chart_type == ChartKind::Line)
            .expect("line chart");

        assert_eq!(line.title, "AHT_MINUTES Trend Over Time");
        assert_eq!(line.data.labels, vec!["2026-W30", "2026-W31"]);
        assert_eq!(line.data.datasets[0].data, vec![12.0, 8.0]);
    }

    #[test]
    fn single_bucket_produces_no_trend_chart() {
        let rs = ResultSet::new(
            vec!["SOLVED_WEEK".to_string(), "AHT_MINUTES".to_string()],
            vec![
                vec![text("2026-W30"), Cell::Float(10.0)],
                vec![text("2026-W30"), Cell::Float(14.0)],
            ],
        );
        let charts = synthesize(&rs, "weekly aht trend");
        assert!(charts.iter().all(|c| c.chart_type != ChartKind::Line));
    }

    #[test]
    fn never_more_than_three_charts() {
        let rs = ResultSet::new(
            vec![
                "SOLVED_WEEK".to_string(),
                "TEAM".to_string(),
                "AHT_MINUTES".to_string(),
                "NUM_TICKETS".to_string(),
            ],
            vec![
                vec![text("2026-W30"), text("alpha"), Cell::Float(10.0), Cell::Int(4)],
                vec![text("2026-W31"), text("beta"), Cell::Float(12.0), Cell::Int(6)],
                vec![text("2026-W32"), text("alpha"), Cell::Float(9.0), Cell::Int(2)],
            ],
        );
        let charts = synthesize(&rs, "compare weekly performance breakdown");
        assert!(charts.len() <= 3);
    }

    #[test]
    fn chart_spec_serializes_to_expected_shape() {
        let spec = ChartSpec {
            chart_type: ChartKind::Doughnut,
            title: "Distribution by REGION".to_string(),
            data: ChartData {
                labels: vec!["EMEA".to_string()],
                datasets: vec![Dataset {
                    label: "Count".to_string(),
                    data: vec![2.0],
                }],
            },
        };

        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["type"], "doughnut");
        assert_eq!(json["data"]["labels"][0], "EMEA");
        assert_eq!(json["data"]["datasets"][0]["data"][0], 2.0);
    }
}
