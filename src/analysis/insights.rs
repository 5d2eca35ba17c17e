use crate::analysis::results::{self, DataSummary};
use crate::db::gateway::ResultSet;
use crate::llm::LlmManager;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{error, info};

pub const FALLBACK_INSIGHT: &str = "Unable to generate insights from the data";

/// Session id used for insight prompts so they never share conversation state
/// with the user's own session.
const INSIGHT_SESSION: &str = "insight_generation";

/// Asks the completion capability for 3-5 short answer bullets describing the
/// result set. Never fails: every error path degrades to a single fallback
/// insight.
pub async fn generate_insights(
    llm: &LlmManager,
    result: &ResultSet,
    sql_text: &str,
) -> Vec<String> {
    let summary = results::summarize(result);
    let prompt = build_insight_prompt(&summary, sql_text);

    match llm.generate(&prompt, INSIGHT_SESSION).await {
        Ok(response) => {
            let insights = parse_insight_response(&response);
            info!("Generated {} insights", insights.len());
            insights
        }
        Err(e) => {
            error!("Error generating insights: {}", e);
            vec![FALLBACK_INSIGHT.to_string()]
        }
    }
}

pub fn build_insight_prompt(summary: &DataSummary, sql_text: &str) -> String {
    let now = chrono::Utc::now();
    let current_date = now.format("%Y-%m-%d");
    let current_year = now.format("%Y");
    let current_month = now.format("%B");
    let summary_json =
        serde_json::to_string_pretty(summary).unwrap_or_else(|_| "{}".to_string());

    format!(
        r#"CURRENT DATE: {current_date} (Today's date is {current_date}, current year is {current_year}, current month is {current_month})

Based on the following query results, provide 3-5 TLDR-style bullet points as the direct answer:

SQL Query: {sql_text}
Data Summary: {summary_json}

CRITICAL REQUIREMENTS:
- Each point is the direct answer to the user's question
- Maximum 20 words per bullet point
- Start with the actual number/metric
- No fluff words like "indicates" or "suggests"
- If a finding is complex, break it into multiple simple points
- Focus on WHAT the data shows, not WHY it matters
- Use current date context when interpreting time references

Format like a TLDR summary:
- "291 agents have 95%+ adherence"
- "This represents 68% of total workforce"
- "Top performer: John Smith with 99% adherence"

Return ONLY a JSON array of direct answer points.
"#
    )
}

fn embedded_array_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[[\s\S]*?\]").expect("array pattern"))
}

/// Parses the bullet list out of a completion response: direct JSON array,
/// then an object carrying an `insights` key, then an embedded array literal,
/// and finally the raw text as a one-element list.
pub fn parse_insight_response(response: &str) -> Vec<String> {
    let trimmed = response.trim();

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(list) = as_string_list(&value) {
            return list;
        }
        if let Some(inner) = value.get("insights") {
            if let Some(list) = as_string_list(inner) {
                return list;
            }
            return vec![inner.to_string()];
        }
        return vec![value.to_string()];
    }

    if let Some(found) = embedded_array_pattern().find(response) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(found.as_str()) {
            if let Some(list) = as_string_list(&value) {
                return list;
            }
        }
    }

    vec![response.to_string()]
}

fn as_string_list(value: &serde_json::Value) -> Option<Vec<String>> {
    value.as_array().map(|items| {
        items
            .iter()
            .map(|item| match item.as_str() {
                Some(s) => s.to_string(),
                None => item.to_string(),
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::gateway::Cell;

    #[test]
    fn direct_json_array_parses() {
        let insights =
            parse_insight_response(r#"["291 agents have 95%+ adherence", "68% of workforce"]"#);
        assert_eq!(insights.len(), 2);
        assert_eq!(insights[0], "291 agents have 95%+ adherence");
    }

    #[test]
    fn object_with_insights_key_parses() {
        let insights = parse_insight_response(r#"{"insights": ["42 tickets solved"]}"#);
        assert_eq!(insights, vec!["42 tickets solved"]);
    }

    #[test]
    fn embedded_array_is_recovered_from_prose() {
        let response = "Here are the findings:\n[\"12 agents below target\", \"AHT up 8%\"]\nHope that helps.";
        let insights = parse_insight_response(response);
        assert_eq!(insights, vec!["12 agents below target", "AHT up 8%"]);
    }

    #[test]
    fn unparseable_response_becomes_single_insight() {
        let response = "The data shows a clear upward trend in ticket volume.";
        let insights = parse_insight_response(response);
        assert_eq!(insights, vec![response.to_string()]);
    }

    #[test]
    fn prompt_embeds_summary_and_query() {
        let rs = ResultSet::new(
            vec!["N".to_string()],
            vec![vec![Cell::Int(3)], vec![Cell::Int(5)]],
        );
        let summary = results::summarize(&rs);
        let prompt = build_insight_prompt(&summary, "SELECT N FROM T");

        assert!(prompt.contains("SELECT N FROM T"));
        assert!(prompt.contains("\"row_count\": 2"));
        assert!(prompt.contains("CURRENT DATE"));
        assert!(prompt.contains("Maximum 20 words"));
    }
}
