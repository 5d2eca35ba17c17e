use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::debug;

pub const DEFAULT_BUSINESS_CONTEXT: &str = "Analysis requested by user";

/// Structured candidate extracted from the completion capability's free-text
/// answer. The SQL may be absent; nothing here has been validated yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateQuery {
    #[serde(default)]
    pub sql_query: Option<String>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default = "default_business_context")]
    pub business_context: String,
    #[serde(default)]
    pub expected_insights: Vec<String>,
}

fn default_business_context() -> String {
    DEFAULT_BUSINESS_CONTEXT.to_string()
}

fn sql_block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)```sql\s*\n(.*?)\n```").expect("sql block pattern")
    })
}

/// Turns a completion response into a candidate query. Tries, in order:
/// structured JSON, a fenced ```sql block, then a line-by-line scan for the
/// first SELECT/WITH statement. The full text always survives as the
/// explanation when no structured form is found.
pub fn parse_completion(response: &str) -> CandidateQuery {
    let trimmed = response.trim();

    if trimmed.starts_with('{') {
        if let Ok(candidate) = serde_json::from_str::<CandidateQuery>(trimmed) {
            debug!("Parsed completion response as structured JSON");
            return candidate;
        }
    }

    let sql_query = if let Some(captures) = sql_block_pattern().captures(response) {
        Some(captures[1].trim().to_string())
    } else {
        response
            .lines()
            .map(str::trim)
            .find(|line| {
                let upper = line.to_uppercase();
                upper.starts_with("SELECT") || upper.starts_with("WITH")
            })
            .map(str::to_string)
    };

    CandidateQuery {
        sql_query,
        explanation: trimmed.to_string(),
        business_context: default_business_context(),
        expected_insights: Vec::new(),
    }
}
