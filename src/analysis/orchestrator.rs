use crate::analysis::charts::{self, ChartSpec};
use crate::analysis::insights;
use crate::analysis::relevance::{self, Relevance};
use crate::analysis::response::{self, CandidateQuery, DEFAULT_BUSINESS_CONTEXT};
use crate::analysis::results;
use crate::context::{BusinessContextProvider, FileContextProvider};
use crate::db::gateway::WarehouseGateway;
use crate::db::validator;
use crate::llm::LlmManager;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Tables listed first (and in full) in the prompt's schema section, to keep
/// prompt size bounded while covering what operators actually ask about.
const PRIORITY_TABLES: &[&str] = &["RPT_AGENT_SCHEDULE_ADHERENCE", "RPT_WOPS_AGENT_PERFORMANCE"];
const MAX_PROMPT_TABLES: usize = 5;

const DEFAULT_SESSION: &str = "default_session";

#[derive(Debug, Clone, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub conversation_history: Vec<ChatTurn>,
    #[serde(default)]
    pub file_ids: Vec<String>,
    #[serde(default)]
    pub context: Option<serde_json::Value>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// The full pipeline answer. `success` is true only when a candidate query
/// was extracted, validated, and executed.
#[derive(Debug, Serialize)]
pub struct QueryAnswer {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
    pub explanation: String,
    pub business_context: String,
    pub expected_insights: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<serde_json::Map<String, serde_json::Value>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    pub insights: Vec<String>,
    pub charts: Vec<ChartSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryAnswer {
    fn from_candidate(candidate: &CandidateQuery) -> Self {
        Self {
            success: false,
            sql_query: candidate.sql_query.clone(),
            explanation: candidate.explanation.clone(),
            business_context: candidate.business_context.clone(),
            expected_insights: candidate.expected_insights.clone(),
            data: None,
            row_count: None,
            columns: None,
            insights: Vec::new(),
            charts: Vec::new(),
            error: None,
        }
    }

    fn explanation_only(explanation: String) -> Self {
        Self {
            success: false,
            sql_query: None,
            explanation,
            business_context: DEFAULT_BUSINESS_CONTEXT.to_string(),
            expected_insights: Vec::new(),
            data: None,
            row_count: None,
            columns: None,
            insights: Vec::new(),
            charts: Vec::new(),
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        let mut answer = Self::explanation_only(String::new());
        answer.error = Some(error);
        answer
    }
}

/// Assembles context, calls the completion capability, and drives the
/// extracted candidate through validation, execution, insight generation and
/// chart synthesis.
pub struct QueryOrchestrator {
    gateway: Arc<WarehouseGateway>,
    llm: Arc<LlmManager>,
    business_context: Arc<dyn BusinessContextProvider>,
    file_context: Arc<dyn FileContextProvider>,
}

impl QueryOrchestrator {
    pub fn new(
        gateway: Arc<WarehouseGateway>,
        llm: Arc<LlmManager>,
        business_context: Arc<dyn BusinessContextProvider>,
        file_context: Arc<dyn FileContextProvider>,
    ) -> Self {
        Self {
            gateway,
            llm,
            business_context,
            file_context,
        }
    }

    pub async fn answer(&self, request: AskRequest) -> QueryAnswer {
        let session_id = request
            .session_id
            .clone()
            .unwrap_or_else(|| DEFAULT_SESSION.to_string());

        if let Relevance::Blocked { suggestion } = relevance::check(&request.question) {
            info!("Request blocked by domain filter");
            return QueryAnswer::explanation_only(format!(
                "I'm specifically designed to help with Worker Operations Business Intelligence questions. {}",
                suggestion
            ));
        }

        let prompt = self.build_prompt(&request).await;

        let completion = match self.llm.generate(&prompt, &session_id).await {
            Ok(text) => text,
            Err(e) => {
                error!("Completion call failed: {}", e);
                return QueryAnswer::failed(e.to_string());
            }
        };

        let candidate = response::parse_completion(&completion);
        let mut answer = QueryAnswer::from_candidate(&candidate);

        let Some(sql) = candidate.sql_query else {
            warn!("No SQL query found in completion response");
            return answer;
        };

        if !validator::validate_sql(&sql) {
            error!("Candidate query failed validation: {}", sql);
            answer.error = Some("Query contains forbidden operations".to_string());
            return answer;
        }

        info!("Executing candidate query: {}", sql);
        match self.gateway.execute(&sql).await {
            Ok(raw) => {
                let cleaned = results::clean(raw);
                answer.success = true;
                answer.row_count = Some(cleaned.row_count);
                answer.columns = Some(cleaned.columns.clone());
                answer.insights = insights::generate_insights(&self.llm, &cleaned, &sql).await;
                if !cleaned.is_empty() && charts::should_chart(&request.question, &cleaned) {
                    answer.charts = charts::synthesize(&cleaned, &request.question);
                }
                answer.data = Some(cleaned.records());
            }
            Err(e) => {
                error!("Error executing query: {}", e);
                answer.error = Some(e.to_string());
            }
        }

        answer
    }

    async fn build_prompt(&self, request: &AskRequest) -> String {
        let now = chrono::Utc::now();
        let mut prompt = format!(
            "CONTEXT: This is a Worker Operations Business Intelligence query.\n\n\
             CURRENT DATE: {date} (Today's date is {date}, current year is {year}, current month is {month})\n\n\
             USER QUERY: {question}",
            date = now.format("%Y-%m-%d"),
            year = now.format("%Y"),
            month = now.format("%B"),
            question = request.question,
        );

        prompt.push_str("\n\nDATABASE SCHEMA INFORMATION:\n");
        prompt.push_str(&self.schema_context().await);

        if self.business_context.is_configured() {
            if let Some(context) = self.business_context.context_for(&request.question).await {
                prompt.push_str("\n\nBusiness context from documentation:\n");
                prompt.push_str(&context);
            }
        }

        let mut file_contexts = Vec::new();
        for file_id in &request.file_ids {
            if let Some(content) = self.file_context.content_for(file_id).await {
                file_contexts.push(content);
            }
        }
        if !file_contexts.is_empty() {
            prompt.push_str("\n\nAdditional file context:\n");
            prompt.push_str(&file_contexts.join("\n---\n"));
        }

        if let Some(extra) = &request.context {
            let dump = serde_json::to_string_pretty(extra).unwrap_or_else(|_| extra.to_string());
            prompt.push_str("\n\nAdditional context: ");
            prompt.push_str(&dump);
        }

        if !request.conversation_history.is_empty() {
            prompt.push_str("\n\nCONVERSATION HISTORY:\n");
            for turn in &request.conversation_history {
                prompt.push_str(&format!("{}: {}\n", turn.role, turn.content));
            }
        }

        prompt.push_str(
            r#"

INSTRUCTIONS: Only provide responses related to Worker Operations data analysis, SQL queries for the available tables, and business insights. When a user asks a question about data, generate a SELECT query that will be EXECUTED against the database and the actual results returned.
1. Only use SELECT statements - no INSERT, UPDATE, DELETE, etc.
2. All queries are automatically limited to 200 rows
3. Only use column names that EXACTLY match those in the schema above
4. If a user asks about a column that doesn't exist, suggest alternatives or explain what's available
5. When the user mentions time periods like "this month" or "recent", use the current date context provided above

Response format (JSON):
{
    "sql_query": "SELECT column_name FROM table_name WHERE condition ORDER BY column_name",
    "explanation": "Clear explanation of what the query does and what results it will return",
    "business_context": "Business context explaining why this analysis is valuable",
    "expected_insights": ["List of key insights the query will provide"]
}
"#,
        );

        prompt
    }

    /// Table list plus a column/type listing for a bounded subset of tables,
    /// priority tables first, with join and search guidance.
    async fn schema_context(&self) -> String {
        let tables = self.gateway.list_tables().await;

        let mut ordered: Vec<String> = PRIORITY_TABLES
            .iter()
            .filter(|t| tables.iter().any(|name| name == *t))
            .map(|t| t.to_string())
            .collect();
        for table in &tables {
            if !ordered.contains(table) && ordered.len() < MAX_PROMPT_TABLES {
                ordered.push(table.clone());
            }
        }

        let mut lines = vec![format!("Available tables: {}", tables.join(", "))];

        for table in &ordered {
            let schema = self.gateway.get_schema(table).await;
            if schema.is_empty() {
                lines.push(format!("- {}: Schema not available", table));
                continue;
            }

            let columns: Vec<String> = schema
                .columns
                .iter()
                .map(|col| {
                    let mut desc = format!("{} ({})", col.name, col.data_type);
                    if let Some(note) = column_note(&col.name) {
                        desc.push_str(" - ");
                        desc.push_str(note);
                    }
                    desc
                })
                .collect();
            lines.push(format!("- {}: {}", table, columns.join(", ")));
        }

        lines.push(SCHEMA_GUIDANCE.to_string());
        lines.join("\n")
    }
}

fn column_note(name: &str) -> Option<&'static str> {
    let upper = name.to_uppercase();
    if upper.contains("ADHERENCE_PERCENTAGE") {
        Some("use TRY_CAST(... AS DOUBLE) - may contain '-'")
    } else if upper == "AGENT_NAME" || upper == "ASSIGNEE_NAME" {
        Some("for joining tables")
    } else if upper.contains("SUPERVISOR") {
        Some("for filtering by supervisor")
    } else if upper.contains("DATE") {
        Some("date column")
    } else {
        None
    }
}

const SCHEMA_GUIDANCE: &str = r#"
KEY RELATIONSHIPS:
- Join tables using: RPT_AGENT_SCHEDULE_ADHERENCE.AGENT_NAME = RPT_WOPS_AGENT_PERFORMANCE.ASSIGNEE_NAME
- Filter by supervisor: Use ASSIGNEE_SUPERVISOR column in RPT_WOPS_AGENT_PERFORMANCE (no JOIN needed)
- For date filtering: Use appropriate date columns (ADHERENCE_DATE, SOLVED_WEEK, etc.)

CRITICAL SEARCH RULES:
- ALWAYS use LIKE or ILIKE for name searches, NEVER exact equals (=)
- For agent names: WHERE AGENT_NAME ILIKE '%John%' (not WHERE AGENT_NAME = 'John')
- Use % wildcards before and after search terms to catch partial matches
- ILIKE is case-insensitive, LIKE is case-sensitive - prefer ILIKE for names

IMPORTANT NOTES:
- ADHERENCE_PERCENTAGE may contain '-' or text, always use TRY_CAST(... AS DOUBLE) for numeric operations
- All date columns should be filtered appropriately for time-based analysis
- Names in database may be full names while users provide nicknames/short names"#;
