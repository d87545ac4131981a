use crate::db::schema::SCHEMA_DDL;
use crate::llm::models::{CompletionRequest, Message};

pub const SYSTEM_PROMPT: &str = "You translate analytics questions about a video \
statistics database into SQL. Reply with exactly one SELECT statement and nothing \
else: no explanation, no Markdown.";

// Near-deterministic output, and one SELECT statement fits well under the cap.
const TEMPERATURE: f32 = 0.1;
const MAX_TOKENS: u32 = 300;

fn user_prompt(question: &str) -> String {
    format!(
        r#"Generate a single SQL SELECT statement that answers the question `{}`.

The query will run against a database with this schema:

{}

Rules:
- return one SELECT statement only, never any other statement kind
- prefer a single aggregate value where the question asks "how many" or "how much"
- use literal values in the statement; bind parameters are not supported"#,
        question, SCHEMA_DDL
    )
}

/// Renders the fixed instruction plus the user's question into a completion
/// request. The question is interpolated verbatim; safety checks apply to the
/// model's output, not to this input.
pub fn build_request(model: &str, question: &str) -> CompletionRequest {
    CompletionRequest {
        model: model.to_string(),
        messages: vec![
            Message { role: "system".to_string(), content: SYSTEM_PROMPT.to_string() },
            Message { role: "user".to_string(), content: user_prompt(question) },
        ],
        temperature: TEMPERATURE,
        max_tokens: MAX_TOKENS,
        stream: false,
    }
}
