//! Sequences one incoming question through prompt → completion → validation →
//! execution → history. Every collaborator failure is logged in full and
//! replaced by a single generic user-facing message.

use crate::db::executor::{EngineError, QueryEngine, QueryExecutor, QueryResult};
use crate::history::{HistoryEntry, HistoryStore, ANONYMOUS_USER};
use crate::llm::{LlmError, SqlGenerator};
use crate::sql::{self, PolicyError, ValidatedSql};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

pub const MSG_SHORT_QUERY: &str = "That query is too short. Please add more detail.";
pub const MSG_ERROR: &str = "Could not answer that. Please rephrase your question.";

const MIN_QUESTION_CHARS: usize = 5;

#[derive(Debug)]
pub enum PipelineError {
    Llm(LlmError),
    Policy { error: PolicyError, sql: String },
    Engine { error: EngineError, sql: String },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Llm(e) => write!(f, "{}", e),
            // The offending SQL is part of the message for forensic review.
            PipelineError::Policy { error, sql } => {
                write!(f, "rejected SQL candidate ({}): {}", error, sql)
            }
            PipelineError::Engine { error, sql } => write!(f, "{} (sql: {})", error, sql),
        }
    }
}

impl Error for PipelineError {}

pub struct QueryPipeline {
    generator: Arc<dyn SqlGenerator>,
    executor: QueryExecutor,
    history: Arc<HistoryStore>,
}

impl QueryPipeline {
    pub fn new(
        generator: Arc<dyn SqlGenerator>,
        engine: Arc<dyn QueryEngine>,
        history: Arc<HistoryStore>,
    ) -> Self {
        Self {
            generator,
            executor: QueryExecutor::new(engine),
            history,
        }
    }

    /// Answers one question. Always returns a user-safe reply string.
    pub async fn handle(&self, user_id: Option<i64>, text: &str) -> String {
        let question = text.trim();
        if question.chars().count() < MIN_QUESTION_CHARS {
            debug!(%question, "question below minimum length");
            return MSG_SHORT_QUERY.to_string();
        }

        match self.answer(question).await {
            Ok((sql, result)) => {
                let reply = result.render();
                self.history
                    .record(
                        user_id.unwrap_or(ANONYMOUS_USER),
                        HistoryEntry {
                            query: question.to_string(),
                            sql: sql.into_inner(),
                            result: reply.clone(),
                        },
                    )
                    .await;
                reply
            }
            Err(e) => {
                error!(%question, error = %e, "pipeline failed");
                MSG_ERROR.to_string()
            }
        }
    }

    async fn answer(&self, question: &str) -> Result<(ValidatedSql, QueryResult), PipelineError> {
        let candidate = self
            .generator
            .generate_sql(question)
            .await
            .map_err(PipelineError::Llm)?;

        let sql = sql::validate(candidate.clone()).map_err(|error| PipelineError::Policy {
            error,
            sql: candidate.as_str().to_string(),
        })?;

        let result = self
            .executor
            .execute(&sql)
            .await
            .map_err(|error| PipelineError::Engine {
                error,
                sql: sql.as_str().to_string(),
            })?;

        Ok((sql, result))
    }

    /// Recent-history read-back for the caller.
    pub async fn history(&self, user_id: Option<i64>) -> String {
        self.history.render(user_id.unwrap_or(ANONYMOUS_USER)).await
    }
}
