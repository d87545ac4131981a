pub mod models;
pub mod prompt;
pub mod providers;

use crate::config::LlmConfig;
use crate::sql::CandidateSql;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use tracing::warn;

#[derive(Debug)]
pub enum LlmError {
    Unauthorized,
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::Unauthorized => write!(f, "completion service rejected the API credentials"),
            LlmError::ConnectionError(msg) => write!(f, "LLM connection error: {}", msg),
            LlmError::ResponseError(msg) => write!(f, "LLM response error: {}", msg),
            LlmError::ConfigError(msg) => write!(f, "LLM configuration error: {}", msg),
        }
    }
}

impl Error for LlmError {}

/// Turns a free-text question into a candidate SQL statement.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn generate_sql(&self, question: &str) -> Result<CandidateSql, LlmError>;
}

pub struct LlmManager {
    generator: Box<dyn SqlGenerator>,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        if config.api_key.is_none() {
            warn!("LLM API key is not set; questions will fail until one is configured");
        }

        Ok(Self {
            generator: Box::new(providers::remote::RemoteLlmProvider::new(config)?),
        })
    }
}

#[async_trait]
impl SqlGenerator for LlmManager {
    async fn generate_sql(&self, question: &str) -> Result<CandidateSql, LlmError> {
        self.generator.generate_sql(question).await
    }
}
