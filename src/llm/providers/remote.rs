use crate::config::LlmConfig;
use crate::llm::models::CompletionResponse;
use crate::llm::{prompt, LlmError, SqlGenerator};
use crate::sql::{self, CandidateSql};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::info;

// Total budget for one completion call, connection included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RemoteLlmProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

impl RemoteLlmProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl SqlGenerator for RemoteLlmProvider {
    async fn generate_sql(&self, question: &str) -> Result<CandidateSql, LlmError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::ConfigError("API key is not configured".to_string()))?;

        let request = prompt::build_request(&self.model, question);

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::ConnectionError("request timed out".to_string())
                } else {
                    LlmError::ConnectionError(e.to_string())
                }
            })?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(LlmError::Unauthorized);
        }

        if !response.status().is_success() {
            return Err(LlmError::ResponseError(format!(
                "API responded with status code: {}",
                response.status()
            )));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseError(e.to_string()))?;

        let content = body
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or_else(|| LlmError::ResponseError("no choices in response".to_string()))?;

        let candidate = sql::strip_fences(content);
        info!(%question, sql = %candidate, "generated SQL candidate");

        Ok(CandidateSql::new(candidate))
    }
}
