use crate::config::AppConfig;
use crate::pipeline::QueryPipeline;

/// Shared application state for the web server.
pub struct AppState {
    pub config: AppConfig,
    pub pipeline: QueryPipeline,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: AppConfig, pipeline: QueryPipeline) -> Self {
        Self {
            config,
            pipeline,
            startup_time: chrono::Utc::now(),
        }
    }
}
