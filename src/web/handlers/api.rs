use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub user_id: Option<i64>,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ReplyResponse {
    pub reply: String,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub status: String,
    pub version: String,
    pub model: String,
    pub uptime_seconds: i64,
}

/// One question in, one user-safe reply out. Failures inside the pipeline
/// never surface here; the reply is always 200.
pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AskRequest>,
) -> Json<ReplyResponse> {
    let reply = state.pipeline.handle(payload.user_id, &payload.text).await;
    Json(ReplyResponse { reply })
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Json<ReplyResponse> {
    let reply = state.pipeline.history(Some(user_id)).await;
    Json(ReplyResponse { reply })
}

pub async fn system_status(State(state): State<Arc<AppState>>) -> Json<SystemStatus> {
    let uptime = chrono::Utc::now() - state.startup_time;
    Json(SystemStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.config.llm.model.clone(),
        uptime_seconds: uptime.num_seconds(),
    })
}
