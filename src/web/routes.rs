use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// REST API for the chat front end
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            .route("/ask", post(handlers::api::ask))
            .route("/history/{user_id}", get(handlers::api::history))
            .route("/status", get(handlers::api::system_status)),
    )
}
