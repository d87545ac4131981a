pub mod handlers;
pub mod routes;
pub mod state;

use crate::config::WebConfig;
use state::AppState;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

pub async fn run_server(config: WebConfig, state: Arc<AppState>) -> std::io::Result<()> {
    let app = routes::api_routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {}", addr);

    axum::serve(listener, app).await
}
