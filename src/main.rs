use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

mod config;
mod db;
mod history;
mod ingest;
mod llm;
mod pipeline;
mod sql;
mod util;
mod web;

use crate::config::{AppConfig, CliArgs};
use crate::db::executor::DuckDbEngine;
use crate::history::HistoryStore;
use crate::llm::LlmManager;
use crate::pipeline::QueryPipeline;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args = CliArgs::parse();

    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!("Opening analytics database at {}", config.database.path);
    let pool = db::pool::build(&config.database)?;
    {
        let conn = pool.get()?;
        db::schema::bootstrap(&conn)?;
    }

    // One-shot loader mode: ingest a JSON export and exit.
    if let Some(path) = &args.load {
        info!("Loading JSON export from {}", path.display());
        let conn = pool.get()?;
        let stats = ingest::load_json(&conn, path)?;
        info!(
            "Loaded {} videos and {} snapshots ({} skipped)",
            stats.videos, stats.snapshots, stats.skipped
        );
        return Ok(());
    }

    info!("Initializing LLM manager for model {}", config.llm.model);
    let llm_manager = LlmManager::new(&config.llm)?;

    let engine = Arc::new(DuckDbEngine::new(pool));
    let history = Arc::new(HistoryStore::new());
    let pipeline = QueryPipeline::new(Arc::new(llm_manager), engine, history);

    let state = Arc::new(AppState::new(config.clone(), pipeline));

    info!("Starting nl-vidstats server on {}:{}", config.web.host, config.web.port);
    web::run_server(config.web, state).await?;
    info!("Server stopped");

    Ok(())
}
