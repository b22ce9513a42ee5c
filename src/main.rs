//! Intelligence Explorer · Adaptive Assessment Backend
//!
//! - Adaptive multiple-intelligences questionnaire with early stopping
//! - Axum HTTP + WebSocket API over in-memory sessions
//! - Optional OpenAI integration (via environment variables); local bank otherwise
//! - Reports grounded by retrieval over a directory of reference documents
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                   : u16 (default 3000)
//!   OPENAI_API_KEY         : enables OpenAI integration if present
//!   OPENAI_BASE_URL        : default "https://api.openai.com/v1"
//!   OPENAI_FAST_MODEL      : default "gpt-4o-mini" (answer disambiguation)
//!   OPENAI_STRONG_MODEL    : default "gpt-4o" (questions, narrative)
//!   OPENAI_EMBEDDING_MODEL : default "text-embedding-3-small"
//!   AGENT_CONFIG_PATH      : path to TOML config (prompts + assessment settings)
//!   DOCS_DIR               : reference documents (.txt/.md), default "docs"
//!   LOG_LEVEL              : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT             : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod seeds;
mod capabilities;
mod evidence;
mod retrieval;
mod question;
mod resolver;
mod report;
mod assessment;
mod local;
mod openai;
mod state;
mod protocol;
mod logic;
mod routes;
#[cfg(test)]
mod testing;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::{spawn_session_reaper, AppState};

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: capabilities, embedded knowledge base, session store.
  let state = Arc::new(AppState::bootstrap().await);

  let reaper = spawn_session_reaper(state.clone());

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "explorer_backend", %addr, max_questions = state.settings.max_questions, threshold = state.settings.confidence_threshold, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  reaper.abort();
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "explorer_backend", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "explorer_backend", "Shutdown signal received");
}
