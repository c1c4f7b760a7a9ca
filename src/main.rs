//! Sentinel Core Service
//!
//! Log-triage and retrieval backend: ingests service log lines, classifies
//! them for security anomalies with a generative model (cached), persists
//! verdicts with embeddings, fans results out to live subscribers, fires
//! threshold alerts, and answers natural-language questions against the
//! accumulated history via similarity search plus generation.
//!
//! # Architecture
//!
//! ```text
//! producers ──POST /ingest──▶ IngestionPipeline ──▶ Broadcaster ──SSE──▶ dashboards
//!                                │        │  └──────▶ AlertDispatcher ──▶ webhook
//!                                │        └─(spawned)─▶ embed + Store.insert
//!                                ▼
//!                        Classifier + VerdictCache ──▶ Gemini
//!
//! askers ────POST /chat────▶ ChatEngine ──▶ embed ──▶ Store.match_logs ──▶ generate
//! ```

mod ai;
mod alert;
mod broadcast;
mod chat_engine;
mod config;
mod error;
mod handlers;
mod models;
mod pipeline;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ai::{Classifier, GeminiClient};
use alert::{AlertDispatcher, DiscordWebhook};
use broadcast::Broadcaster;
use chat_engine::ChatEngine;
use pipeline::IngestionPipeline;
use store::{LogStore, SupabaseStore};

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sentinel_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration; missing model or store credentials abort startup.
    dotenvy::dotenv().ok();
    let config = config::Config::from_env().context("configuration error")?;

    tracing::info!("Sentinel Core starting...");
    tracing::info!("AI model: {}", config.ai_model);
    tracing::info!("Embedding model: {}", config.embedding_model);

    // Wire up the pipeline around the external collaborators.
    let model = Arc::new(GeminiClient::new(&config));
    let store: Arc<dyn LogStore> = Arc::new(SupabaseStore::new(&config));
    let broadcaster = Broadcaster::new();

    let alerts = match &config.discord_webhook_url {
        Some(url) => AlertDispatcher::new(Some(Arc::new(DiscordWebhook::new(url.clone())))),
        None => {
            tracing::warn!("DISCORD_WEBHOOK_URL not set, alerting disabled");
            AlertDispatcher::disabled()
        }
    };

    let pipeline = IngestionPipeline::new(
        Classifier::new(model.clone(), config.verdict_cache_capacity),
        model.clone(),
        store.clone(),
        alerts,
        broadcaster.clone(),
    );

    let state = AppState {
        pipeline: Arc::new(pipeline),
        chat: Arc::new(ChatEngine::new(model, store.clone())),
        broadcaster,
        store,
    };

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Sentinel Core listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IngestionPipeline>,
    pub chat: Arc<ChatEngine>,
    pub broadcaster: Broadcaster,
    pub store: Arc<dyn LogStore>,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))
        .route("/api/v1/ingest", post(handlers::ingest::ingest))
        .route("/api/v1/chat", post(handlers::chat::chat))
        .route("/api/v1/stream", get(handlers::stream::stream))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
