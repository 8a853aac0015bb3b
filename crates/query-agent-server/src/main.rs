//! query-agent HTTP Server
//!
//! Axum-based server exposing the query agent over a small REST API.

mod config;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use query_agent_core::{AgentFactory, ChatService};
use query_agent_runtime::{BackendRouter, WebSearchTool};

use crate::config::ServerConfig;
use crate::handlers::{chat_handler, health_check, list_models};
use crate::state::AppState;

/// Routes and middleware over the given state
fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/models", get(list_models))
        // Agent API
        .route("/chat", post(chat_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Log whether the backend answers; requests are served either way
async fn check_backend(router: &BackendRouter) {
    let Some(provider) = router.provider() else {
        tracing::warn!("⚠ {} backend not initialized - chat requests will fail", router.kind());
        return;
    };

    match provider.health_check().await {
        Ok(true) => {
            tracing::info!("✓ Connected to {}", provider.name());
            if let Ok(models) = provider.list_models().await {
                tracing::debug!(count = models.len(), "Backend models listed");
            }
        }
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ {} not reachable - requests may fail until it is", provider.name());
        }
    }
}

async fn build_service(config: &ServerConfig) -> ChatService {
    let router = BackendRouter::from_config(&config.runtime, config.core.model_timeout());
    check_backend(&router).await;

    let mut factory = AgentFactory::new(Arc::new(router), config.core.clone());

    match WebSearchTool::from_config(&config.runtime, &config.core) {
        Some(search) => {
            tracing::info!("✓ Web search configured");
            factory = factory.with_search(Arc::new(search));
        }
        None => {
            tracing::warn!("⚠ TAVILY_API_KEY not set - requests with allow_search will be rejected");
        }
    }

    ChatService::new(factory)
}

async fn shutdown_signal(token: tokio_util::sync::CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown requested, cancelling in-flight runs");
    token.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        backend = %config.runtime.backend,
        max_iterations = config.core.max_iterations,
        model_timeout_secs = config.core.model_timeout_secs,
        tool_timeout_secs = config.core.tool_timeout_secs,
        "Configuration loaded"
    );
    for model in config.core.allowed_models.as_slice() {
        tracing::info!("  Model: {}", model);
    }

    let state = AppState::new(build_service(&config).await);
    let shutdown = state.shutdown.clone();

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("query-agent server running on http://{}", config.bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health     - Health check");
    tracing::info!("  GET  /api/models - List allowed models");
    tracing::info!("  POST /chat       - Ask the agent");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}
