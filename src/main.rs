// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use anyhow::Context;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::channel_source::SourceLayout;
use crate::application::streaming_service::StreamingViewService;
use crate::application::view_registry::ViewRegistry;
use crate::application::view_service::{BudgetLimits, ViewService};
use crate::infrastructure::config::{load_server_config, load_source_config};
use crate::infrastructure::json_source::JsonFileSource;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    build_view, close_session, discover_channels, health_check, list_files, relayout, series,
    stream_relayout, view_summary,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let server_config = load_server_config().context("Failed to load config/server.toml")?;
    let source_config = load_source_config().context("Failed to load config/source.toml")?;

    // Create source (infrastructure layer)
    let source = Arc::new(JsonFileSource::new(&source_config.source));

    // Create services (application layer)
    let view_service = ViewService::new(
        source,
        Arc::new(ViewRegistry::with_max_sessions(server_config.view.max_sessions)),
        SourceLayout::from(&source_config.source),
        BudgetLimits::from(&server_config.view),
    );
    let streaming_service = StreamingViewService::new(view_service.clone());

    let state = Arc::new(AppState {
        view_service,
        streaming_service,
        timestamp_format: server_config.view.timestamp_format,
    });

    // Compression is applied by the response builders, so no CompressionLayer here.
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/files", get(list_files))
        .route("/channels", get(discover_channels))
        .route("/sessions/:session/view", post(build_view))
        .route("/sessions/:session", delete(close_session))
        .route("/views/:handle", get(view_summary))
        .route("/views/:handle/series", get(relayout))
        .route("/views/:handle/series/:channel", get(series))
        .route("/views/:handle/relayout", get(stream_relayout))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let bind = &server_config.server.bind;
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    tracing::info!(
        "Serving {} on {}",
        source_config.source.data_dir.display(),
        listener.local_addr()?
    );

    axum::serve(listener, router).await?;

    Ok(())
}
