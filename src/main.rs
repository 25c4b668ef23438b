// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::dashboard_service::DashboardService;
use crate::infrastructure::config::{load_app_config, load_dashboards_config};
use crate::infrastructure::monday_repository::MondayRepository;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{get_dashboard, health_check, list_dashboards, refresh_dashboard};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let app_config = load_app_config().context("Failed to load config/monday")?;
    let dashboards = load_dashboards_config().context("Failed to load config/dashboards")?;
    if app_config.monday.api_token.trim().is_empty() {
        tracing::warn!("No Monday.com API token configured, every fetch will fail authentication");
    }

    // Infrastructure
    let repository = Arc::new(MondayRepository::new(&app_config.monday)?);

    // Application
    let dashboard_service = DashboardService::new(
        repository,
        dashboards,
        app_config.monday.page_limit,
        app_config.monday.cache_ttl(),
    );

    let state = Arc::new(AppState { dashboard_service });

    // Presentation
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/dashboards", get(list_dashboards))
        .route("/dashboards/:id", get(get_dashboard))
        .route("/dashboards/:id/refresh", post(refresh_dashboard))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = app_config
        .server
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address {}", app_config.server.listen))?;
    tracing::info!("Starting monday-dashboards on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
