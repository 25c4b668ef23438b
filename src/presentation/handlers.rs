// HTTP request handlers
use crate::application::dashboard_service::ReportQuery;
use crate::infrastructure::http_response::{error_response, json_response};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use std::sync::Arc;

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// List configured dashboards
pub async fn list_dashboards(State(state): State<Arc<AppState>>) -> Response {
    json_response(state.dashboard_service.list_dashboards())
}

/// Build a dashboard report for the selected year, dimension and granularity
pub async fn get_dashboard(
    Path(id): Path<String>,
    Query(query): Query<ReportQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.dashboard_service.report(&id, &query).await {
        Ok(report) => json_response(report),
        Err(e) => {
            tracing::error!(dashboard = %id, "Error building dashboard: {}", e);
            error_response(&e)
        }
    }
}

/// Drop cached board data and rebuild the report
pub async fn refresh_dashboard(
    Path(id): Path<String>,
    Query(query): Query<ReportQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.dashboard_service.refresh(&id, &query).await {
        Ok(report) => json_response(report),
        Err(e) => {
            tracing::error!(dashboard = %id, "Error refreshing dashboard: {}", e);
            error_response(&e)
        }
    }
}
