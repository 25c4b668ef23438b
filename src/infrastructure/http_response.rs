// HTTP response utilities for JSON view-models and error bodies
use crate::application::errors::{DashboardError, FetchError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remedy: Option<&'static str>,
}

/// Status code and body for an error raised while building a dashboard
pub fn error_parts(error: &DashboardError) -> (StatusCode, ErrorBody) {
    match error {
        DashboardError::UnknownDashboard(_) => (
            StatusCode::NOT_FOUND,
            ErrorBody {
                error: "unknown_dashboard",
                message: error.to_string(),
                remedy: None,
            },
        ),
        DashboardError::UnknownDimension { .. } => (
            StatusCode::BAD_REQUEST,
            ErrorBody {
                error: "unknown_dimension",
                message: error.to_string(),
                remedy: None,
            },
        ),
        DashboardError::Fetch(fetch) => {
            let status = match fetch {
                FetchError::TransientNetwork { .. } => StatusCode::SERVICE_UNAVAILABLE,
                FetchError::Auth(_) | FetchError::BoardNotFound { .. } | FetchError::InvalidResponse(_) => {
                    StatusCode::BAD_GATEWAY
                }
            };
            (
                status,
                ErrorBody {
                    error: fetch.kind(),
                    message: fetch.to_string(),
                    remedy: Some(fetch.remedy()),
                },
            )
        }
    }
}

pub fn error_response(error: &DashboardError) -> Response {
    let (status, body) = error_parts(error);
    (status, Json(body)).into_response()
}

pub fn json_response<T: Serialize>(value: T) -> Response {
    (StatusCode::OK, Json(value)).into_response()
}
