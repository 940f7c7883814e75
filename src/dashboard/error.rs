//! Dashboard errors with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::period::PeriodError;
use crate::portal::PortalError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("A run is already in progress")]
    RunInProgress,
    #[error("Portal login failed: {0}")]
    PortalLogin(String),
    #[error("Browser unavailable: {0}")]
    BrowserUnavailable(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            DashboardError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone())
            }
            DashboardError::RunInProgress => (
                StatusCode::CONFLICT,
                "RUN_IN_PROGRESS",
                "A retrieval run is already in progress, try again when it finishes".to_string(),
            ),
            DashboardError::PortalLogin(detail) => {
                (StatusCode::BAD_GATEWAY, "PORTAL_LOGIN_FAILED", detail.clone())
            }
            DashboardError::BrowserUnavailable(detail) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "BROWSER_UNAVAILABLE",
                detail.clone(),
            ),
            DashboardError::Internal(detail) => {
                tracing::error!(detail, "dashboard internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorBody {
                error: ErrorDetail { code, message },
            }),
        )
            .into_response()
    }
}

impl From<PortalError> for DashboardError {
    fn from(err: PortalError) -> Self {
        match err {
            PortalError::Authentication(detail) => DashboardError::PortalLogin(detail),
            PortalError::Driver(e) => DashboardError::BrowserUnavailable(e.to_string()),
            other => DashboardError::Internal(other.to_string()),
        }
    }
}

impl From<PeriodError> for DashboardError {
    fn from(err: PeriodError) -> Self {
        DashboardError::BadRequest(err.to_string())
    }
}
