//! Error types for the pdfforge API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pdfforge_core::AssembleError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Assemble(#[from] AssembleError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            ApiError::Assemble(e) => {
                let kind = e.kind();
                let status = if kind.is_client_error() {
                    StatusCode::BAD_REQUEST
                } else {
                    tracing::error!("Assembly failed: {}", e);
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, kind.as_str(), e.to_string())
            }
            ApiError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            ApiError::ArtifactNotFound(id) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("No artifact for job {}", id),
            ),
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Internal error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": kind,
            "message": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
