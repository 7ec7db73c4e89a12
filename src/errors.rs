use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;

use crate::middleware::sanitize::QueryViolation;
use crate::proxy::upstream::BackendError;
use crate::render;
use crate::store::StoreError;

/// Every way a request can fail. None of the variants carry the search
/// query, and the client only ever sees a generic page per status.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("token missing or malformed")]
    MalformedToken,

    #[error("access denied")]
    AccessDenied,

    #[error("invalid query: {0}")]
    MalformedQuery(#[from] QueryViolation),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("search backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("not found")]
    NotFound,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            // Malformed, unknown and expired tokens are indistinguishable to the client.
            AppError::MalformedToken | AppError::AccessDenied => StatusCode::UNAUTHORIZED,
            AppError::MalformedQuery(_) => StatusCode::BAD_REQUEST,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Backend(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (title, message) = match &self {
            AppError::MalformedToken | AppError::AccessDenied => {
                tracing::info!(kind = "access_denied", "request rejected");
                ("Unauthorized", "Invalid or expired token.")
            }
            AppError::MalformedQuery(violation) => {
                tracing::info!(kind = "malformed_query", reason = %violation, "request rejected");
                ("Bad request", "That search could not be processed.")
            }
            AppError::Storage(e) => {
                tracing::error!(kind = "storage_failure", "credential store error: {}", e);
                ("Server error", "Something went wrong. Please try again later.")
            }
            AppError::Backend(e) => {
                tracing::warn!(kind = "backend_failure", "search backend error: {}", e);
                ("Search unavailable", "The search service is unavailable. Please try again.")
            }
            AppError::NotFound => ("Not found", "Nothing here."),
        };

        (status, Html(render::error_page(title, message))).into_response()
    }
}
