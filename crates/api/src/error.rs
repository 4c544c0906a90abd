//! Unified error handling for the analytics API.
//!
//! Every failure is returned as a single JSON error record:
//!
//! ```json
//! {"error": "Invalid interval: \"weekly\" (expected one of daily, monthly, quarterly, yearly)"}
//! ```

use std::time::Duration;

use axum::{
    Json,
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::analytics::PipelineError;
use crate::db::AggregateError;

/// Application-level error type for the analytics API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Computing a metric failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The pipeline did not finish within the request timeout.
    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The request itself could not be read (e.g., a malformed query string).
    #[error("{0}")]
    BadRequest(String),
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// JSON body of an error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Pipeline(PipelineError::InvalidInterval(_)) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Pipeline(PipelineError::Aggregate(AggregateError::Coercion(_))) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                status = status.as_u16(),
                sentry_event_id = %event_id,
                "Analytics request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Analytics request rejected");
        }

        // Messages are passed through verbatim, store errors included
        let body = ErrorBody {
            error: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
