use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

use crate::{
    app_state::AppStateError,
    domain::{
        enrichment::{BatchError, WorkerError},
        search::SearchError,
    },
};

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<AppStateError> for ApiError {
    fn from(err: AppStateError) -> Self {
        Self::service_unavailable(err.to_string())
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::InvalidQuery(_) => Self::bad_request(err.to_string()),
            SearchError::IndexUnavailable(_) => {
                tracing::error!("Search index unavailable: {}", err);
                Self::service_unavailable("search index unavailable")
            }
            _ => {
                tracing::error!("Search failed: {:?}", err);
                Self::internal(err.to_string())
            }
        }
    }
}

impl From<BatchError> for ApiError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::Validation(message) => Self::bad_request(message),
        }
    }
}

impl From<WorkerError> for ApiError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::Invalid(e) => e.into(),
            WorkerError::QueueFull => Self::new(StatusCode::TOO_MANY_REQUESTS, err.to_string()),
            WorkerError::Closed => {
                tracing::error!("Enrichment worker is gone");
                Self::service_unavailable(err.to_string())
            }
        }
    }
}
