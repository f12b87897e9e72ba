//! HTTP error responses

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mediastore_common::Error;
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

/// Error returned by every handler
#[derive(Debug)]
pub enum ApiError {
    /// Failure from the storage pipelines
    Media(Error),
    /// Malformed request parameter
    BadRequest(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Media(err)
    }
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub request_id: String,
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Media(e) => StatusCode::from_u16(e.http_status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Media(e) => e.error_code(),
            Self::BadRequest(_) => "InvalidRequest",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let request_id = Uuid::new_v4().to_string();
        let message = match &self {
            Self::Media(e) => e.to_string(),
            Self::BadRequest(msg) => msg.clone(),
        };

        if status.is_server_error() {
            error!("Request {} failed: {}", request_id, message);
        }

        let body = ErrorBody {
            code: self.code().to_string(),
            message,
            request_id,
        };
        (status, Json(body)).into_response()
    }
}
