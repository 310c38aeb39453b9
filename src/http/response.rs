//! Error responses.
//!
//! Every failure leaves the service as `{"error": {"message", "status"}}`.
//! Rate-limited responses also carry `Retry-After` in whole seconds.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::navigation::NavError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    message: String,
    status: u16,
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            message: message.into(),
            status: status.as_u16(),
        },
    };
    (status, Json(body)).into_response()
}

/// Give error responses built outside the handlers (body limit, timeout,
/// method mismatch) the same JSON shape. JSON responses pass through.
pub async fn shape_layer_errors(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) || is_json(&response) {
        return response;
    }
    error_response(status, status.canonical_reason().unwrap_or("Request failed"))
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

impl IntoResponse for NavError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match &self {
            NavError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                // Collaborator details stay in the log.
                return error_response(status, "Internal server error.");
            }
            NavError::Upstream(detail) => tracing::warn!(error = %detail, "Upstream failure"),
            _ => {}
        }

        let mut response = error_response(status, self.to_string());
        if let NavError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}
