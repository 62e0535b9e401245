use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use picker_core::error::codes;
use serde::Serialize;

/// Internal error type that converts to structured webhook responses.
/// The platform mostly cares about the status code; the body is for logs
/// and manual debugging.
#[derive(Debug)]
pub enum AppError {
    /// Malformed or unacceptable input (400)
    Validation { message: String },
    /// Optimistic concurrency rejection (409)
    Conflict { message: String },
    /// Missing bookmark/message that cannot be lazily created (404)
    NotFound { message: String },
    /// Platform API call failed (502)
    External { context: String },
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Validation { message } => {
                (StatusCode::BAD_REQUEST, codes::VALIDATION_FAILED, message)
            }
            AppError::Conflict { message } => (StatusCode::CONFLICT, codes::CONFLICT, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, codes::NOT_FOUND, message),
            AppError::External { context } => {
                tracing::error!("platform call failed: {}", context);
                (
                    StatusCode::BAD_GATEWAY,
                    codes::EXTERNAL_CALL_FAILED,
                    "A platform API call failed".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: code, message })).into_response()
    }
}

impl From<picker_core::Error> for AppError {
    fn from(err: picker_core::Error) -> Self {
        match err {
            picker_core::Error::Validation(message) => AppError::Validation { message },
            picker_core::Error::Conflict { .. } => AppError::Conflict {
                message: "Data has been modified by another user".to_string(),
            },
            picker_core::Error::NotFound(what) => AppError::NotFound {
                message: format!("{what} not found"),
            },
            picker_core::Error::External { context } => AppError::External { context },
            picker_core::Error::SessionEnded => AppError::Conflict {
                message: "The vote has already ended".to_string(),
            },
        }
    }
}

/// Field-level rejection of a modal submission. The platform expects status
/// 200 with a `response_action: errors` body; anything else closes the modal
/// without showing the message.
pub fn view_errors(field_block: &str, message: &str) -> Response {
    Json(serde_json::json!({
        "response_action": "errors",
        "errors": { field_block: message },
    }))
    .into_response()
}
