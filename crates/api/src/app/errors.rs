use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use stockroom_core::DomainError;
use stockroom_infra::{ServiceError, StoreError};

/// The single place service failures become HTTP responses.
pub fn service_error_to_response(err: ServiceError) -> Response {
    match err {
        ServiceError::Domain(e) => domain_error_to_response(e),
        ServiceError::UploadFormat(e) => {
            let message = e.to_string();
            match e.diagnostics() {
                Some(diagnostics) => (
                    StatusCode::BAD_REQUEST,
                    axum::Json(json!({
                        "error": "upload_format",
                        "message": message,
                        "diagnostics": diagnostics,
                    })),
                )
                    .into_response(),
                None => json_error(StatusCode::BAD_REQUEST, "upload_format", message),
            }
        }
        ServiceError::Store(StoreError::Rejected(e)) => domain_error_to_response(e),
        ServiceError::Store(e) => {
            tracing::warn!(error = %e, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::SelectionRequired(msg) => {
            json_error(StatusCode::BAD_REQUEST, "selection_required", msg)
        }
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DomainError::NotFound(what) => json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found")),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
