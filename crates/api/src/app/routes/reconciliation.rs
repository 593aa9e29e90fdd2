use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Multipart, Path},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};

use stockroom_core::ReconciliationId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub const UPLOAD_FIELD: &str = "file";

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_sessions))
        .route("/start", post(start_session))
        .route("/:id", get(get_session).put(update_session).delete(delete_session))
        .route("/:id/submit", post(submit_session))
        .route("/:id/upload-csv", post(upload_csv))
        .route("/:id/template", get(template))
}

pub async fn list_sessions(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.inventory.reconciliation.list() {
        Ok(sessions) => Json(sessions).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn start_session(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.inventory.reconciliation.start().await {
        Ok(outcome) => {
            let status = if outcome.created { StatusCode::CREATED } else { StatusCode::OK };
            (status, Json(outcome)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_session(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_id::<ReconciliationId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.inventory.reconciliation.get(id) {
        Ok(view) => Json(view).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_session(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateSessionRequest>,
) -> axum::response::Response {
    let id = match dto::parse_id::<ReconciliationId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .inventory
        .reconciliation
        .update(id, body.items, body.expected_version)
        .await
    {
        Ok(view) => Json(view).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_session(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_id::<ReconciliationId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.inventory.reconciliation.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn submit_session(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_id::<ReconciliationId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.inventory.reconciliation.submit(id, actor.actor()).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn upload_csv(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> axum::response::Response {
    let id = match dto::parse_id::<ReconciliationId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let bytes = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(UPLOAD_FIELD) => match field.bytes().await {
                Ok(b) => break b,
                Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_multipart", e.to_string()),
            },
            Ok(Some(_)) => continue,
            Ok(None) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "validation_error",
                    format!("multipart field '{UPLOAD_FIELD}' is required"),
                );
            }
            Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_multipart", e.to_string()),
        }
    };

    match services.inventory.reconciliation.upload_csv(id, &bytes).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn template(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_id::<ReconciliationId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.inventory.reconciliation.template(id) {
        Ok(csv) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"reconciliation-{id}.csv\""),
                ),
            ],
            csv,
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
