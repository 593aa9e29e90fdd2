use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    response::IntoResponse,
    routing::post,
};

use stockroom_core::RepackingItemId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new().route("/process", post(process))
}

pub async fn process(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::RepackingProcessRequest>,
) -> axum::response::Response {
    let item_id = match dto::parse_id::<RepackingItemId>(&body.item_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .inventory
        .inward
        .process_repacking(item_id, body.decision, body.write_off_reason, body.notes, actor.actor())
        .await
    {
        Ok(result) => Json(result).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
