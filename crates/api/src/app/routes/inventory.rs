use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockroom_core::{OrderId, OrderLineId, ReturnLineId};
use stockroom_inventory::QueueSource;

use crate::app::routes::reconciliation;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/scan-lookup", get(scan_lookup))
        .route("/pending-queue/:source", get(pending_queue))
        .route("/balance/:code", get(balance))
        .route("/transactions", get(transactions))
        .route("/quick-inward", post(quick_inward))
        .route("/adjust", post(adjust))
        .route("/return-receive", post(return_receive))
        .route("/rto-inward-line", post(rto_inward_line))
        .route("/rto/:order_id", get(rto_order))
        .nest("/reconciliation", reconciliation::router())
}

pub async fn scan_lookup(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ScanQuery>,
) -> axum::response::Response {
    match services.inventory.scan.resolve(&query.code).await {
        Ok(lookup) => Json(lookup).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn pending_queue(
    Extension(services): Extension<Arc<AppServices>>,
    Path(source): Path<String>,
    Query(query): Query<dto::LimitQuery>,
) -> axum::response::Response {
    let source = match source.parse::<QueueSource>() {
        Ok(s) => s,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let limit = dto::clamp_limit(query.limit, dto::DEFAULT_QUEUE_LIMIT);

    match services.inventory.scan.pending(source, Some(limit)).await {
        Ok(items) => Json(serde_json::json!({
            "source": source,
            "items": items,
        }))
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn balance(
    Extension(services): Extension<Arc<AppServices>>,
    Path(code): Path<String>,
) -> axum::response::Response {
    match services.inventory.stock.balance(&code).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::TransactionsQuery>,
) -> axum::response::Response {
    let limit = dto::clamp_limit(query.limit, dto::DEFAULT_HISTORY_LIMIT);
    let sku = query.sku.as_deref().map(str::trim).filter(|s| !s.is_empty());

    match services.inventory.stock.transactions(sku, limit).await {
        Ok(txns) => Json(txns).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn quick_inward(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::QuickInwardRequest>,
) -> axum::response::Response {
    match services
        .inventory
        .inward
        .production_inward(&body.sku_code, body.qty, body.notes, actor.actor())
        .await
    {
        Ok(result) => (StatusCode::CREATED, Json(result)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn adjust(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::AdjustRequest>,
) -> axum::response::Response {
    match services
        .inventory
        .inward
        .adjust(&body.sku_code, body.delta, &body.reason, actor.actor())
        .await
    {
        Ok(txn) => (StatusCode::CREATED, Json(txn)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn return_receive(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::ReturnReceiveRequest>,
) -> axum::response::Response {
    let line_id = match dto::parse_id::<ReturnLineId>(&body.line_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .inventory
        .inward
        .receive_return(line_id, body.condition, body.notes)
        .await
    {
        Ok(receipt) => Json(receipt).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn rto_inward_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::RtoInwardLineRequest>,
) -> axum::response::Response {
    let line_id = match dto::parse_id::<OrderLineId>(&body.line_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .inventory
        .inward
        .receive_rto_line(line_id, body.condition, body.notes, actor.actor())
        .await
    {
        Ok(receipt) => Json(receipt).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn rto_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(order_id): Path<String>,
) -> axum::response::Response {
    let order_id = match dto::parse_id::<OrderId>(&order_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.inventory.inward.rto_order(order_id) {
        Ok(order) => Json(serde_json::json!({
            "progress": order.progress(),
            "order": order,
        }))
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
