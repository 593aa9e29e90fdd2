use axum::{Router, routing::get};

pub mod inventory;
pub mod reconciliation;
pub mod repacking;
pub mod system;

/// Router for every endpoint except `/health`.
pub fn router() -> Router {
    Router::new()
        .route("/stream", get(system::stream))
        .nest("/inventory", inventory::router())
        .nest("/repacking", repacking::router())
}
