use axum::{http::HeaderMap, middleware::Next, response::Response};

use crate::context::ActorContext;

pub const ACTOR_HEADER: &str = "x-actor";

/// Attach an [`ActorContext`] to every request.
pub async fn actor_middleware(mut req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let actor = extract_actor(req.headers());
    req.extensions_mut().insert(ActorContext::new(actor));
    next.run(req).await
}

fn extract_actor(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
