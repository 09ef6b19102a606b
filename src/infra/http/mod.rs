//! HTTP surface: `GET /search` and `GET /health`.

mod middleware;
mod search;

use std::sync::Arc;

use axum::{Json, Router, middleware as axum_middleware, routing::get};
use serde_json::{Value, json};

use crate::application::search::SearchService;

use middleware::{cors, log_responses, set_request_context};

pub use search::SearchParams;

#[derive(Clone)]
pub struct HttpState {
    pub search: Arc<SearchService>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/search", get(search::search))
        .route("/health", get(health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(cors))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
