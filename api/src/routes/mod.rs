use std::sync::Arc;

use axum::Router;

use crate::middleware::access_log::{AccessLogLayer, LogSink};
use crate::state::AppState;

pub mod health;
pub mod mcp_http;

/// Gateway routes with the access log wrapped around them.
pub fn router(state: AppState, sink: Arc<dyn LogSink>) -> Router {
    Router::new()
        .merge(health::router())
        .merge(mcp_http::router())
        .layer(AccessLogLayer::new(sink))
        .with_state(state)
}
