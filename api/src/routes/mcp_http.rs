use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use bureau_core::McpError;
use bureau_core::envelope::{self, ToolCall};
use bureau_mcp_runtime::Session;

use crate::auth;
use crate::middleware::access_log::CallLogContext;
use crate::state::AppState;

pub const MCP_PATH: &str = "/mcp";
pub const SESSION_HEADER: HeaderName = HeaderName::from_static("mcp-session-id");

pub fn router() -> Router<AppState> {
    Router::new().route(MCP_PATH, post(mcp_post).get(mcp_get).delete(mcp_delete))
}

async fn mcp_get() -> Response {
    StatusCode::METHOD_NOT_ALLOWED.into_response()
}

/// Invoke a tool or protocol method
///
/// Every JSON-RPC outcome, including failures, is answered with HTTP 200.
#[utoipa::path(
    post,
    path = "/mcp",
    request_body = bureau_core::envelope::RpcRequest,
    responses(
        (status = 200, description = "Call completed or failed at the JSON-RPC level", body = bureau_core::envelope::SuccessEnvelope),
        (status = 401, description = "Missing or invalid credential", body = bureau_core::envelope::TransportErrorEnvelope),
        (status = 503, description = "No API key configured", body = bureau_core::envelope::TransportErrorEnvelope)
    ),
    security(("bearer_auth" = [])),
    tag = "mcp"
)]
pub async fn mcp_post(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let caller = match auth::authenticate(&headers, state.gateway.config()) {
        Ok(caller) => caller,
        Err(rejection) => return rejection.into_response(),
    };

    let call = match ToolCall::parse(&body) {
        Ok(call) => call,
        Err(rejected) => {
            tracing::debug!(kind = rejected.error.kind(), "mcp request envelope rejected");
            let response = Json(envelope::failure(rejected.id.clone(), &rejected.error));
            return with_context(response.into_response(), None, rejected.id);
        }
    };

    let session = state
        .gateway
        .sessions()
        .map(|sessions| sessions.touch(&caller.key));

    let outcome = state.gateway.execute(&call, session.as_ref()).await;
    let response = match outcome {
        Ok(result) => Json(envelope::success(call.id.clone(), result)).into_response(),
        Err(err) => {
            log_failure(&call, &err);
            Json(envelope::failure(call.id.clone(), &err)).into_response()
        }
    };

    let response = with_session(response, session.as_ref());
    with_context(response, Some(call.method), call.id)
}

/// Terminate the caller's session
#[utoipa::path(
    delete,
    path = "/mcp",
    responses(
        (status = 204, description = "Session terminated"),
        (status = 401, description = "Missing or invalid credential", body = bureau_core::envelope::TransportErrorEnvelope),
        (status = 404, description = "No active session, or sessions are disabled")
    ),
    security(("bearer_auth" = [])),
    tag = "mcp"
)]
pub async fn mcp_delete(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let caller = match auth::authenticate(&headers, state.gateway.config()) {
        Ok(caller) => caller,
        Err(rejection) => return rejection.into_response(),
    };

    let terminated = state
        .gateway
        .sessions()
        .is_some_and(|sessions| sessions.terminate(&caller.key));

    let status = if terminated {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    };
    with_context(status.into_response(), Some("session/terminate".to_string()), serde_json::Value::Null)
}

fn log_failure(call: &ToolCall, err: &McpError) {
    match err.internal_cause() {
        Some(cause) => tracing::error!(
            event = "mcp_call_failed",
            method = %call.method,
            code = err.code(),
            cause,
            "mcp call failed"
        ),
        None => tracing::debug!(
            event = "mcp_call_rejected",
            method = %call.method,
            kind = err.kind(),
            "mcp call rejected"
        ),
    }
}

fn with_session(mut response: Response, session: Option<&Session>) -> Response {
    if let Some(session) = session {
        if let Ok(value) = HeaderValue::from_str(&session.id) {
            response.headers_mut().insert(SESSION_HEADER, value);
        }
    }
    response
}

fn with_context(mut response: Response, method: Option<String>, id: serde_json::Value) -> Response {
    response
        .extensions_mut()
        .insert(CallLogContext { method, id });
    response
}
