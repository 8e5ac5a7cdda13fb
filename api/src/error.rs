use axum::Json;
use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bureau_core::McpError;
use bureau_core::envelope;

/// Transport-level rejections. These never carry a JSON-RPC `id` and are
/// answered with an HTTP error status instead of 200.
#[derive(Debug)]
pub enum AppError {
    /// Credential missing or wrong (401)
    Unauthorized { description: &'static str },
    /// No API key configured; every call is refused (503)
    NotConfigured,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Unauthorized { description } => {
                let challenge = format!(
                    "Bearer realm=\"bureau\", error=\"invalid_token\", error_description=\"{description}\""
                );
                let mut response = (
                    StatusCode::UNAUTHORIZED,
                    Json(envelope::transport_failure(&McpError::Unauthorized)),
                )
                    .into_response();
                if let Ok(value) = HeaderValue::from_str(&challenge) {
                    response.headers_mut().insert(WWW_AUTHENTICATE, value);
                }
                response
            }
            AppError::NotConfigured => {
                tracing::error!("rejecting MCP call: BUREAU_API_KEY is not configured");
                let err = McpError::invalid_operation("service is not configured");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(envelope::transport_failure(&err)),
                )
                    .into_response()
            }
        }
    }
}
