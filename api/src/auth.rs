use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use bureau_core::auth::{caller_key, credentials_match};
use bureau_mcp_runtime::GatewayConfig;

use crate::error::AppError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// An admitted caller. `key` is derived from the credential and is what
/// sessions are keyed by; the raw token is not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub key: String,
}

/// Admit or reject a request before its body is looked at.
pub fn authenticate(headers: &HeaderMap, config: &GatewayConfig) -> Result<Caller, AppError> {
    let Some(expected) = config.configured_key() else {
        return Err(AppError::NotConfigured);
    };

    let token = extract_token(headers).map_err(|description| {
        tracing::debug!(reason = description, "mcp call rejected");
        AppError::Unauthorized { description }
    })?;

    if !credentials_match(&token, expected) {
        tracing::info!(event = "mcp_auth_rejected", "mcp credential mismatch");
        return Err(AppError::Unauthorized {
            description: "Invalid access token",
        });
    }

    Ok(Caller {
        key: caller_key(&token),
    })
}

/// `Authorization: Bearer <token>` first, then `X-API-Key: <token>`.
///
/// An `Authorization` header with another scheme (e.g. `Basic` added by a
/// proxy) does not shadow `X-API-Key`.
fn extract_token(headers: &HeaderMap) -> Result<String, &'static str> {
    let mut rejection = "Missing access token";

    if let Some(raw) = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    {
        let mut parts = raw.splitn(2, ' ');
        let scheme = parts.next().unwrap_or_default();
        let token = parts.next().unwrap_or_default().trim();

        if scheme.eq_ignore_ascii_case("bearer") {
            if token.is_empty() {
                return Err("Missing access token");
            }
            return Ok(token.to_string());
        }
        rejection = "Invalid authorization scheme";
    }

    match headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
    {
        Some(token) if !token.is_empty() => Ok(token.to_string()),
        _ => Err(rejection),
    }
}
