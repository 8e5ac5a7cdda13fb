use serde_json::json;

use crate::util::{exit_error, resolve_token, rpc_request};

pub async fn run(api_url: &str, api_key: Option<&str>) -> i32 {
    let token = resolve_token(api_key).unwrap_or_else(|e| exit_error(&e, None));
    rpc_request(api_url, &token, "tools/list", json!({})).await
}
