use serde_json::{Map, Value, json};

use crate::util::{exit_error, resolve_token, rpc_request};

pub async fn run(api_url: &str, api_key: Option<&str>, tool: &str, params: &str) -> i32 {
    let arguments = parse_params(params).unwrap_or_else(|e| {
        exit_error(&e, Some("Pass --params as a JSON object, e.g. '{\"title\":\"x\"}'"))
    });
    let token = resolve_token(api_key).unwrap_or_else(|e| exit_error(&e, None));

    rpc_request(
        api_url,
        &token,
        "tools/call",
        json!({ "name": tool, "arguments": arguments }),
    )
    .await
}

fn parse_params(raw: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("--params must be a JSON object".to_string()),
        Err(e) => Err(format!("Invalid JSON in --params: {e}")),
    }
}
