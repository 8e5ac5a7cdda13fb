use serde_json::{Value, json};

pub fn client() -> reqwest::Client {
    reqwest::Client::new()
}

fn print_json(value: &Value, to_stderr: bool) {
    let formatted = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    if to_stderr {
        eprintln!("{formatted}");
    } else {
        println!("{formatted}");
    }
}

pub fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    let mut err = json!({
        "error": "cli_error",
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    print_json(&err, true);
    std::process::exit(1);
}

/// Resolve the gateway credential: `--api-key` flag first, then `BUREAU_API_KEY`.
pub fn resolve_token(flag: Option<&str>) -> Result<String, String> {
    if let Some(key) = flag.map(str::trim).filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }
    match std::env::var("BUREAU_API_KEY") {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err("No credentials found. Pass --api-key or set BUREAU_API_KEY.".to_string()),
    }
}

/// Exit codes: 0=success, 1=client error (4xx or a JSON-RPC error envelope),
///             2=server error (5xx), 3=connection error
pub fn exit_code_for(status: u16, body: &Value) -> i32 {
    match status {
        200..=299 if body.get("error").is_some_and(|e| !e.is_null()) => 1,
        200..=299 => 0,
        400..=499 => 1,
        _ => 2,
    }
}

/// Execute a request, print the response, and return a structured exit code.
pub async fn api_request(
    api_url: &str,
    method: reqwest::Method,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> i32 {
    let mut req = client().request(method, format!("{api_url}{path}"));

    if let Some(t) = token {
        req = req.header("Authorization", format!("Bearer {t}"));
    }
    if let Some(b) = body {
        req = req.json(&b);
    }

    let resp = match req.send().await {
        Ok(r) => r,
        Err(e) => {
            let err = json!({
                "error": "connection_error",
                "message": format!("{e}"),
                "docs_hint": "Is the gateway running? Check BUREAU_API_URL."
            });
            print_json(&err, true);
            return 3;
        }
    };

    let status = resp.status().as_u16();
    let resp_body: Value = match resp.json().await {
        Ok(v) => v,
        Err(e) => json!({"raw_error": format!("Failed to parse response as JSON: {e}")}),
    };

    let exit_code = exit_code_for(status, &resp_body);
    print_json(&resp_body, exit_code != 0);
    exit_code
}

/// Send one JSON-RPC call to `/mcp`.
pub async fn rpc_request(api_url: &str, token: &str, method: &str, params: Value) -> i32 {
    let body = json!({
        "jsonrpc": "2.0",
        "id": uuid::Uuid::now_v7().to_string(),
        "method": method,
        "params": params,
    });
    api_request(api_url, reqwest::Method::POST, "/mcp", Some(token), Some(body)).await
}
