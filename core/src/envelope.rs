use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::error::{ErrorObject, McpError, ValidationFailure};

pub const JSONRPC_VERSION: &str = "2.0";

/// Wire shape of an incoming call, as documented in the OpenAPI description.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RpcRequest {
    /// Must be "2.0"
    pub jsonrpc: String,
    /// Tool name (e.g. "create_task") or protocol method ("tools/list")
    pub method: String,
    /// Echoed verbatim in the response; string, number or null
    #[schema(value_type = Object)]
    pub id: Option<Value>,
    /// Tool parameters
    #[schema(value_type = Object)]
    pub params: Option<Value>,
}

/// A parsed request. Immutable for the lifetime of the request.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub method: String,
    pub id: Value,
    pub params: Map<String, Value>,
}

/// A body that could not become a `ToolCall`, with whatever id was recoverable.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedCall {
    pub id: Value,
    pub error: McpError,
}

impl ToolCall {
    pub fn new(method: impl Into<String>, id: Value, params: Map<String, Value>) -> Self {
        Self {
            method: method.into(),
            id,
            params,
        }
    }

    pub fn parse(body: &[u8]) -> Result<Self, RejectedCall> {
        match serde_json::from_slice::<Value>(body) {
            Ok(value) => Self::from_value(value),
            Err(_) => Err(RejectedCall {
                id: Value::Null,
                error: McpError::invalid_field("body", "The request body must be a valid JSON object."),
            }),
        }
    }

    /// Check the envelope members, reporting every malformed one together.
    pub fn from_value(value: Value) -> Result<Self, RejectedCall> {
        let Value::Object(mut body) = value else {
            return Err(RejectedCall {
                id: Value::Null,
                error: McpError::invalid_field("body", "The request body must be a JSON object."),
            });
        };

        let mut failure = ValidationFailure::new();

        let id = match body.remove("id") {
            None => Value::Null,
            Some(id @ (Value::Null | Value::String(_) | Value::Number(_))) => id,
            Some(_) => {
                failure.push("id", "The id field must be a string, a number or null.");
                Value::Null
            }
        };

        match body.get("jsonrpc") {
            Some(Value::String(version)) if version == JSONRPC_VERSION => {}
            _ => failure.push("jsonrpc", format!("The jsonrpc field must be \"{JSONRPC_VERSION}\".")),
        }

        let method = match body.remove("method") {
            Some(Value::String(method)) if !method.trim().is_empty() => method,
            Some(Value::String(_)) | None => {
                failure.push("method", "The method field is required.");
                String::new()
            }
            Some(_) => {
                failure.push("method", "The method field must be a string.");
                String::new()
            }
        };

        let params = match body.remove("params") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(params)) => params,
            Some(_) => {
                failure.push("params", "The params field must be an object.");
                Map::new()
            }
        };

        if failure.is_empty() {
            Ok(Self { method, id, params })
        } else {
            Err(RejectedCall {
                id,
                error: McpError::validation(failure),
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SuccessEnvelope {
    pub jsonrpc: String,
    #[schema(value_type = Object)]
    pub result: Value,
    #[schema(value_type = Object)]
    pub id: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorEnvelope {
    pub jsonrpc: String,
    pub error: ErrorObject,
    #[schema(value_type = Object)]
    pub id: Value,
}

/// Transport-level rejection (401/503): no `jsonrpc` or `id` guarantee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TransportErrorEnvelope {
    pub error: ErrorObject,
}

pub fn success(id: Value, result: Value) -> SuccessEnvelope {
    SuccessEnvelope {
        jsonrpc: JSONRPC_VERSION.to_string(),
        result,
        id,
    }
}

pub fn failure(id: Value, err: &McpError) -> ErrorEnvelope {
    ErrorEnvelope {
        jsonrpc: JSONRPC_VERSION.to_string(),
        error: err.to_envelope(),
        id,
    }
}

pub fn transport_failure(err: &McpError) -> TransportErrorEnvelope {
    TransportErrorEnvelope {
        error: err.to_envelope(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::codes;
    use serde_json::json;

    #[test]
    fn parses_well_formed_call() {
        let call = ToolCall::parse(
            br#"{"jsonrpc":"2.0","method":"create_task","id":1,"params":{"title":"Draft invoice"}}"#,
        )
        .expect("valid call");
        assert_eq!(call.method, "create_task");
        assert_eq!(call.id, json!(1));
        assert_eq!(call.params["title"], json!("Draft invoice"));
    }

    #[test]
    fn missing_id_and_params_default_to_null_and_empty() {
        let call = ToolCall::from_value(json!({"jsonrpc": "2.0", "method": "ping"})).unwrap();
        assert_eq!(call.id, Value::Null);
        assert!(call.params.is_empty());
    }

    #[test]
    fn malformed_json_has_null_id() {
        let rejected = ToolCall::parse(b"{not json").unwrap_err();
        assert_eq!(rejected.id, Value::Null);
        assert_eq!(rejected.error.code(), codes::VALIDATION_FAILED);
    }

    #[test]
    fn envelope_violations_are_reported_together_and_id_recovered() {
        let rejected = ToolCall::from_value(json!({
            "jsonrpc": "1.0",
            "id": "abc",
            "params": [1, 2],
        }))
        .unwrap_err();
        assert_eq!(rejected.id, json!("abc"));
        let McpError::ValidationFailed(failure) = rejected.error else {
            panic!("expected validation failure");
        };
        let fields: Vec<&str> = failure.fields().collect();
        assert_eq!(fields, vec!["jsonrpc", "method", "params"]);
    }

    #[test]
    fn success_and_failure_envelopes_echo_id() {
        let ok = serde_json::to_value(success(json!("req-7"), json!({"id": 3}))).unwrap();
        assert_eq!(ok, json!({"jsonrpc": "2.0", "result": {"id": 3}, "id": "req-7"}));

        let err = serde_json::to_value(failure(Value::Null, &McpError::not_found("task", 9))).unwrap();
        assert_eq!(err["jsonrpc"], json!("2.0"));
        assert_eq!(err["id"], Value::Null);
        assert_eq!(err["error"]["code"], json!(-32002));
    }

    #[test]
    fn transport_failure_is_abbreviated() {
        let value = serde_json::to_value(transport_failure(&McpError::Unauthorized)).unwrap();
        assert_eq!(
            value,
            json!({"error": {"code": -32600, "message": "Unauthorized", "data": null}})
        );
    }
}
