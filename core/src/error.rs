use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;
use utoipa::ToSchema;

/// JSON-RPC error codes. Part of the wire contract: never reassign or reuse.
pub mod codes {
    pub const UNAUTHORIZED: i64 = -32600;
    pub const VALIDATION_FAILED: i64 = -32602;
    pub const RESOURCE_NOT_FOUND: i64 = -32002;
    pub const INVALID_OPERATION: i64 = -32003;
    pub const DATABASE_ERROR: i64 = -32004;
}

/// Generic wire message for storage failures. The real cause is only logged.
pub const DATABASE_ERROR_MESSAGE: &str = "A storage error occurred";

/// Violations collected by the validator, keyed by field name.
///
/// Keys are kept sorted so that validating identical input always yields an
/// identical value, regardless of hash seeds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ValidationFailure(BTreeMap<String, Vec<String>>);

impl ValidationFailure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one violated-constraint message under `field`.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn to_value(&self) -> Value {
        json!(self.0)
    }
}

/// Identifier of a referenced entity, echoed back with its original JSON type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceId {
    Int(i64),
    Text(String),
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Int(id) => write!(f, "{id}"),
            ResourceId::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for ResourceId {
    fn from(id: i64) -> Self {
        ResourceId::Int(id)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        ResourceId::Text(id.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        ResourceId::Text(id)
    }
}

/// Every failure exit of the gateway. Nothing else reaches the wire.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum McpError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Validation failed")]
    ValidationFailed(ValidationFailure),

    #[error("Resource not found: {resource_type} with ID {identifier}")]
    ResourceNotFound {
        resource_type: String,
        identifier: ResourceId,
    },

    #[error("{message}")]
    InvalidOperation {
        message: String,
        data: Option<Map<String, Value>>,
    },

    /// `cause` is for logs only and is never rendered into the envelope.
    #[error("{message}")]
    DatabaseError {
        message: String,
        cause: Option<String>,
    },
}

impl McpError {
    pub fn validation(failure: ValidationFailure) -> Self {
        McpError::ValidationFailed(failure)
    }

    /// Shorthand for a single-field validation failure.
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        let mut failure = ValidationFailure::new();
        failure.push(field, message);
        McpError::ValidationFailed(failure)
    }

    pub fn not_found(resource_type: impl Into<String>, identifier: impl Into<ResourceId>) -> Self {
        McpError::ResourceNotFound {
            resource_type: resource_type.into(),
            identifier: identifier.into(),
        }
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        McpError::InvalidOperation {
            message: message.into(),
            data: None,
        }
    }

    pub fn invalid_operation_with(message: impl Into<String>, data: Map<String, Value>) -> Self {
        McpError::InvalidOperation {
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn unknown_tool(name: &str) -> Self {
        Self::invalid_operation(format!("unknown tool: {name}"))
    }

    pub fn database(cause: impl fmt::Display) -> Self {
        McpError::DatabaseError {
            message: DATABASE_ERROR_MESSAGE.to_string(),
            cause: Some(cause.to_string()),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            McpError::Unauthorized => codes::UNAUTHORIZED,
            McpError::ValidationFailed(_) => codes::VALIDATION_FAILED,
            McpError::ResourceNotFound { .. } => codes::RESOURCE_NOT_FOUND,
            McpError::InvalidOperation { .. } => codes::INVALID_OPERATION,
            McpError::DatabaseError { .. } => codes::DATABASE_ERROR,
        }
    }

    /// Stable snake_case label, used for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            McpError::Unauthorized => "unauthorized",
            McpError::ValidationFailed(_) => "validation_failed",
            McpError::ResourceNotFound { .. } => "resource_not_found",
            McpError::InvalidOperation { .. } => "invalid_operation",
            McpError::DatabaseError { .. } => "database_error",
        }
    }

    pub fn internal_cause(&self) -> Option<&str> {
        match self {
            McpError::DatabaseError { cause, .. } => cause.as_deref(),
            _ => None,
        }
    }

    pub fn to_envelope(&self) -> ErrorObject {
        let data = match self {
            McpError::Unauthorized | McpError::DatabaseError { .. } => None,
            McpError::ValidationFailed(failure) => Some(json!({ "errors": failure.to_value() })),
            McpError::ResourceNotFound {
                resource_type,
                identifier,
            } => Some(json!({
                "resource_type": resource_type,
                "identifier": identifier,
            })),
            McpError::InvalidOperation { data, .. } => data
                .as_ref()
                .filter(|data| !data.is_empty())
                .map(|data| Value::Object(data.clone())),
        };

        ErrorObject {
            code: self.code(),
            message: self.to_string(),
            data,
        }
    }
}

/// The `error` member of a JSON-RPC failure envelope.
///
/// `data` serializes as `null` when absent; it is never an empty object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorObject {
    /// Numeric code from the fixed taxonomy
    pub code: i64,
    /// Human-readable description
    pub message: String,
    /// Machine-readable detail, or null
    pub data: Option<Value>,
}
