use std::any::Any;
use std::panic::AssertUnwindSafe;

use bureau_core::McpError;
use bureau_core::store::Store;
use bureau_core::validate::ValidatedParams;
use futures::FutureExt;
use serde_json::Value;

use crate::registry::ToolEntry;

/// Invoke a tool handler with already-validated params.
///
/// Handler errors pass through unchanged. A panicking handler is contained
/// and reported as a `DatabaseError`; its message only reaches the logs.
pub async fn dispatch(
    entry: &ToolEntry,
    store: &dyn Store,
    params: ValidatedParams,
) -> Result<Value, McpError> {
    let outcome = AssertUnwindSafe(entry.handler.call(store, params))
        .catch_unwind()
        .await;

    let result = match outcome {
        Ok(result) => result,
        Err(payload) => Err(McpError::database(format!(
            "handler panicked: {}",
            panic_message(payload.as_ref())
        ))),
    };

    if let Err(err) = &result {
        match err.internal_cause() {
            Some(cause) => tracing::error!(tool = entry.name, cause, "tool failed"),
            None => tracing::debug!(tool = entry.name, kind = err.kind(), "tool rejected call"),
        }
    }
    result
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolHandler;
    use async_trait::async_trait;
    use bureau_core::error::{DATABASE_ERROR_MESSAGE, codes};
    use bureau_core::schema::ToolSchema;
    use bureau_core::store::MemoryStore;
    use serde_json::json;

    struct Panics;

    #[async_trait]
    impl ToolHandler for Panics {
        async fn call(&self, _: &dyn Store, _: ValidatedParams) -> Result<Value, McpError> {
            panic!("boom");
        }
    }

    struct Refuses;

    #[async_trait]
    impl ToolHandler for Refuses {
        async fn call(&self, _: &dyn Store, _: ValidatedParams) -> Result<Value, McpError> {
            Err(McpError::invalid_operation("nope"))
        }
    }

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn call(&self, _: &dyn Store, params: ValidatedParams) -> Result<Value, McpError> {
            Ok(Value::Object(params.into_map()))
        }
    }

    fn entry(handler: impl ToolHandler + 'static) -> ToolEntry {
        ToolEntry::new("test_tool", "test", ToolSchema::default(), handler)
    }

    #[tokio::test]
    async fn panics_become_database_errors_without_leaking_detail() {
        let err = dispatch(&entry(Panics), &MemoryStore::new(), ValidatedParams::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::DATABASE_ERROR);
        assert_eq!(err.to_string(), DATABASE_ERROR_MESSAGE);
        assert_eq!(err.internal_cause(), Some("handler panicked: boom"));
        assert!(!serde_json::to_string(&err.to_envelope()).unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn handler_errors_are_relayed_unchanged() {
        let err = dispatch(&entry(Refuses), &MemoryStore::new(), ValidatedParams::default())
            .await
            .unwrap_err();
        assert_eq!(err, McpError::invalid_operation("nope"));
    }

    #[tokio::test]
    async fn successful_results_pass_through() {
        let mut map = serde_json::Map::new();
        map.insert("a".into(), json!(1));
        let value = dispatch(&entry(Echo), &MemoryStore::new(), ValidatedParams::from_map(map))
            .await
            .unwrap();
        assert_eq!(value, json!({"a": 1}));
    }
}
