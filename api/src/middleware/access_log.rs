use std::convert::Infallible;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tower::{Layer, Service, ServiceExt};

/// What the MCP route learned about the call, handed to the layer through
/// response extensions. Absent when the request was rejected before parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct CallLogContext {
    pub method: Option<String>,
    pub id: Value,
}

/// One line per MCP request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessRecord {
    pub method: Option<String>,
    pub id: Value,
    pub duration_ms: u64,
    pub http_status: u16,
}

#[derive(Debug, Error)]
#[error("log sink failed: {0}")]
pub struct SinkError(pub String);

/// Destination for access records.
pub trait LogSink: Send + Sync {
    fn record(&self, record: &AccessRecord) -> Result<(), SinkError>;
}

/// Default sink: a structured `tracing` event.
pub struct TracingSink;

impl LogSink for TracingSink {
    fn record(&self, record: &AccessRecord) -> Result<(), SinkError> {
        tracing::info!(
            event = "mcp_access",
            method = record.method.as_deref().unwrap_or("-"),
            id = %record.id,
            duration_ms = record.duration_ms,
            http_status = record.http_status,
            "mcp call handled"
        );
        Ok(())
    }
}

/// Tower Layer that emits exactly one `AccessRecord` per request to `/mcp`.
///
/// Sink failures are logged and swallowed; they never change the response.
#[derive(Clone)]
pub struct AccessLogLayer {
    sink: Arc<dyn LogSink>,
}

impl AccessLogLayer {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for AccessLogLayer {
    type Service = AccessLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessLogService {
            inner,
            sink: self.sink.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AccessLogService<S> {
    inner: S,
    sink: Arc<dyn LogSink>,
}

impl<S> Service<Request> for AccessLogService<S>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let not_ready = self.inner.clone();
        let ready = std::mem::replace(&mut self.inner, not_ready);
        let sink = self.sink.clone();

        Box::pin(async move {
            // Only the MCP endpoint is logged
            if req.uri().path() != crate::routes::mcp_http::MCP_PATH {
                return Ok(ready.oneshot(req).await.into_response());
            }

            let start = Instant::now();
            let response = ready.oneshot(req).await.into_response();

            let context = response.extensions().get::<CallLogContext>().cloned();
            let record = AccessRecord {
                method: context.as_ref().and_then(|c| c.method.clone()),
                id: context.map(|c| c.id).unwrap_or(Value::Null),
                duration_ms: start.elapsed().as_millis().min(u64::MAX as u128) as u64,
                http_status: response.status().as_u16(),
            };
            emit(sink.as_ref(), &record);

            Ok(response)
        })
    }
}

fn emit(sink: &dyn LogSink, record: &AccessRecord) {
    match catch_unwind(AssertUnwindSafe(|| sink.record(record))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "Failed to write access log entry"),
        Err(_) => tracing::warn!("Access log sink panicked"),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::{get, post};

    /// Collects records in memory.
    #[derive(Default)]
    pub struct MemorySink {
        records: Mutex<Vec<AccessRecord>>,
    }

    impl MemorySink {
        pub fn records(&self) -> Vec<AccessRecord> {
            self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }
    }

    impl LogSink for MemorySink {
        fn record(&self, record: &AccessRecord) -> Result<(), SinkError> {
            self.records
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(record.clone());
            Ok(())
        }
    }

    struct BrokenSink;

    impl LogSink for BrokenSink {
        fn record(&self, _: &AccessRecord) -> Result<(), SinkError> {
            Err(SinkError("disk full".into()))
        }
    }

    struct PanickingSink;

    impl LogSink for PanickingSink {
        fn record(&self, _: &AccessRecord) -> Result<(), SinkError> {
            panic!("sink exploded");
        }
    }

    async fn tagged() -> Response {
        let mut response = StatusCode::OK.into_response();
        response.extensions_mut().insert(CallLogContext {
            method: Some("ping".into()),
            id: Value::from(7),
        });
        response
    }

    fn app(sink: Arc<dyn LogSink>) -> Router {
        Router::new()
            .route("/mcp", post(tagged))
            .route("/health", get(|| async { StatusCode::OK }))
            .layer(AccessLogLayer::new(sink))
    }

    fn post_mcp() -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/mcp")
            .body(Body::empty())
            .expect("request should build")
    }

    #[tokio::test]
    async fn records_method_id_and_status_once() {
        let sink = Arc::new(MemorySink::default());
        let response = app(sink.clone())
            .oneshot(post_mcp())
            .await
            .expect("request should succeed");
        assert_eq!(response.status(), StatusCode::OK);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].method.as_deref(), Some("ping"));
        assert_eq!(records[0].id, Value::from(7));
        assert_eq!(records[0].http_status, 200);
    }

    #[tokio::test]
    async fn other_paths_are_not_logged() {
        let sink = Arc::new(MemorySink::default());
        app(sink.clone())
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("request should succeed");
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn sink_failures_never_replace_the_response() {
        for sink in [
            Arc::new(BrokenSink) as Arc<dyn LogSink>,
            Arc::new(PanickingSink) as Arc<dyn LogSink>,
        ] {
            let response = app(sink)
                .oneshot(post_mcp())
                .await
                .expect("request should succeed");
            assert_eq!(response.status(), StatusCode::OK);
        }
    }
}
