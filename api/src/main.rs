use std::net::SocketAddr;
use std::sync::Arc;

use bureau_core::store::{MemoryStore, Store};
use bureau_mcp_runtime::Gateway;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod auth;
mod config;
mod error;
mod middleware;
mod routes;
mod state;
mod store;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bureau Tool Gateway",
        version = "0.1.0",
        description = "JSON-RPC tool gateway for client, project, task, catalog, social and time-tracking operations."
    ),
    paths(
        routes::health::health_check,
        routes::mcp_http::mcp_post,
        routes::mcp_http::mcp_delete,
    ),
    components(schemas(
        HealthResponse,
        bureau_core::envelope::RpcRequest,
        bureau_core::envelope::SuccessEnvelope,
        bureau_core::envelope::ErrorEnvelope,
        bureau_core::envelope::TransportErrorEnvelope,
        bureau_core::error::ErrorObject,
        bureau_core::error::ValidationFailure,
    )),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(
                utoipa::openapi::security::Http::new(
                    utoipa::openapi::security::HttpAuthScheme::Bearer,
                ),
            ),
        );
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Number of registered tools
    pub tools: usize,
    /// Whether an API key is configured
    pub configured: bool,
}

async fn connect_store(database_url: Option<&str>) -> Result<Arc<dyn Store>, String> {
    let Some(database_url) = database_url else {
        tracing::warn!("DATABASE_URL not set, using in-memory store; data is lost on restart");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
        .map_err(|e| format!("failed to connect to database: {e}"))?;

    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .map_err(|e| format!("failed to run migrations: {e}"))?;

    Ok(Arc::new(store::PgStore::new(pool)))
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "bureau_api=debug,bureau_mcp_runtime=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = config::ServerConfig::from_env();
    if config.gateway.configured_key().is_none() {
        tracing::warn!("BUREAU_API_KEY not set; /mcp will answer 503 until it is configured");
    }

    let store = match connect_store(config.database_url.as_deref()).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            std::process::exit(1);
        }
    };

    let gateway = Gateway::new(config.gateway, store);
    tracing::info!(
        tools = gateway.registry().len(),
        sessions = gateway.sessions().is_some(),
        "gateway ready"
    );
    let app_state = state::AppState::new(gateway);

    let app = routes::router(app_state, Arc::new(middleware::access_log::TracingSink))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Bureau gateway listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "failed to bind");
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}
