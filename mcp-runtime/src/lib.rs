use std::sync::Arc;

use bureau_core::envelope::ToolCall;
use bureau_core::store::Store;
use bureau_core::validate::validate;
use bureau_core::McpError;
use serde_json::{Map, Value, json};

pub mod dispatch;
pub mod registry;
pub mod session;
pub mod tools;

pub use registry::{ToolEntry, ToolRegistry};
pub use session::{Session, SessionManager};
pub use tools::ToolHandler;

pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";
pub const DEFAULT_SERVER_NAME: &str = "bureau-gateway";
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 60;

/// Protocol methods answered by the gateway itself rather than a tool.
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const PING: &str = "ping";
    pub const LIST_TOOLS: &str = "tools/list";
    pub const CALL_TOOL: &str = "tools/call";
}

/// Immutable gateway settings, built once at startup and passed in explicitly.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// `None` means the service is not configured and every call is refused.
    pub api_key: Option<String>,
    pub protocol_version: String,
    pub session_enabled: bool,
    pub session_ttl_minutes: i64,
    pub server_name: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            session_enabled: false,
            session_ttl_minutes: DEFAULT_SESSION_TTL_MINUTES,
            server_name: DEFAULT_SERVER_NAME.to_string(),
        }
    }
}

impl GatewayConfig {
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_sessions(mut self, ttl_minutes: i64) -> Self {
        self.session_enabled = true;
        self.session_ttl_minutes = ttl_minutes;
        self
    }

    /// A blank key counts as unconfigured.
    pub fn configured_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// Validates and dispatches tool calls against a store.
///
/// Authentication happens in front of the gateway; by the time `execute` runs
/// the caller has already been admitted.
pub struct Gateway {
    config: GatewayConfig,
    registry: ToolRegistry,
    store: Arc<dyn Store>,
    sessions: Option<SessionManager>,
}

impl Gateway {
    pub fn new(config: GatewayConfig, store: Arc<dyn Store>) -> Self {
        Self::with_registry(config, store, ToolRegistry::standard())
    }

    pub fn with_registry(
        config: GatewayConfig,
        store: Arc<dyn Store>,
        registry: ToolRegistry,
    ) -> Self {
        let sessions = config.session_enabled.then(|| {
            SessionManager::new(config.session_ttl_minutes, config.protocol_version.clone())
        });
        Self {
            config,
            registry,
            store,
            sessions,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// `None` when sessions are disabled by configuration.
    pub fn sessions(&self) -> Option<&SessionManager> {
        self.sessions.as_ref()
    }

    /// Run one call to completion. `session` is advisory and only shapes `initialize`.
    pub async fn execute(&self, call: &ToolCall, session: Option<&Session>) -> Result<Value, McpError> {
        match call.method.as_str() {
            methods::INITIALIZE => Ok(self.initialize_payload(session)),
            methods::PING => Ok(json!({})),
            methods::LIST_TOOLS => Ok(self.tools_list_payload()),
            methods::CALL_TOOL => self.handle_tools_call(&call.params).await,
            tool => self.run_tool(tool, &call.params).await,
        }
    }

    /// Schema lookup, validation, then dispatch.
    pub async fn run_tool(&self, name: &str, params: &Map<String, Value>) -> Result<Value, McpError> {
        let entry = self.registry.get(name)?;
        let validated = validate(&entry.schema, params, self.store.as_ref()).await?;
        dispatch::dispatch(entry, self.store.as_ref(), validated).await
    }

    fn initialize_payload(&self, session: Option<&Session>) -> Value {
        let protocol_version = session
            .map(|session| session.protocol_version.as_str())
            .unwrap_or(&self.config.protocol_version);
        let mut payload = json!({
            "protocolVersion": protocol_version,
            "capabilities": {
                "tools": {
                    "listChanged": false
                }
            },
            "serverInfo": {
                "name": self.config.server_name,
                "version": env!("CARGO_PKG_VERSION")
            }
        });
        if let Some(session) = session {
            payload["sessionId"] = json!(session.id);
            payload["sessionExpiresAt"] = json!(session.expires_at);
        }
        payload
    }

    fn tools_list_payload(&self) -> Value {
        json!({ "tools": self.registry.definitions() })
    }

    async fn handle_tools_call(&self, params: &Map<String, Value>) -> Result<Value, McpError> {
        let name = match params.get("name") {
            Some(Value::String(name)) if !name.trim().is_empty() => name,
            Some(Value::String(_)) | None => {
                return Err(McpError::invalid_field("name", "The name field is required."));
            }
            Some(_) => {
                return Err(McpError::invalid_field("name", "The name field must be a string."));
            }
        };

        let empty = Map::new();
        let arguments = match params.get("arguments") {
            Some(Value::Object(arguments)) => arguments,
            Some(Value::Null) | None => &empty,
            Some(_) => {
                return Err(McpError::invalid_field(
                    "arguments",
                    "The arguments field must be an object.",
                ));
            }
        };

        self.run_tool(name, arguments).await
    }
}
