use async_trait::async_trait;
use bureau_core::McpError;
use bureau_core::store::{Entity, ResourceKind, Store};
use bureau_core::validate::ValidatedParams;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value, json};

pub mod catalog;
pub mod clients;
pub mod projects;
pub mod social;
pub mod tasks;
pub mod time_entries;

/// Business logic behind one tool. Only ever sees params that passed the
/// tool's schema.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, store: &dyn Store, params: ValidatedParams) -> Result<Value, McpError>;
}

/// Insert a row built from the validated params, filling absent keys from `defaults`.
pub struct CreateRecord {
    kind: ResourceKind,
    defaults: Vec<(&'static str, Value)>,
}

impl CreateRecord {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            defaults: Vec::new(),
        }
    }

    pub fn with_default(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        self.defaults.push((field, value.into()));
        self
    }
}

#[async_trait]
impl ToolHandler for CreateRecord {
    async fn call(&self, store: &dyn Store, params: ValidatedParams) -> Result<Value, McpError> {
        let mut fields = params.into_map();
        for (field, value) in &self.defaults {
            if fields.get(*field).is_none_or(Value::is_null) {
                fields.insert((*field).to_string(), value.clone());
            }
        }
        let entity = store.create(self.kind, fields).await?;
        Ok(entity.to_value())
    }
}

/// Merge the validated params (minus `id`) into an existing row.
pub struct UpdateRecord {
    kind: ResourceKind,
}

impl UpdateRecord {
    pub fn new(kind: ResourceKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl ToolHandler for UpdateRecord {
    async fn call(&self, store: &dyn Store, params: ValidatedParams) -> Result<Value, McpError> {
        let id = params.require_i64("id")?;
        let entity = update(store, self.kind, id, params.without(&["id"])).await?;
        Ok(entity.to_value())
    }
}

pub struct GetRecord {
    kind: ResourceKind,
}

impl GetRecord {
    pub fn new(kind: ResourceKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl ToolHandler for GetRecord {
    async fn call(&self, store: &dyn Store, params: ValidatedParams) -> Result<Value, McpError> {
        let id = params.require_i64("id")?;
        Ok(fetch(store, self.kind, id).await?.to_value())
    }
}

/// Every row matching the validated params by equality.
pub struct ListRecords {
    kind: ResourceKind,
}

impl ListRecords {
    pub fn new(kind: ResourceKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl ToolHandler for ListRecords {
    async fn call(&self, store: &dyn Store, params: ValidatedParams) -> Result<Value, McpError> {
        let filter = params.into_map();
        let rows = store.list(self.kind, &filter).await?;
        let items: Vec<Value> = rows.iter().map(Entity::to_value).collect();
        Ok(json!({ "count": items.len(), "items": items }))
    }
}

/// Load a row or fail with `ResourceNotFound`.
pub async fn fetch(store: &dyn Store, kind: ResourceKind, id: i64) -> Result<Entity, McpError> {
    store
        .find(kind, id)
        .await?
        .ok_or_else(|| McpError::not_found(kind.as_str(), id))
}

pub async fn update(
    store: &dyn Store,
    kind: ResourceKind,
    id: i64,
    fields: Map<String, Value>,
) -> Result<Entity, McpError> {
    store
        .update(kind, id, fields)
        .await?
        .ok_or_else(|| McpError::not_found(kind.as_str(), id))
}

/// Parse any of the date shapes the validator accepts. Bare dates are
/// taken as midnight UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
}
