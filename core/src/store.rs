use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::McpError;

/// Keys owned by the store. Callers can never write them through `fields`.
pub const RESERVED_FIELDS: [&str; 3] = ["id", "created_at", "updated_at"];

/// Business domains exposed through tools. One storage table per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Client,
    Project,
    Task,
    CatalogCategory,
    CatalogItem,
    SocialConnection,
    SocialPost,
    TimeEntry,
}

impl ResourceKind {
    /// Name used in `ResourceNotFound` payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Client => "client",
            ResourceKind::Project => "project",
            ResourceKind::Task => "task",
            ResourceKind::CatalogCategory => "catalog_category",
            ResourceKind::CatalogItem => "catalog_item",
            ResourceKind::SocialConnection => "social_connection",
            ResourceKind::SocialPost => "social_post",
            ResourceKind::TimeEntry => "time_entry",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            ResourceKind::Client => "clients",
            ResourceKind::Project => "projects",
            ResourceKind::Task => "tasks",
            ResourceKind::CatalogCategory => "catalog_categories",
            ResourceKind::CatalogItem => "catalog_items",
            ResourceKind::SocialConnection => "social_connections",
            ResourceKind::SocialPost => "social_posts",
            ResourceKind::TimeEntry => "time_entries",
        }
    }
}

/// A stored row: numeric id, free-form JSON fields, and store-managed timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|value| !value.is_null())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage query failed: {0}")]
    Query(String),

    #[error("storage returned malformed data: {0}")]
    Decode(String),
}

impl From<StoreError> for McpError {
    fn from(err: StoreError) -> Self {
        McpError::database(err)
    }
}

/// Durable storage behind the gateway.
///
/// Every method may fail with a `StoreError`; callers never retry.
#[async_trait]
pub trait Store: Send + Sync {
    async fn find(&self, kind: ResourceKind, id: i64) -> Result<Option<Entity>, StoreError>;

    async fn create(
        &self,
        kind: ResourceKind,
        fields: Map<String, Value>,
    ) -> Result<Entity, StoreError>;

    /// Merge `fields` into an existing row. `Ok(None)` when the row is absent.
    async fn update(
        &self,
        kind: ResourceKind,
        id: i64,
        fields: Map<String, Value>,
    ) -> Result<Option<Entity>, StoreError>;

    /// Rows whose fields equal every entry in `filter`, ordered by id.
    async fn list(
        &self,
        kind: ResourceKind,
        filter: &Map<String, Value>,
    ) -> Result<Vec<Entity>, StoreError>;

    async fn exists(&self, kind: ResourceKind, id: i64) -> Result<bool, StoreError> {
        Ok(self.find(kind, id).await?.is_some())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Drop store-owned keys from caller-supplied fields.
pub fn strip_reserved(mut fields: Map<String, Value>) -> Map<String, Value> {
    for key in RESERVED_FIELDS {
        fields.remove(key);
    }
    fields
}

#[derive(Debug, Default)]
struct Table {
    last_id: i64,
    rows: BTreeMap<i64, Entity>,
}

/// Process-local store for development and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<ResourceKind, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_table<R>(&self, kind: ResourceKind, f: impl FnOnce(&mut Table) -> R) -> R {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        f(tables.entry(kind).or_default())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find(&self, kind: ResourceKind, id: i64) -> Result<Option<Entity>, StoreError> {
        Ok(self.with_table(kind, |table| table.rows.get(&id).cloned()))
    }

    async fn create(
        &self,
        kind: ResourceKind,
        fields: Map<String, Value>,
    ) -> Result<Entity, StoreError> {
        let fields = strip_reserved(fields);
        Ok(self.with_table(kind, |table| {
            table.last_id += 1;
            let now = Utc::now();
            let entity = Entity {
                id: table.last_id,
                fields,
                created_at: now,
                updated_at: now,
            };
            table.rows.insert(entity.id, entity.clone());
            entity
        }))
    }

    async fn update(
        &self,
        kind: ResourceKind,
        id: i64,
        fields: Map<String, Value>,
    ) -> Result<Option<Entity>, StoreError> {
        let fields = strip_reserved(fields);
        Ok(self.with_table(kind, |table| {
            let entity = table.rows.get_mut(&id)?;
            entity.fields.extend(fields);
            entity.updated_at = Utc::now();
            Some(entity.clone())
        }))
    }

    async fn list(
        &self,
        kind: ResourceKind,
        filter: &Map<String, Value>,
    ) -> Result<Vec<Entity>, StoreError> {
        Ok(self.with_table(kind, |table| {
            table
                .rows
                .values()
                .filter(|entity| {
                    filter
                        .iter()
                        .all(|(key, expected)| entity.fields.get(key) == Some(expected))
                })
                .cloned()
                .collect()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn memory_store_assigns_sequential_ids_per_kind() {
        let store = MemoryStore::new();
        let a = store
            .create(ResourceKind::Client, fields(json!({"name": "Acme"})))
            .await
            .unwrap();
        let b = store
            .create(ResourceKind::Client, fields(json!({"name": "Globex"})))
            .await
            .unwrap();
        let task = store
            .create(ResourceKind::Task, fields(json!({"title": "Call Acme"})))
            .await
            .unwrap();
        assert_eq!((a.id, b.id, task.id), (1, 2, 1));
        assert!(store.exists(ResourceKind::Client, 2).await.unwrap());
        assert!(!store.exists(ResourceKind::Client, 3).await.unwrap());
    }

    #[tokio::test]
    async fn update_merges_fields_and_ignores_reserved_keys() {
        let store = MemoryStore::new();
        let created = store
            .create(
                ResourceKind::Task,
                fields(json!({"title": "Draft", "status": "todo", "id": 55})),
            )
            .await
            .unwrap();
        assert_eq!(created.id, 1);
        assert!(!created.fields.contains_key("id"));

        let updated = store
            .update(
                ResourceKind::Task,
                created.id,
                fields(json!({"status": "done", "created_at": "1999-01-01"})),
            )
            .await
            .unwrap()
            .expect("row exists");
        assert_eq!(updated.get_str("title"), Some("Draft"));
        assert_eq!(updated.get_str("status"), Some("done"));
        assert_eq!(updated.created_at, created.created_at);

        let missing = store
            .update(ResourceKind::Task, 999_999, Map::new())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn list_filters_by_field_equality() {
        let store = MemoryStore::new();
        for (title, status) in [("a", "todo"), ("b", "done"), ("c", "todo")] {
            store
                .create(
                    ResourceKind::Task,
                    fields(json!({"title": title, "status": status})),
                )
                .await
                .unwrap();
        }
        let todo = store
            .list(ResourceKind::Task, &fields(json!({"status": "todo"})))
            .await
            .unwrap();
        let titles: Vec<&str> = todo.iter().filter_map(|e| e.get_str("title")).collect();
        assert_eq!(titles, vec!["a", "c"]);
        let all = store.list(ResourceKind::Task, &Map::new()).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn entity_serializes_flat() {
        let now = Utc::now();
        let entity = Entity {
            id: 3,
            fields: fields(json!({"name": "Acme"})),
            created_at: now,
            updated_at: now,
        };
        let value = entity.to_value();
        assert_eq!(value["id"], json!(3));
        assert_eq!(value["name"], json!("Acme"));
        assert!(value["created_at"].is_string());
    }

    #[test]
    fn store_errors_become_database_errors() {
        let err: McpError = StoreError::Unavailable("pool timed out".to_string()).into();
        assert_eq!(err.code(), crate::error::codes::DATABASE_ERROR);
        assert_eq!(err.internal_cause(), Some("storage unavailable: pool timed out"));
    }
}
