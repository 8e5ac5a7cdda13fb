use async_trait::async_trait;
use bureau_core::store::{Entity, ResourceKind, Store, StoreError, strip_reserved};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::PgPool;
use sqlx::types::Json;

type Row = (i64, Json<Map<String, Value>>, DateTime<Utc>, DateTime<Utc>);

const COLUMNS: &str = "id, data, created_at, updated_at";

/// Postgres-backed store: one table per resource kind, fields kept in a
/// JSONB `data` column.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn into_entity((id, Json(fields), created_at, updated_at): Row) -> Entity {
    Entity {
        id,
        fields,
        created_at,
        updated_at,
    }
}

fn store_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Decode(err.to_string())
        }
        other => StoreError::Query(other.to_string()),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find(&self, kind: ResourceKind, id: i64) -> Result<Option<Entity>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM {} WHERE id = $1", kind.table());
        let row = sqlx::query_as::<_, Row>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(row.map(into_entity))
    }

    async fn create(
        &self,
        kind: ResourceKind,
        fields: Map<String, Value>,
    ) -> Result<Entity, StoreError> {
        let sql = format!(
            "INSERT INTO {} (data) VALUES ($1) RETURNING {COLUMNS}",
            kind.table()
        );
        let row = sqlx::query_as::<_, Row>(&sql)
            .bind(Json(strip_reserved(fields)))
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(into_entity(row))
    }

    async fn update(
        &self,
        kind: ResourceKind,
        id: i64,
        fields: Map<String, Value>,
    ) -> Result<Option<Entity>, StoreError> {
        let sql = format!(
            "UPDATE {} SET data = data || $2, updated_at = now() WHERE id = $1 RETURNING {COLUMNS}",
            kind.table()
        );
        let row = sqlx::query_as::<_, Row>(&sql)
            .bind(id)
            .bind(Json(strip_reserved(fields)))
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(row.map(into_entity))
    }

    async fn list(
        &self,
        kind: ResourceKind,
        filter: &Map<String, Value>,
    ) -> Result<Vec<Entity>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {} WHERE data @> $1 ORDER BY id",
            kind.table()
        );
        let rows = sqlx::query_as::<_, Row>(&sql)
            .bind(Json(filter.clone()))
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(into_entity).collect())
    }

    async fn exists(&self, kind: ResourceKind, id: i64) -> Result<bool, StoreError> {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)", kind.table());
        sqlx::query_scalar::<_, bool>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| ())
            .map_err(store_error)
    }
}
