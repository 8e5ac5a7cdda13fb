use async_trait::async_trait;
use bureau_core::McpError;
use bureau_core::schema::{FieldSpec, ToolSchema};
use bureau_core::store::{Entity, ResourceKind, Store};
use bureau_core::validate::ValidatedParams;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value, json};

use super::{ToolHandler, fetch, parse_timestamp, update};
use crate::registry::{ToolEntry, ToolRegistry};

fn entry_fields(creating: bool) -> Vec<FieldSpec> {
    let task_id = FieldSpec::new("task_id")
        .integer()
        .exists(ResourceKind::Task);
    let started_at = FieldSpec::new("started_at").date();
    let hourly_rate = FieldSpec::new("hourly_rate").nullable().number().min(0.0);
    vec![
        if creating { task_id.required() } else { task_id },
        if creating { started_at.required() } else { started_at },
        FieldSpec::new("ended_at").nullable().date(),
        FieldSpec::new("description").nullable().string(),
        FieldSpec::new("billable").boolean(),
        if creating { hourly_rate.required_if("billable", true) } else { hourly_rate },
    ]
}

/// Updates are partial, so the billable/rate pairing is checked against the
/// row as it will look after the merge.
fn ensure_rate_when_billable(
    params: &ValidatedParams,
    current: &Entity,
) -> Result<(), McpError> {
    let billable = params
        .bool("billable")
        .or_else(|| current.get("billable").and_then(Value::as_bool))
        .unwrap_or(false);
    let rate = match params.get("hourly_rate") {
        Some(value) => Some(value),
        None => current.get("hourly_rate"),
    };
    if billable && rate.is_none_or(Value::is_null) {
        return Err(McpError::invalid_field(
            "hourly_rate",
            "The hourly_rate field is required when billable is true.",
        ));
    }
    Ok(())
}

pub fn register(registry: &mut ToolRegistry) {
    registry.register(ToolEntry::new(
        "create_time_entry",
        "Log time against a task.",
        ToolSchema::new(entry_fields(true)),
        CreateTimeEntry,
    ));

    let mut update_fields = vec![FieldSpec::new("id").required().integer()];
    update_fields.extend(entry_fields(false));
    registry.register(ToolEntry::new(
        "update_time_entry",
        "Update fields of an existing time entry.",
        ToolSchema::new(update_fields),
        UpdateTimeEntry,
    ));

    registry.register(ToolEntry::new(
        "stop_time_entry",
        "Stop a running time entry. ended_at defaults to now.",
        ToolSchema::new(vec![
            FieldSpec::new("id").required().integer(),
            FieldSpec::new("ended_at").date(),
        ]),
        StopTimeEntry,
    ));
}

fn timestamp_of(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value.and_then(Value::as_str).and_then(parse_timestamp)
}

fn ensure_ordered(started: Option<DateTime<Utc>>, ended: Option<DateTime<Utc>>) -> Result<(), McpError> {
    match (started, ended) {
        (Some(started), Some(ended)) if ended < started => {
            let mut data = Map::new();
            data.insert("started_at".into(), json!(started));
            data.insert("ended_at".into(), json!(ended));
            Err(McpError::invalid_operation_with(
                "ended_at cannot be before started_at",
                data,
            ))
        }
        _ => Ok(()),
    }
}

struct CreateTimeEntry;

#[async_trait]
impl ToolHandler for CreateTimeEntry {
    async fn call(&self, store: &dyn Store, params: ValidatedParams) -> Result<Value, McpError> {
        ensure_ordered(
            timestamp_of(params.get("started_at")),
            timestamp_of(params.get("ended_at")),
        )?;
        let mut fields = params.into_map();
        fields.entry("billable").or_insert(json!(false));
        let entity = store.create(ResourceKind::TimeEntry, fields).await?;
        Ok(entity.to_value())
    }
}

struct UpdateTimeEntry;

#[async_trait]
impl ToolHandler for UpdateTimeEntry {
    async fn call(&self, store: &dyn Store, params: ValidatedParams) -> Result<Value, McpError> {
        let id = params.require_i64("id")?;
        let current = fetch(store, ResourceKind::TimeEntry, id).await?;
        let started = timestamp_of(params.get("started_at")).or(timestamp_of(current.get("started_at")));
        let ended = match params.get("ended_at") {
            Some(value) => timestamp_of(Some(value)),
            None => timestamp_of(current.get("ended_at")),
        };
        ensure_ordered(started, ended)?;
        ensure_rate_when_billable(&params, &current)?;

        let entity = update(store, ResourceKind::TimeEntry, id, params.without(&["id"])).await?;
        Ok(entity.to_value())
    }
}

struct StopTimeEntry;

#[async_trait]
impl ToolHandler for StopTimeEntry {
    async fn call(&self, store: &dyn Store, params: ValidatedParams) -> Result<Value, McpError> {
        let id = params.require_i64("id")?;
        let current = fetch(store, ResourceKind::TimeEntry, id).await?;
        if current.get("ended_at").is_some() {
            return Err(McpError::invalid_operation("time entry is already stopped"));
        }

        let ended = timestamp_of(params.get("ended_at")).unwrap_or_else(Utc::now);
        ensure_ordered(timestamp_of(current.get("started_at")), Some(ended))?;

        let mut fields = Map::new();
        fields.insert(
            "ended_at".into(),
            json!(ended.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        let entity = update(store, ResourceKind::TimeEntry, id, fields).await?;
        Ok(entity.to_value())
    }
}
