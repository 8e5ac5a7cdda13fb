use async_trait::async_trait;
use bureau_core::McpError;
use bureau_core::schema::{FieldSpec, ToolSchema};
use bureau_core::store::{ResourceKind, Store};
use bureau_core::validate::ValidatedParams;
use serde_json::{Map, Value, json};

use super::{CreateRecord, ToolHandler, fetch, update};
use crate::registry::{ToolEntry, ToolRegistry};

const PROJECT_STATUSES: &[&str] = &["planning", "active", "on_hold", "completed", "cancelled"];
const CLOSED_STATUSES: &[&str] = &["completed", "cancelled"];

fn project_fields(creating: bool) -> Vec<FieldSpec> {
    let name = FieldSpec::new("name").string().max(255.0);
    let client_id = FieldSpec::new("client_id")
        .integer()
        .exists(ResourceKind::Client);
    vec![
        if creating { name.required() } else { name },
        if creating { client_id.required() } else { client_id },
        FieldSpec::new("status").string().one_of(PROJECT_STATUSES),
        FieldSpec::new("budget").nullable().number().min(0.0),
        FieldSpec::new("start_date").nullable().date(),
        FieldSpec::new("due_date").nullable().date(),
        FieldSpec::new("description").nullable().string(),
    ]
}

pub fn register(registry: &mut ToolRegistry) {
    registry.register(ToolEntry::new(
        "create_project",
        "Create a project for a client. Status defaults to planning.",
        ToolSchema::new(project_fields(true))
            .with_message("client_id", "exists", "The selected client does not exist."),
        CreateRecord::new(ResourceKind::Project).with_default("status", "planning"),
    ));

    let mut update_fields = vec![FieldSpec::new("id").required().integer()];
    update_fields.extend(project_fields(false));
    registry.register(ToolEntry::new(
        "update_project",
        "Update a project. Completed or cancelled projects cannot be reopened.",
        ToolSchema::new(update_fields)
            .with_message("client_id", "exists", "The selected client does not exist."),
        UpdateProject,
    ));
}

struct UpdateProject;

#[async_trait]
impl ToolHandler for UpdateProject {
    async fn call(&self, store: &dyn Store, params: ValidatedParams) -> Result<Value, McpError> {
        let id = params.require_i64("id")?;
        let current = fetch(store, ResourceKind::Project, id).await?;

        if let (Some(from), Some(to)) = (current.get_str("status"), params.str("status")) {
            if CLOSED_STATUSES.contains(&from) && !CLOSED_STATUSES.contains(&to) {
                let mut data = Map::new();
                data.insert("current_status".into(), json!(from));
                data.insert("requested_status".into(), json!(to));
                return Err(McpError::invalid_operation_with(
                    format!("cannot reopen a {from} project"),
                    data,
                ));
            }
        }

        let entity = update(store, ResourceKind::Project, id, params.without(&["id"])).await?;
        Ok(entity.to_value())
    }
}

#[cfg(test)]
mod tests {
    use bureau_core::McpError;
    use bureau_core::error::codes;
    use serde_json::json;

    use crate::tools::testing::{gateway, run};

    #[tokio::test]
    async fn create_project_requires_existing_client_and_defaults_status() {
        let gateway = gateway();
        let err = run(&gateway, "create_project", json!({"name": "Site", "client_id": 4}))
            .await
            .unwrap_err();
        let McpError::ValidationFailed(failure) = err else {
            panic!("expected validation failure");
        };
        assert_eq!(
            failure.get("client_id"),
            Some(&["The selected client does not exist.".to_string()][..])
        );

        run(&gateway, "create_client", json!({"name": "Acme"})).await.unwrap();
        let project = run(&gateway, "create_project", json!({"name": "Site", "client_id": 1}))
            .await
            .unwrap();
        assert_eq!(project["status"], json!("planning"));
    }

    #[tokio::test]
    async fn closed_projects_cannot_be_reopened() {
        let gateway = gateway();
        run(&gateway, "create_client", json!({"name": "Acme"})).await.unwrap();
        run(
            &gateway,
            "create_project",
            json!({"name": "Site", "client_id": 1, "status": "completed"}),
        )
        .await
        .unwrap();

        let err = run(&gateway, "update_project", json!({"id": 1, "status": "active"}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::INVALID_OPERATION);
        assert_eq!(
            err.to_envelope().data,
            Some(json!({"current_status": "completed", "requested_status": "active"}))
        );

        let renamed = run(&gateway, "update_project", json!({"id": 1, "name": "Site v2"}))
            .await
            .unwrap();
        assert_eq!(renamed["name"], json!("Site v2"));
        assert_eq!(renamed["status"], json!("completed"));
    }
}
