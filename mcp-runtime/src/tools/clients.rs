use bureau_core::schema::{FieldSpec, ToolSchema};
use bureau_core::store::ResourceKind;

use super::{CreateRecord, GetRecord, UpdateRecord};
use crate::registry::{ToolEntry, ToolRegistry};

const CLIENT_STATUSES: &[&str] = &["active", "inactive", "lead"];

fn client_fields(name_required: bool) -> Vec<FieldSpec> {
    let name = FieldSpec::new("name").string().max(255.0).describe("Display name");
    vec![
        if name_required { name.required() } else { name },
        FieldSpec::new("email").nullable().string().max(255.0),
        FieldSpec::new("phone").nullable().string().max(50.0),
        FieldSpec::new("company").nullable().string().max(255.0),
        FieldSpec::new("status").string().one_of(CLIENT_STATUSES),
        FieldSpec::new("notes").nullable().string(),
    ]
}

pub fn register(registry: &mut ToolRegistry) {
    registry.register(ToolEntry::new(
        "create_client",
        "Create a client record.",
        ToolSchema::new(client_fields(true)),
        CreateRecord::new(ResourceKind::Client),
    ));

    let mut update_fields = vec![FieldSpec::new("id").required().integer()];
    update_fields.extend(client_fields(false));
    registry.register(ToolEntry::new(
        "update_client",
        "Update fields of an existing client.",
        ToolSchema::new(update_fields),
        UpdateRecord::new(ResourceKind::Client),
    ));

    registry.register(ToolEntry::new(
        "get_client",
        "Fetch one client by id.",
        ToolSchema::new(vec![FieldSpec::new("id").required().integer()]),
        GetRecord::new(ResourceKind::Client),
    ));
}

#[cfg(test)]
mod tests {
    use bureau_core::error::codes;
    use serde_json::json;

    use crate::tools::testing::{gateway, run};

    #[tokio::test]
    async fn create_then_get_client() {
        let gateway = gateway();
        let created = run(&gateway, "create_client", json!({"name": "Acme", "status": "lead"}))
            .await
            .unwrap();
        let fetched = run(&gateway, "get_client", json!({"id": created["id"]}))
            .await
            .unwrap();
        assert_eq!(fetched["name"], json!("Acme"));
        assert_eq!(fetched["status"], json!("lead"));
    }

    #[tokio::test]
    async fn update_missing_client_reports_identifier() {
        let err = run(&gateway(), "update_client", json!({"id": 999999, "name": "Ghost"}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::RESOURCE_NOT_FOUND);
        assert_eq!(
            err.to_envelope().data,
            Some(json!({"resource_type": "client", "identifier": 999999}))
        );
    }
}
