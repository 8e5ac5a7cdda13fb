use bureau_core::schema::{FieldSpec, ToolSchema};
use bureau_core::store::ResourceKind;

use super::{CreateRecord, UpdateRecord};
use crate::registry::{ToolEntry, ToolRegistry};

const UNITS: &[&str] = &["hour", "day", "unit", "month", "project"];

fn item_fields(creating: bool) -> Vec<FieldSpec> {
    let name = FieldSpec::new("name").string().max(255.0);
    let category_id = FieldSpec::new("category_id")
        .integer()
        .exists(ResourceKind::CatalogCategory);
    let unit_price = FieldSpec::new("unit_price")
        .number()
        .min(0.0)
        .describe("Price per unit, in the account currency");
    vec![
        if creating { name.required() } else { name },
        if creating { category_id.required() } else { category_id },
        if creating { unit_price.required() } else { unit_price },
        FieldSpec::new("unit").string().one_of(UNITS),
        FieldSpec::new("sku").nullable().string().max(64.0),
        FieldSpec::new("description").nullable().string(),
        FieldSpec::new("is_active").boolean(),
    ]
}

pub fn register(registry: &mut ToolRegistry) {
    registry.register(ToolEntry::new(
        "create_catalog_category",
        "Create a catalog category.",
        ToolSchema::new(vec![
            FieldSpec::new("name").required().string().max(255.0),
            FieldSpec::new("description").nullable().string(),
        ]),
        CreateRecord::new(ResourceKind::CatalogCategory),
    ));

    registry.register(ToolEntry::new(
        "create_catalog_item",
        "Create a billable catalog item inside a category.",
        ToolSchema::new(item_fields(true)),
        CreateRecord::new(ResourceKind::CatalogItem).with_default("is_active", true),
    ));

    let mut update_fields = vec![FieldSpec::new("id").required().integer()];
    update_fields.extend(item_fields(false));
    registry.register(ToolEntry::new(
        "update_catalog_item",
        "Update fields of an existing catalog item.",
        ToolSchema::new(update_fields),
        UpdateRecord::new(ResourceKind::CatalogItem),
    ));
}

#[cfg(test)]
mod tests {
    use bureau_core::McpError;
    use serde_json::json;

    use crate::tools::testing::{gateway, run};

    #[tokio::test]
    async fn negative_price_is_rejected_with_field_key() {
        let gateway = gateway();
        run(&gateway, "create_catalog_category", json!({"name": "Services"}))
            .await
            .unwrap();
        let err = run(
            &gateway,
            "create_catalog_item",
            json!({"name": "Consulting", "category_id": 1, "unit_price": -5}),
        )
        .await
        .unwrap_err();
        let McpError::ValidationFailed(failure) = err else {
            panic!("expected validation failure");
        };
        assert_eq!(failure.fields().collect::<Vec<_>>(), vec!["unit_price"]);
    }

    #[tokio::test]
    async fn create_item_coerces_and_defaults() {
        let gateway = gateway();
        run(&gateway, "create_catalog_category", json!({"name": "Services"}))
            .await
            .unwrap();
        let item = run(
            &gateway,
            "create_catalog_item",
            json!({"name": "Consulting", "category_id": "1", "unit_price": "120.5", "unit": "hour"}),
        )
        .await
        .unwrap();
        assert_eq!(item["category_id"], json!(1));
        assert_eq!(item["unit_price"], json!(120.5));
        assert_eq!(item["is_active"], json!(true));
    }
}
