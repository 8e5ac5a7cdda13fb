use async_trait::async_trait;
use bureau_core::McpError;
use bureau_core::schema::{FieldSpec, ToolSchema};
use bureau_core::store::{Entity, ResourceKind, Store};
use bureau_core::validate::ValidatedParams;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value, json};

use super::{CreateRecord, ToolHandler, fetch, update};
use crate::registry::{ToolEntry, ToolRegistry};

const PLATFORMS: &[&str] = &["facebook", "instagram", "linkedin", "twitter"];
const CONNECTION_STATUSES: &[&str] = &["active", "disconnected"];
const PUBLISHED: &str = "published";

fn post_fields(creating: bool) -> Vec<FieldSpec> {
    let content = FieldSpec::new("content").string().max(5000.0);
    vec![
        if creating { content.required() } else { content },
        FieldSpec::new("connection_ids")
            .nullable()
            .integer_list()
            .exists(ResourceKind::SocialConnection)
            .describe("Connections the post is published to"),
        FieldSpec::new("scheduled_at").nullable().date(),
    ]
}

pub fn register(registry: &mut ToolRegistry) {
    registry.register(ToolEntry::new(
        "create_social_connection",
        "Connect a social media account.",
        ToolSchema::new(vec![
            FieldSpec::new("platform").required().string().one_of(PLATFORMS),
            FieldSpec::new("account_name").required().string().max(255.0),
            FieldSpec::new("status").string().one_of(CONNECTION_STATUSES),
        ]),
        CreateRecord::new(ResourceKind::SocialConnection).with_default("status", "active"),
    ));

    registry.register(ToolEntry::new(
        "create_social_post",
        "Draft a social media post.",
        ToolSchema::new(post_fields(true)),
        CreateRecord::new(ResourceKind::SocialPost).with_default("status", "draft"),
    ));

    let mut update_fields = vec![FieldSpec::new("id").required().integer()];
    update_fields.extend(post_fields(false));
    registry.register(ToolEntry::new(
        "update_social_post",
        "Edit a draft post. Published posts are read-only.",
        ToolSchema::new(update_fields),
        UpdateSocialPost,
    ));

    registry.register(ToolEntry::new(
        "publish_social_post",
        "Publish a post to its active connections.",
        ToolSchema::new(vec![FieldSpec::new("id").required().integer()]),
        PublishSocialPost,
    ));
}

fn is_published(post: &Entity) -> bool {
    post.get_str("status") == Some(PUBLISHED)
}

struct UpdateSocialPost;

#[async_trait]
impl ToolHandler for UpdateSocialPost {
    async fn call(&self, store: &dyn Store, params: ValidatedParams) -> Result<Value, McpError> {
        let id = params.require_i64("id")?;
        let post = fetch(store, ResourceKind::SocialPost, id).await?;
        if is_published(&post) {
            return Err(McpError::invalid_operation("cannot edit a published post"));
        }
        let entity = update(store, ResourceKind::SocialPost, id, params.without(&["id"])).await?;
        Ok(entity.to_value())
    }
}

struct PublishSocialPost;

#[async_trait]
impl ToolHandler for PublishSocialPost {
    async fn call(&self, store: &dyn Store, params: ValidatedParams) -> Result<Value, McpError> {
        let id = params.require_i64("id")?;
        let post = fetch(store, ResourceKind::SocialPost, id).await?;
        if is_published(&post) {
            return Err(McpError::invalid_operation("post is already published"));
        }

        let connection_ids: Vec<i64> = post
            .get("connection_ids")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default();

        let mut active = Vec::new();
        for connection_id in connection_ids {
            let connection = store.find(ResourceKind::SocialConnection, connection_id).await?;
            if connection.is_some_and(|c| c.get_str("status") == Some("active")) {
                active.push(connection_id);
            }
        }
        if active.is_empty() {
            return Err(McpError::invalid_operation(
                "cannot publish a post with no connections",
            ));
        }

        let mut fields = Map::new();
        fields.insert("status".into(), json!(PUBLISHED));
        fields.insert(
            "published_at".into(),
            json!(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        let published = update(store, ResourceKind::SocialPost, id, fields).await?;
        tracing::info!(post_id = id, connections = active.len(), "social post published");

        let mut result = published.to_value();
        result["published_to"] = json!(active);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use bureau_core::error::codes;
    use serde_json::json;

    use crate::tools::testing::{gateway, run};

    #[tokio::test]
    async fn publishing_without_connections_is_refused() {
        let gateway = gateway();
        run(&gateway, "create_social_post", json!({"content": "Hello"}))
            .await
            .unwrap();
        let err = run(&gateway, "publish_social_post", json!({"id": 1}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::INVALID_OPERATION);
        assert_eq!(err.to_string(), "cannot publish a post with no connections");
    }

    #[tokio::test]
    async fn disconnected_accounts_do_not_count() {
        let gateway = gateway();
        run(
            &gateway,
            "create_social_connection",
            json!({"platform": "linkedin", "account_name": "acme", "status": "disconnected"}),
        )
        .await
        .unwrap();
        run(
            &gateway,
            "create_social_post",
            json!({"content": "Hello", "connection_ids": [1]}),
        )
        .await
        .unwrap();
        let err = run(&gateway, "publish_social_post", json!({"id": 1}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::INVALID_OPERATION);
    }

    #[tokio::test]
    async fn publish_then_edit_is_refused() {
        let gateway = gateway();
        run(
            &gateway,
            "create_social_connection",
            json!({"platform": "twitter", "account_name": "acme"}),
        )
        .await
        .unwrap();
        let post = run(
            &gateway,
            "create_social_post",
            json!({"content": "Launch", "connection_ids": [1]}),
        )
        .await
        .unwrap();
        assert_eq!(post["status"], json!("draft"));

        let published = run(&gateway, "publish_social_post", json!({"id": 1}))
            .await
            .unwrap();
        assert_eq!(published["status"], json!("published"));
        assert!(published["published_at"].is_string());
        assert_eq!(published["published_to"], json!([1]));

        let again = run(&gateway, "publish_social_post", json!({"id": 1}))
            .await
            .unwrap_err();
        assert_eq!(again.code(), codes::INVALID_OPERATION);

        let edit = run(&gateway, "update_social_post", json!({"id": 1, "content": "Edited"}))
            .await
            .unwrap_err();
        assert_eq!(edit.code(), codes::INVALID_OPERATION);
    }

    #[tokio::test]
    async fn unknown_connection_ids_fail_validation() {
        let err = run(
            &gateway(),
            "create_social_post",
            json!({"content": "Hi", "connection_ids": [7, 9]}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), codes::VALIDATION_FAILED);
    }

    #[tokio::test]
    async fn publishing_missing_post_is_not_found() {
        let err = run(&gateway(), "publish_social_post", json!({"id": 999999}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::RESOURCE_NOT_FOUND);
    }
}
