use std::collections::BTreeMap;
use std::sync::Arc;

use bureau_core::McpError;
use bureau_core::schema::ToolSchema;
use serde_json::{Value, json};

use crate::tools::{self, ToolHandler};

/// One registered tool: its schema and the handler that runs once the
/// schema has been satisfied.
pub struct ToolEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: ToolSchema,
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolEntry {
    pub fn new(
        name: &'static str,
        description: &'static str,
        schema: ToolSchema,
        handler: impl ToolHandler + 'static,
    ) -> Self {
        Self {
            name,
            description,
            schema,
            handler: Arc::new(handler),
        }
    }

    pub fn definition(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.schema.to_json_schema(),
        })
    }
}

/// Tool name to entry. Built once at startup, read-only afterwards.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, ToolEntry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every tool the gateway ships with.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        tools::clients::register(&mut registry);
        tools::projects::register(&mut registry);
        tools::tasks::register(&mut registry);
        tools::catalog::register(&mut registry);
        tools::social::register(&mut registry);
        tools::time_entries::register(&mut registry);
        registry
    }

    /// Panics on a duplicate name: registration only happens at startup and a
    /// clash is a programming error.
    pub fn register(&mut self, entry: ToolEntry) {
        let name = entry.name;
        if self.tools.insert(name, entry).is_some() {
            panic!("tool registered twice: {name}");
        }
    }

    pub fn get(&self, name: &str) -> Result<&ToolEntry, McpError> {
        self.tools
            .get(name)
            .ok_or_else(|| McpError::unknown_tool(name))
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn definitions(&self) -> Vec<Value> {
        self.tools.values().map(ToolEntry::definition).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bureau_core::error::codes;

    #[test]
    fn standard_registry_covers_the_catalog() {
        let registry = ToolRegistry::standard();
        for name in [
            "create_client",
            "update_client",
            "get_client",
            "create_project",
            "update_project",
            "create_task",
            "update_task",
            "list_tasks",
            "create_catalog_category",
            "create_catalog_item",
            "update_catalog_item",
            "create_social_connection",
            "create_social_post",
            "update_social_post",
            "publish_social_post",
            "create_time_entry",
            "update_time_entry",
            "stop_time_entry",
        ] {
            assert!(registry.get(name).is_ok(), "missing tool {name}");
        }
    }

    #[test]
    fn unknown_tool_lookup_fails_with_invalid_operation() {
        let registry = ToolRegistry::standard();
        let err = registry.get("nope").err().expect("unknown tool");
        assert_eq!(err.code(), codes::INVALID_OPERATION);
    }

    #[test]
    fn definitions_are_sorted_by_name() {
        let registry = ToolRegistry::standard();
        let names: Vec<String> = registry
            .definitions()
            .iter()
            .map(|d| d["name"].as_str().unwrap_or_default().to_string())
            .collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    #[should_panic(expected = "tool registered twice")]
    fn duplicate_registration_panics() {
        let mut registry = ToolRegistry::new();
        tools::clients::register(&mut registry);
        tools::clients::register(&mut registry);
    }
}
