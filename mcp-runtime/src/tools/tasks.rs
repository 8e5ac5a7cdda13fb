use bureau_core::schema::{FieldSpec, ToolSchema};
use bureau_core::store::ResourceKind;

use super::{CreateRecord, ListRecords, UpdateRecord};
use crate::registry::{ToolEntry, ToolRegistry};

const TASK_STATUSES: &[&str] = &["todo", "in_progress", "review", "done"];
const TASK_PRIORITIES: &[&str] = &["low", "medium", "high", "urgent"];

fn task_fields(creating: bool) -> Vec<FieldSpec> {
    let title = FieldSpec::new("title").string().max(255.0);
    let status = FieldSpec::new("status").string().one_of(TASK_STATUSES);
    vec![
        if creating { title.required() } else { title },
        if creating { status.required() } else { status },
        FieldSpec::new("priority").string().one_of(TASK_PRIORITIES),
        FieldSpec::new("project_id")
            .nullable()
            .integer()
            .exists(ResourceKind::Project),
        FieldSpec::new("due_date").nullable().date(),
        FieldSpec::new("description").nullable().string(),
        FieldSpec::new("estimated_hours")
            .nullable()
            .number()
            .between(0.0, 1000.0),
    ]
}

pub fn register(registry: &mut ToolRegistry) {
    registry.register(ToolEntry::new(
        "create_task",
        "Create a task, optionally attached to a project.",
        ToolSchema::new(task_fields(true)),
        CreateRecord::new(ResourceKind::Task),
    ));

    let mut update_fields = vec![FieldSpec::new("id").required().integer()];
    update_fields.extend(task_fields(false));
    registry.register(ToolEntry::new(
        "update_task",
        "Update fields of an existing task.",
        ToolSchema::new(update_fields),
        UpdateRecord::new(ResourceKind::Task),
    ));

    registry.register(ToolEntry::new(
        "list_tasks",
        "List tasks, optionally filtered by project and status.",
        ToolSchema::new(vec![
            FieldSpec::new("project_id").integer(),
            FieldSpec::new("status").string().one_of(TASK_STATUSES),
        ]),
        ListRecords::new(ResourceKind::Task),
    ));
}
