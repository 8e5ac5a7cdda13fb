use std::collections::HashMap;

use serde_json::{Map, Value, json};

use crate::store::ResourceKind;

/// Primitive shape a field value must coerce to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    /// `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, or RFC 3339.
    Date,
    IntegerList,
}

impl FieldType {
    fn json_schema(&self) -> Value {
        match self {
            FieldType::String => json!({"type": "string"}),
            FieldType::Integer => json!({"type": "integer"}),
            FieldType::Number => json!({"type": "number"}),
            FieldType::Boolean => json!({"type": "boolean"}),
            FieldType::Date => json!({"type": "string", "format": "date"}),
            FieldType::IntegerList => json!({"type": "array", "items": {"type": "integer"}}),
        }
    }
}

/// One validation rule. Fields compose several; the validator evaluates them uniformly.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Required,
    Nullable,
    Type(FieldType),
    /// Numeric value for numbers, character count for strings, length for lists.
    Range {
        min: Option<f64>,
        max: Option<f64>,
    },
    Enum(&'static [&'static str]),
    /// The id (or every id of a list) must exist in the store.
    Exists(ResourceKind),
    /// Required only when `field` in the raw params equals `equals`.
    RequiredIf {
        field: &'static str,
        equals: Value,
    },
}

impl Constraint {
    /// Rule name used to key message overrides (`"<field>.<rule>"`).
    pub fn rule(&self) -> &'static str {
        match self {
            Constraint::Required => "required",
            Constraint::Nullable => "nullable",
            Constraint::Type(_) => "type",
            Constraint::Range { .. } => "range",
            Constraint::Enum(_) => "enum",
            Constraint::Exists(_) => "exists",
            Constraint::RequiredIf { .. } => "required_if",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    name: &'static str,
    description: Option<&'static str>,
    constraints: Vec<Constraint>,
}

impl FieldSpec {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            description: None,
            constraints: Vec::new(),
        }
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    pub fn with(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn required(self) -> Self {
        self.with(Constraint::Required)
    }

    pub fn nullable(self) -> Self {
        self.with(Constraint::Nullable)
    }

    pub fn string(self) -> Self {
        self.with(Constraint::Type(FieldType::String))
    }

    pub fn integer(self) -> Self {
        self.with(Constraint::Type(FieldType::Integer))
    }

    pub fn number(self) -> Self {
        self.with(Constraint::Type(FieldType::Number))
    }

    pub fn boolean(self) -> Self {
        self.with(Constraint::Type(FieldType::Boolean))
    }

    pub fn date(self) -> Self {
        self.with(Constraint::Type(FieldType::Date))
    }

    pub fn integer_list(self) -> Self {
        self.with(Constraint::Type(FieldType::IntegerList))
    }

    pub fn min(self, min: f64) -> Self {
        self.bound(Some(min), None)
    }

    pub fn max(self, max: f64) -> Self {
        self.bound(None, Some(max))
    }

    pub fn between(self, min: f64, max: f64) -> Self {
        self.bound(Some(min), Some(max))
    }

    pub fn one_of(self, values: &'static [&'static str]) -> Self {
        self.with(Constraint::Enum(values))
    }

    pub fn exists(self, kind: ResourceKind) -> Self {
        self.with(Constraint::Exists(kind))
    }

    pub fn required_if(self, field: &'static str, equals: impl Into<Value>) -> Self {
        self.with(Constraint::RequiredIf {
            field,
            equals: equals.into(),
        })
    }

    // Successive min/max calls fold into a single Range constraint.
    fn bound(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        for constraint in &mut self.constraints {
            if let Constraint::Range {
                min: existing_min,
                max: existing_max,
            } = constraint
            {
                if min.is_some() {
                    *existing_min = min;
                }
                if max.is_some() {
                    *existing_max = max;
                }
                return self;
            }
        }
        self.with(Constraint::Range { min, max })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn description(&self) -> Option<&'static str> {
        self.description
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn is_required(&self) -> bool {
        self.constraints.contains(&Constraint::Required)
    }

    pub fn is_nullable(&self) -> bool {
        self.constraints.contains(&Constraint::Nullable)
    }

    pub fn field_type(&self) -> Option<FieldType> {
        self.constraints.iter().find_map(|constraint| match constraint {
            Constraint::Type(field_type) => Some(*field_type),
            _ => None,
        })
    }

    pub fn required_if_rule(&self) -> Option<(&'static str, &Value)> {
        self.constraints.iter().find_map(|constraint| match constraint {
            Constraint::RequiredIf { field, equals } => Some((*field, equals)),
            _ => None,
        })
    }

    fn json_schema(&self) -> Value {
        let field_type = self.field_type();
        let mut schema = field_type
            .map(|field_type| field_type.json_schema())
            .unwrap_or_else(|| json!({}));

        for constraint in &self.constraints {
            match constraint {
                Constraint::Range { min, max } => {
                    let (min_key, max_key) = match field_type {
                        Some(FieldType::String) => ("minLength", "maxLength"),
                        Some(FieldType::IntegerList) => ("minItems", "maxItems"),
                        _ => ("minimum", "maximum"),
                    };
                    if let Some(min) = min {
                        schema[min_key] = json!(min);
                    }
                    if let Some(max) = max {
                        schema[max_key] = json!(max);
                    }
                }
                Constraint::Enum(values) => schema["enum"] = json!(values),
                Constraint::Exists(kind) => schema["x-exists"] = json!(kind.as_str()),
                Constraint::RequiredIf { field, equals } => {
                    schema["x-required-if"] = json!({ "field": field, "equals": equals });
                }
                Constraint::Nullable => schema["nullable"] = json!(true),
                Constraint::Required | Constraint::Type(_) => {}
            }
        }

        if let Some(description) = self.description {
            schema["description"] = json!(description);
        }
        schema
    }
}

/// Declarative parameter rules for one tool. Immutable once registered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolSchema {
    fields: Vec<FieldSpec>,
    messages: HashMap<String, String>,
}

impl ToolSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self {
            fields,
            messages: HashMap::new(),
        }
    }

    /// Replace the default message for `rule` on `field`.
    pub fn with_message(
        mut self,
        field: &str,
        rule: &str,
        message: impl Into<String>,
    ) -> Self {
        self.messages
            .insert(format!("{field}.{rule}"), message.into());
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn message_override(&self, field: &str, rule: &str) -> Option<&str> {
        self.messages
            .get(&format!("{field}.{rule}"))
            .map(String::as_str)
    }

    /// JSON-Schema-like description served by `tools/list`.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in &self.fields {
            properties.insert(field.name.to_string(), field.json_schema());
            if field.is_required() {
                required.push(Value::String(field.name.to_string()));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_and_max_fold_into_one_range() {
        let field = FieldSpec::new("unit_price").number().min(0.0).max(10_000.0);
        let ranges: Vec<&Constraint> = field
            .constraints()
            .iter()
            .filter(|c| c.rule() == "range")
            .collect();
        assert_eq!(
            ranges,
            vec![&Constraint::Range {
                min: Some(0.0),
                max: Some(10_000.0)
            }]
        );
    }

    #[test]
    fn field_accessors_reflect_constraints() {
        let field = FieldSpec::new("hourly_rate")
            .nullable()
            .number()
            .required_if("billable", true);
        assert!(!field.is_required());
        assert!(field.is_nullable());
        assert_eq!(field.field_type(), Some(FieldType::Number));
        assert_eq!(field.required_if_rule(), Some(("billable", &json!(true))));
    }

    #[test]
    fn json_schema_lists_required_fields_in_order() {
        let schema = ToolSchema::new(vec![
            FieldSpec::new("title").required().string().max(255.0),
            FieldSpec::new("status")
                .required()
                .string()
                .one_of(&["todo", "done"]),
            FieldSpec::new("project_id")
                .nullable()
                .integer()
                .exists(ResourceKind::Project),
        ]);
        let value = schema.to_json_schema();
        assert_eq!(value["required"], json!(["title", "status"]));
        assert_eq!(value["properties"]["title"]["maxLength"], json!(255.0));
        assert_eq!(value["properties"]["status"]["enum"], json!(["todo", "done"]));
        assert_eq!(value["properties"]["project_id"]["x-exists"], json!("project"));
    }

    #[test]
    fn message_overrides_are_keyed_by_field_and_rule() {
        let schema = ToolSchema::new(vec![FieldSpec::new("unit_price").number().min(0.0)])
            .with_message("unit_price", "range", "Prices cannot be negative.");
        assert_eq!(
            schema.message_override("unit_price", "range"),
            Some("Prices cannot be negative.")
        );
        assert_eq!(schema.message_override("unit_price", "type"), None);
    }
}
