use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Number, Value};

use crate::error::{McpError, ValidationFailure};
use crate::schema::{Constraint, FieldSpec, FieldType, ToolSchema};
use crate::store::Store;

/// Parameters that passed a tool schema, already coerced to their declared types.
///
/// Only declared fields are present; absent optional fields are omitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedParams(Map<String, Value>);

impl ValidatedParams {
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// Fetch an integer the schema declares as required.
    pub fn require_i64(&self, key: &str) -> Result<i64, McpError> {
        self.i64(key)
            .ok_or_else(|| McpError::invalid_field(key, format!("The {key} field is required.")))
    }

    /// Every validated field except `keys`.
    pub fn without(&self, keys: &[&str]) -> Map<String, Value> {
        self.0
            .iter()
            .filter(|(key, _)| !keys.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

/// Run `schema` against `params`.
///
/// Every declared field is checked before returning, so a failure lists all
/// violations at once. `Exists` rules read from `store`; a store failure aborts
/// with `DatabaseError` instead of passing the field.
pub async fn validate(
    schema: &ToolSchema,
    params: &Map<String, Value>,
    store: &dyn Store,
) -> Result<ValidatedParams, McpError> {
    let mut failure = ValidationFailure::new();
    let mut validated = Map::new();

    for field in schema.fields() {
        let mut check = FieldCheck {
            schema,
            field,
            failure: &mut failure,
        };
        if let Some(value) = check.run(params, store).await? {
            validated.insert(field.name().to_string(), value);
        }
    }

    if failure.is_empty() {
        Ok(ValidatedParams(validated))
    } else {
        Err(McpError::ValidationFailed(failure))
    }
}

struct FieldCheck<'a> {
    schema: &'a ToolSchema,
    field: &'a FieldSpec,
    failure: &'a mut ValidationFailure,
}

impl FieldCheck<'_> {
    async fn run(
        &mut self,
        params: &Map<String, Value>,
        store: &dyn Store,
    ) -> Result<Option<Value>, McpError> {
        let name = self.field.name();
        let required_if = self
            .field
            .required_if_rule()
            .filter(|(other, equals)| params.get(*other).is_some_and(|v| loosely_equal(v, equals)));
        let required = self.field.is_required() || required_if.is_some();

        let raw = match params.get(name) {
            None => {
                self.report_missing(required, required_if);
                return Ok(None);
            }
            Some(Value::Null) => {
                if required {
                    self.report_missing(true, required_if);
                } else if self.field.is_nullable() {
                    return Ok(Some(Value::Null));
                } else {
                    self.violation("nullable", format!("The {name} field must not be null."));
                }
                return Ok(None);
            }
            Some(Value::String(text)) if required && text.trim().is_empty() => {
                self.report_missing(true, required_if);
                return Ok(None);
            }
            Some(value) => value,
        };

        let field_type = self.field.field_type();
        let value = match field_type {
            Some(field_type) => match coerce(field_type, raw) {
                Some(value) => value,
                None => {
                    self.violation("type", type_message(name, field_type));
                    return Ok(None);
                }
            },
            None => raw.clone(),
        };

        for constraint in self.field.constraints() {
            match constraint {
                Constraint::Range { min, max } => self.check_range(field_type, &value, *min, *max),
                Constraint::Enum(allowed) => self.check_enum(&value, allowed),
                Constraint::Exists(kind) => {
                    let ids: Vec<i64> = match &value {
                        Value::Array(items) => items.iter().filter_map(Value::as_i64).collect(),
                        other => other.as_i64().into_iter().collect(),
                    };
                    let mut missing = Vec::new();
                    for id in ids {
                        if !store.exists(*kind, id).await? {
                            missing.push(id.to_string());
                        }
                    }
                    if !missing.is_empty() {
                        let message = if value.is_array() {
                            format!(
                                "The selected {name} contains ids that do not exist: {}.",
                                missing.join(", ")
                            )
                        } else {
                            format!("The selected {name} does not exist.")
                        };
                        self.violation("exists", message);
                    }
                }
                Constraint::Required
                | Constraint::Nullable
                | Constraint::Type(_)
                | Constraint::RequiredIf { .. } => {}
            }
        }

        Ok(Some(value))
    }

    fn report_missing(&mut self, required: bool, required_if: Option<(&str, &Value)>) {
        if !required {
            return;
        }
        let name = self.field.name();
        match required_if {
            Some((other, equals)) if !self.field.is_required() => {
                let message = format!(
                    "The {name} field is required when {other} is {}.",
                    display_value(equals)
                );
                self.violation("required_if", message);
            }
            _ => self.violation("required", format!("The {name} field is required.")),
        }
    }

    fn check_range(
        &mut self,
        field_type: Option<FieldType>,
        value: &Value,
        min: Option<f64>,
        max: Option<f64>,
    ) {
        let name = self.field.name();
        let (measured, unit) = match (field_type, value) {
            (Some(FieldType::String), Value::String(text)) => (text.chars().count() as f64, " characters"),
            (_, Value::Array(items)) => (items.len() as f64, " items"),
            (_, other) => match other.as_f64() {
                Some(number) => (number, ""),
                None => return,
            },
        };

        if let Some(min) = min {
            if measured < min {
                self.violation("range", format!("The {name} field must be at least {min}{unit}."));
            }
        }
        if let Some(max) = max {
            if measured > max {
                self.violation(
                    "range",
                    format!("The {name} field must not be greater than {max}{unit}."),
                );
            }
        }
    }

    fn check_enum(&mut self, value: &Value, allowed: &[&str]) {
        let candidate = match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        if !allowed.contains(&candidate.as_str()) {
            let name = self.field.name();
            self.violation(
                "enum",
                format!(
                    "The selected {name} is invalid. Allowed values: {}.",
                    allowed.join(", ")
                ),
            );
        }
    }

    fn violation(&mut self, rule: &str, default_message: String) {
        let name = self.field.name();
        let message = self
            .schema
            .message_override(name, rule)
            .map(str::to_string)
            .unwrap_or(default_message);
        self.failure.push(name, message);
    }
}

fn type_message(name: &str, field_type: FieldType) -> String {
    let expectation = match field_type {
        FieldType::String => "a string",
        FieldType::Integer => "an integer",
        FieldType::Number => "a number",
        FieldType::Boolean => "true or false",
        FieldType::Date => "a valid date",
        FieldType::IntegerList => "an array of integers",
    };
    format!("The {name} field must be {expectation}.")
}

/// Coerce `value` to `field_type`; `None` when it cannot be represented.
fn coerce(field_type: FieldType, value: &Value) -> Option<Value> {
    match field_type {
        FieldType::String => value.is_string().then(|| value.clone()),
        FieldType::Integer => coerce_integer(value).map(Value::from),
        FieldType::Number => coerce_number(value),
        FieldType::Boolean => match value {
            Value::Bool(flag) => Some(Value::Bool(*flag)),
            Value::String(text) => match text.trim() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            Value::Number(number) => match number.as_i64() {
                Some(1) => Some(Value::Bool(true)),
                Some(0) => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        FieldType::Date => match value {
            Value::String(text) if is_date(text.trim()) => Some(Value::String(text.trim().to_string())),
            _ => None,
        },
        FieldType::IntegerList => match value {
            Value::Array(items) => items
                .iter()
                .map(|item| coerce_integer(item).map(Value::from))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            _ => None,
        },
    }
}

fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.fract() == 0.0 && float.abs() < i64::MAX as f64)
                .map(|float| float as i64)
        }),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn coerce_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(text) => {
            let text = text.trim();
            if let Ok(integer) = text.parse::<i64>() {
                return Some(Value::from(integer));
            }
            text.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
        }
        _ => None,
    }
}

fn is_date(text: &str) -> bool {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
        || NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S").is_ok()
        || DateTime::parse_from_rfc3339(text).is_ok()
}

/// Compare a raw param against a `RequiredIf` target, tolerating string encodings.
fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (actual, expected) {
        (Value::String(text), Value::Bool(flag)) => match text.trim() {
            "true" | "1" => *flag,
            "false" | "0" => !*flag,
            _ => false,
        },
        (Value::String(text), Value::Number(number)) => text.trim() == number.to_string(),
        (Value::Number(number), Value::String(text)) => number.to_string() == text.trim(),
        (Value::Number(number), Value::Bool(flag)) => number.as_i64() == Some(i64::from(*flag)),
        _ => false,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
