//! Schema evaluator -- pure logic, no I/O.

use serde_json::{Map, Value};

use super::schema::{value_type_name, Schema};

/// Validate one JSON object against a schema.
///
/// Collects every violation of the schema rather than stopping at the
/// first one. On success, returns the input with defaults filled in for
/// absent optional fields.
pub fn validate(input: &Value, schema: &Schema) -> Result<Value, Vec<String>> {
    let map = match input.as_object() {
        Some(map) => map,
        None => {
            return Err(vec![format!(
                "{} should be object type, not {}.",
                schema.name,
                value_type_name(input)
            )])
        }
    };

    let mut errors = Vec::new();

    for key in map.keys() {
        if schema.field(key).is_none() {
            errors.push(format!(
                "Unexpected input. {key} is not a valid input option."
            ));
        }
    }

    let mut validated: Map<String, Value> = map.clone();

    for field in schema.fields {
        match map.get(field.name) {
            None | Some(Value::Null) => {
                if field.required {
                    errors.push(format!("{} is a required input.", field.name));
                } else if let Some(default) = field.default {
                    validated.insert(field.name.to_string(), default.to_value());
                }
            }
            Some(value) if !field.kind.matches(value) => {
                errors.push(format!(
                    "{} should be {} type, not {}.",
                    field.name,
                    field.kind.name(),
                    value_type_name(value)
                ));
            }
            Some(value) => {
                if let Some(constraint) = &field.constraint {
                    if !constraint.check(value) {
                        errors.push(format!("{} does not meet the constraints.", field.name));
                    }
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(Value::Object(validated))
    } else {
        Err(errors)
    }
}
