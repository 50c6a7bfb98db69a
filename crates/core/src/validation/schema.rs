//! Schema and field rule types.
//!
//! Schemas are `'static` tables so the recognized endpoints and their
//! fields are plain data that can be inspected and tested.

use serde_json::Value;
use validator::ValidateUrl;

/// JSON type a field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldKind {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Number => value.is_number(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Array => value.is_array(),
            FieldKind::Object => value.is_object(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Integer => "integer",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Array => "array",
            FieldKind::Object => "object",
        }
    }
}

/// Name of the JSON type of `value`, as used in error messages.
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Extra check applied once the type matches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constraint {
    /// String must be one of the listed values.
    OneOf(&'static [&'static str]),
    /// String must not be empty or whitespace.
    NonEmpty,
    /// String must be an absolute `http://` or `https://` URL.
    HttpUrl,
    /// Number must lie in `[min, max]`.
    Range { min: f64, max: f64 },
}

impl Constraint {
    pub fn check(&self, value: &Value) -> bool {
        match self {
            Constraint::OneOf(allowed) => value.as_str().is_some_and(|s| allowed.contains(&s)),
            Constraint::NonEmpty => value.as_str().is_some_and(|s| !s.trim().is_empty()),
            Constraint::HttpUrl => value.as_str().is_some_and(|s| {
                (s.starts_with("http://") || s.starts_with("https://")) && s.validate_url()
            }),
            Constraint::Range { min, max } => value
                .as_f64()
                .is_some_and(|n| n >= *min && n <= *max),
        }
    }
}

/// Value filled in for an absent optional field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Int(i64),
    Float(f64),
    Str(&'static str),
    Bool(bool),
    EmptyArray,
    EmptyObject,
}

impl DefaultValue {
    pub fn to_value(&self) -> Value {
        match self {
            DefaultValue::Int(i) => Value::from(*i),
            DefaultValue::Float(f) => Value::from(*f),
            DefaultValue::Str(s) => Value::from(*s),
            DefaultValue::Bool(b) => Value::from(*b),
            DefaultValue::EmptyArray => Value::Array(Vec::new()),
            DefaultValue::EmptyObject => Value::Object(serde_json::Map::new()),
        }
    }
}

/// Rule for a single top-level field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<DefaultValue>,
    pub constraint: Option<Constraint>,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
            constraint: None,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
            constraint: None,
        }
    }

    pub const fn with_default(self, default: DefaultValue) -> Self {
        Self {
            default: Some(default),
            ..self
        }
    }

    pub const fn with_constraint(self, constraint: Constraint) -> Self {
        Self {
            constraint: Some(constraint),
            ..self
        }
    }
}

/// A named set of field rules for one JSON object.
#[derive(Debug, PartialEq)]
pub struct Schema {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

impl Schema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}
