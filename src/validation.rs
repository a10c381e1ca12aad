//! Validation of desired records against their [`EntityKind`].
//!
//! The reconciler runs this before create and update so that a record the
//! remote would reject for shape reasons never leaves the process.
//!
//! # Example
//!
//! ```
//! use hemmer_provider_rest::schema::{Attribute, EntityKind};
//! use hemmer_provider_rest::validation::validate;
//! use serde_json::json;
//!
//! let kind = EntityKind::new("user", "/users/")
//!     .with_attribute("username", Attribute::required_string())
//!     .with_attribute("age", Attribute::optional_int64());
//!
//! assert!(validate(&kind, &json!({"username": "ada", "age": 36})).is_empty());
//!
//! let diagnostics = validate(&kind, &json!({"age": "old"}));
//! assert_eq!(diagnostics.len(), 2);
//! ```

use std::collections::HashMap;

use serde_json::Value;

use crate::schema::{Attribute, AttributeType, Diagnostic, EntityKind};

/// Validate a serialized desired record.
///
/// - Required attributes must be present and non-null.
/// - Declared attribute types must match.
/// - Setting a read-only attribute is reported as a warning; the value is
///   dropped before sending.
/// - Undeclared fields are not checked.
pub fn validate(kind: &EntityKind, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match value {
        Value::Object(map) => map,
        other => {
            diagnostics.push(
                Diagnostic::error(format!("Expected {} to be an object", kind.name))
                    .with_detail(format!("Got {}", value_type_name(other))),
            );
            return diagnostics;
        },
    };

    let mut names: Vec<&String> = kind.attributes.keys().collect();
    names.sort();

    for name in names {
        let attr = &kind.attributes[name];
        validate_attribute(attr, obj.get(name.as_str()), name, &mut diagnostics);
    }

    diagnostics
}

/// Validate and keep only error diagnostics.
pub fn errors(kind: &EntityKind, value: &Value) -> Vec<Diagnostic> {
    validate(kind, value)
        .into_iter()
        .filter(Diagnostic::is_error)
        .collect()
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(_) if attr.flags.is_read_only() => {
            diagnostics.push(
                Diagnostic::warning(format!("Attribute '{}' is read-only", path))
                    .with_detail("The remote assigns this value; it is not sent")
                    .with_attribute(path),
            );
        },
        Some(v) => validate_attribute_type(&attr.attr_type, v, path, diagnostics),
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Float64 => {
            if !value.is_number() {
                diagnostics.push(type_error(path, "float64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::List(element_type) | AttributeType::Set(element_type) => {
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
            } else {
                let expected = if matches!(attr_type, AttributeType::Set(_)) {
                    "set"
                } else {
                    "list"
                };
                diagnostics.push(type_error(path, expected, value));
            }
        },
        AttributeType::Map(value_type) => {
            if let Some(obj) = value.as_object() {
                for (key, val) in obj {
                    let key_path = format!("{}.{}", path, key);
                    validate_attribute_type(value_type, val, &key_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "map", value));
            }
        },
        AttributeType::Object(attrs) => {
            if let Some(obj) = value.as_object() {
                validate_object_type(attrs, obj, path, diagnostics);
            } else {
                diagnostics.push(type_error(path, "object", value));
            }
        },
        AttributeType::Dynamic => {},
    }
}

fn validate_object_type(
    attrs: &HashMap<String, AttributeType>,
    obj: &serde_json::Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (name, attr_type) in attrs {
        let attr_path = format!("{}.{}", path, name);
        // Object members carry no presence flags; null means unset.
        match obj.get(name) {
            None | Some(Value::Null) => {},
            Some(value) => validate_attribute_type(attr_type, value, &attr_path, diagnostics),
        }
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.is_i64()
                || n.is_u64() && n.as_u64().is_some_and(|u| u <= i64::MAX as u64)
                || n
                    .as_f64()
                    .is_some_and(|f| f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64)
        },
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, value_type_name(got)))
        .with_attribute(path)
}
