//! Schema validation helpers.
//!
//! Attribute bags arrive from the host as `serde_json::Value`. Before an adapter
//! decodes one into a typed record it is checked against the resource [`Schema`]
//! so the user gets a diagnostic pointing at the offending attribute.
//!
//! # Example
//!
//! ```
//! use coveo_provider::schema::{Attribute, Schema};
//! use coveo_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute("timeout_seconds", Attribute::optional_int64());
//!
//! assert!(validate(&schema, &json!({"name": "products"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": 42}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("name".to_string()));
//! ```

use serde_json::Value;

use crate::error::{ProviderError, Result};
use crate::schema::{Attribute, AttributeType, Diagnostic, Schema};

/// Validate an attribute bag against a schema.
///
/// - Required attributes must be present and non-null
/// - Optional attributes may be absent or null
/// - Computed-only attributes are skipped (the provider sets these)
/// - Attribute types must match the schema
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let obj = match value {
        Value::Object(map) => map,
        _ => {
            return vec![Diagnostic::error("Expected object")
                .with_detail(format!("Got {}", value_type_name(value)))];
        },
    };

    let mut diagnostics = Vec::new();
    for (name, attr) in &schema.attributes {
        validate_attribute(attr, obj.get(name), name, &mut diagnostics);
    }
    diagnostics
}

/// Validate an attribute bag, returning Ok if valid or Err with diagnostics.
pub fn validate_result(schema: &Schema, value: &Value) -> std::result::Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if an attribute bag is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

/// Validate an attribute bag and fold any diagnostics into a [`ProviderError::Validation`].
pub(crate) fn ensure_valid(resource_type: &str, schema: &Schema, value: &Value) -> Result<()> {
    validate_result(schema, value).map_err(|diagnostics| {
        let details: Vec<String> = diagnostics
            .iter()
            .map(|d| match &d.detail {
                Some(detail) => format!("{} ({})", d.summary, detail),
                None => d.summary.clone(),
            })
            .collect();
        ProviderError::Validation(format!("{}: {}", resource_type, details.join("; ")))
    })
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.is_computed_only() {
        return;
    }

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
        Some(v) => {
            let matches = match attr.attr_type {
                AttributeType::String => v.is_string(),
                AttributeType::Int64 => is_int64(v),
            };
            if !matches {
                diagnostics.push(type_error(path, attr.attr_type, v));
            }
        },
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
                || n.as_f64().is_some_and(|f| {
                    f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64
                })
        },
        _ => false,
    }
}

fn type_error(path: &str, expected: AttributeType, got: &Value) -> Diagnostic {
    let expected = match expected {
        AttributeType::String => "string",
        AttributeType::Int64 => "int64",
    };
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, value_type_name(got)))
        .with_attribute(path)
}
